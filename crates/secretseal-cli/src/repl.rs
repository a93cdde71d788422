//! Interactive read-eval-print loop.
//!
//! The whole tool lives here: one rustyline session where secret files are
//! encrypted, decrypted, and edited, and the identity key is generated,
//! unlocked, and locked again.

use std::path::PathBuf;

use rustyline::completion::{FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::hint::HistoryHinter;
use rustyline::{CompletionType, Config as LineConfig, EditMode, Editor};

use secretseal_core::{paths, Config, SecretString};
use secretseal_keys::{KeyLifecycleManager, PassphraseFlow, PassphraseStep};
use secretseal_ops::SecretOperationFacade;

use crate::render;

const COMMANDS: &[&str] = &[
    "help",
    "quit",
    "exit",
    "status",
    "encrypt",
    "decrypt",
    "edit",
    "rotate",
    "add-recipient",
    "key",
    "config",
];

/// A parsed REPL line.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Help,
    Quit,
    Status(PathBuf),
    Encrypt {
        path: PathBuf,
        recipients: Vec<String>,
    },
    Decrypt {
        path: PathBuf,
        output: Option<PathBuf>,
        to_stdout: bool,
    },
    Edit(PathBuf),
    Rotate(PathBuf),
    AddRecipient {
        path: PathBuf,
        recipient: String,
    },
    KeyGenerate,
    KeyUnlock,
    KeyLock,
    KeyStatus,
    ConfigShow,
}

fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let (&command, args) = words
        .split_first()
        .ok_or_else(|| "empty command".to_string())?;

    match command {
        "help" => Ok(ReplCommand::Help),
        "quit" | "exit" => Ok(ReplCommand::Quit),
        "status" => match args {
            [path] => Ok(ReplCommand::Status(PathBuf::from(path))),
            _ => Err("usage: status <file>".to_string()),
        },
        "encrypt" => match args {
            [path, recipients @ ..] => Ok(ReplCommand::Encrypt {
                path: PathBuf::from(path),
                recipients: recipients.iter().map(|r| r.to_string()).collect(),
            }),
            _ => Err("usage: encrypt <file> [recipient..]".to_string()),
        },
        "decrypt" => match args {
            [path] => Ok(ReplCommand::Decrypt {
                path: PathBuf::from(path),
                output: None,
                to_stdout: false,
            }),
            [path, "--stdout"] => Ok(ReplCommand::Decrypt {
                path: PathBuf::from(path),
                output: None,
                to_stdout: true,
            }),
            [path, "-o", output] => Ok(ReplCommand::Decrypt {
                path: PathBuf::from(path),
                output: Some(PathBuf::from(output)),
                to_stdout: false,
            }),
            _ => Err("usage: decrypt <file> [-o <out>|--stdout]".to_string()),
        },
        "edit" => match args {
            [path] => Ok(ReplCommand::Edit(PathBuf::from(path))),
            _ => Err("usage: edit <file>".to_string()),
        },
        "rotate" => match args {
            [path] => Ok(ReplCommand::Rotate(PathBuf::from(path))),
            _ => Err("usage: rotate <file>".to_string()),
        },
        "add-recipient" => match args {
            [path, recipient] => Ok(ReplCommand::AddRecipient {
                path: PathBuf::from(path),
                recipient: recipient.to_string(),
            }),
            _ => Err("usage: add-recipient <file> <recipient>".to_string()),
        },
        "key" => match args {
            ["generate"] => Ok(ReplCommand::KeyGenerate),
            ["unlock"] => Ok(ReplCommand::KeyUnlock),
            ["lock"] => Ok(ReplCommand::KeyLock),
            ["status"] | [] => Ok(ReplCommand::KeyStatus),
            _ => Err("usage: key <generate|unlock|lock|status>".to_string()),
        },
        "config" => match args {
            ["show"] | [] => Ok(ReplCommand::ConfigShow),
            _ => Err("usage: config show".to_string()),
        },
        other => Err(format!("unknown command: {other}")),
    }
}

/// Completes command names on the first word, filenames after it.
struct ReplHelper {
    files: FilenameCompleter,
    hinter: HistoryHinter,
}

impl rustyline::completion::Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before_cursor = &line[..pos];
        if before_cursor.contains(char::is_whitespace) {
            return self.files.complete(line, pos, ctx);
        }
        let matches = COMMANDS
            .iter()
            .filter(|c| c.starts_with(before_cursor))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: format!("{c} "),
            })
            .collect();
        Ok((0, matches))
    }
}

impl rustyline::hint::Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &rustyline::Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl rustyline::highlight::Highlighter for ReplHelper {}
impl rustyline::validate::Validator for ReplHelper {}
impl rustyline::Helper for ReplHelper {}

enum CommandResult {
    Continue,
    Quit,
}

/// The interactive REPL.
pub struct Repl {
    config: Config,
    keys: KeyLifecycleManager,
    facade: SecretOperationFacade,
}

impl Repl {
    pub fn new(config: Config, keys: KeyLifecycleManager, facade: SecretOperationFacade) -> Self {
        Self {
            config,
            keys,
            facade,
        }
    }

    /// Run the REPL loop until quit or EOF.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        render::render_welcome();

        let line_config = LineConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .build();

        let mut rl: Editor<ReplHelper, rustyline::history::FileHistory> =
            Editor::with_config(line_config)?;
        rl.set_helper(Some(ReplHelper {
            files: FilenameCompleter::new(),
            hinter: HistoryHinter::new(),
        }));

        let history_file = paths::config_dir().ok().map(|d| d.join("history"));
        if let Some(history_file) = &history_file {
            let _ = rl.load_history(history_file);
        }

        loop {
            let prompt = console::style("secretseal> ").green().bold().to_string();
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    match self.dispatch(trimmed).await {
                        CommandResult::Continue => {}
                        CommandResult::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    eprintln!("{}", console::style("^C (type quit to exit)").dim());
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}: {}", console::style("Error").red(), err);
                    break;
                }
            }
        }

        if let Some(history_file) = &history_file {
            let _ = rl.save_history(history_file);
        }

        eprintln!("{}", console::style("Goodbye!").dim());
        Ok(())
    }

    async fn dispatch(&mut self, line: &str) -> CommandResult {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(usage) => {
                eprintln!("{} {}", console::style("error:").red(), usage);
                return CommandResult::Continue;
            }
        };

        match command {
            ReplCommand::Help => {
                render::render_help();
                CommandResult::Continue
            }
            ReplCommand::Quit => CommandResult::Quit,
            ReplCommand::Status(path) => {
                match self.facade.file_status(&path).await {
                    Ok(status) => render::render_file_status(&path.display().to_string(), &status),
                    Err(err) => render::render_error(&err),
                }
                CommandResult::Continue
            }
            ReplCommand::Encrypt { path, recipients } => {
                self.encrypt(path, recipients).await;
                CommandResult::Continue
            }
            ReplCommand::Decrypt {
                path,
                output,
                to_stdout,
            } => {
                self.decrypt(path, output, to_stdout).await;
                CommandResult::Continue
            }
            ReplCommand::Edit(path) => {
                self.warn_if_locked();
                match self.facade.edit(&path).await {
                    Ok(outcome) => render::render_success(&outcome.summary),
                    Err(err) => render::render_error(&err),
                }
                CommandResult::Continue
            }
            ReplCommand::Rotate(path) => {
                self.warn_if_locked();
                match self.facade.rotate(&path).await {
                    Ok(outcome) => render::render_success(&outcome.summary),
                    Err(err) => render::render_error(&err),
                }
                CommandResult::Continue
            }
            ReplCommand::AddRecipient { path, recipient } => {
                self.warn_if_locked();
                match self.facade.add_recipient(&path, &recipient).await {
                    Ok(outcome) => render::render_success(&outcome.summary),
                    Err(err) => render::render_error(&err),
                }
                CommandResult::Continue
            }
            ReplCommand::KeyGenerate => {
                self.key_generate().await;
                CommandResult::Continue
            }
            ReplCommand::KeyUnlock => {
                self.key_unlock().await;
                CommandResult::Continue
            }
            ReplCommand::KeyLock => {
                match self.keys.lock().await {
                    Ok(()) => render::render_success("Key locked and securely deleted"),
                    Err(err) => render::render_error(&err),
                }
                CommandResult::Continue
            }
            ReplCommand::KeyStatus => {
                render::render_key_status(&self.keys);
                CommandResult::Continue
            }
            ReplCommand::ConfigShow => {
                render::render_config(&self.config);
                CommandResult::Continue
            }
        }
    }

    async fn encrypt(&self, path: PathBuf, recipients: Vec<String>) {
        let recipients = self.resolve_recipients(recipients);
        if recipients.is_empty() {
            eprintln!(
                "{} no recipients: pass one, set default_recipients, or unlock your key",
                console::style("error:").red()
            );
            return;
        }
        match self.facade.encrypt(&path, &recipients, true).await {
            Ok(outcome) => render::render_success(&outcome.summary),
            Err(err) => render::render_error(&err),
        }
    }

    async fn decrypt(&self, path: PathBuf, output: Option<PathBuf>, to_stdout: bool) {
        self.warn_if_locked();
        let in_place = output.is_none() && !to_stdout;
        match self.facade.decrypt(&path, in_place, output.as_deref()).await {
            Ok(outcome) => {
                if let Some(stdout) = &outcome.stdout {
                    print!("{stdout}");
                }
                render::render_success(&outcome.summary);
            }
            Err(err) => render::render_error(&err),
        }
    }

    /// Explicit recipients win, then the configured defaults, then the
    /// unlocked key's own public half.
    fn resolve_recipients(&self, explicit: Vec<String>) -> Vec<String> {
        if !explicit.is_empty() {
            return explicit;
        }
        let defaults = self.config.default_recipient_list();
        if !defaults.is_empty() {
            return defaults;
        }
        self.keys.public_key().into_iter().collect()
    }

    async fn key_generate(&self) {
        if self.keys.has_encrypted_key()
            && !render::confirm("An encrypted key already exists. Overwrite it? [y/N]")
        {
            eprintln!("{}", console::style("Cancelled.").dim());
            return;
        }

        let flow = match self.keys.begin_generation() {
            Ok(flow) => flow,
            Err(err) => {
                render::render_error(&err);
                return;
            }
        };
        let Some(passphrase) = self.collect_passphrase(flow) else {
            self.keys.cancel_passphrase();
            eprintln!("{}", console::style("Cancelled.").dim());
            return;
        };

        match self.keys.generate(&passphrase).await {
            Ok(pair) => {
                render::render_success("Key generated and unlocked");
                eprintln!(
                    "  {} {}",
                    console::style("public key:").dim(),
                    pair.public_key
                );
            }
            Err(err) => render::render_error(&err),
        }
    }

    async fn key_unlock(&self) {
        let flow = match self.keys.begin_unlock() {
            Ok(flow) => flow,
            Err(err) => {
                render::render_error(&err);
                return;
            }
        };
        let Some(passphrase) = self.collect_passphrase(flow) else {
            self.keys.cancel_passphrase();
            eprintln!("{}", console::style("Cancelled.").dim());
            return;
        };

        match self.keys.unlock(&passphrase).await {
            Ok(()) => render::render_success("Key unlocked"),
            Err(err) => render::render_error(&err),
        }
    }

    /// Drive a passphrase flow at the terminal. Empty input cancels.
    fn collect_passphrase(&self, mut flow: PassphraseFlow) -> Option<SecretString> {
        loop {
            let prompt = if flow.awaiting_confirmation() {
                "Confirm passphrase: "
            } else {
                "Passphrase: "
            };
            let entry = match rpassword::prompt_password(prompt) {
                Ok(entry) => entry,
                Err(_) => return None,
            };
            if entry.is_empty() {
                return None;
            }
            match flow.submit(SecretString::from(entry)) {
                PassphraseStep::NeedsConfirmation => continue,
                PassphraseStep::Mismatch => {
                    eprintln!(
                        "{}",
                        console::style("Passphrases do not match, try again.").red()
                    );
                    continue;
                }
                PassphraseStep::Accepted(passphrase) => return Some(passphrase),
            }
        }
    }

    fn warn_if_locked(&self) {
        if !self.keys.is_decrypted() {
            eprintln!(
                "{}",
                console::style("note: key is locked; run 'key unlock' if this fails").dim()
            );
        }
    }
}
