//! Terminal rendering utilities.

use console::style;

use secretseal_core::config::duration_str;
use secretseal_core::{AppError, Config};
use secretseal_keys::{KeyLifecycleManager, KeyPhase};
use secretseal_ops::FileStatus;

/// Render an operation error with its guidance and context.
pub fn render_error(err: &AppError) {
    eprintln!(
        "{} {}",
        style(format!("[{}]", err.kind())).red().bold(),
        err.message(),
    );
    let guidance = err.kind().guidance();
    if !guidance.is_empty() {
        eprintln!("  {}", style(guidance).dim());
    }
    for (key, value) in err.context() {
        eprintln!("  {} {}", style(format!("{key}:")).dim(), value);
    }
}

/// Render a one-line success summary.
pub fn render_success(summary: &str) {
    eprintln!("{} {}", style("ok").green().bold(), summary);
}

/// Print the welcome banner for the REPL.
pub fn render_welcome() {
    eprintln!(
        "{} {}",
        style("secretseal").bold().cyan(),
        style(env!("CARGO_PKG_VERSION")).dim(),
    );
    eprintln!("{}", style("Type help for commands, quit to exit.").dim());
    eprintln!();
}

/// Print the help message.
pub fn render_help() {
    eprintln!("{}", style("Available commands:").bold());
    eprintln!(
        "  {}                      - Encrypt a file in place",
        style("encrypt <file> [recipient..]").cyan()
    );
    eprintln!(
        "  {}   - Decrypt a file (in place by default)",
        style("decrypt <file> [-o <out>|--stdout]").cyan()
    );
    eprintln!(
        "  {}                                     - Edit an encrypted file",
        style("edit <file>").cyan()
    );
    eprintln!(
        "  {}                                   - Rotate the file's data key",
        style("rotate <file>").cyan()
    );
    eprintln!(
        "  {}                - Grant a recipient access",
        style("add-recipient <file> <recipient>").cyan()
    );
    eprintln!(
        "  {}                                   - Show encryption status",
        style("status <file>").cyan()
    );
    eprintln!(
        "  {}          - Manage the identity key",
        style("key <generate|unlock|lock|status>").cyan()
    );
    eprintln!(
        "  {}                                     - Show the loaded configuration",
        style("config show").cyan()
    );
    eprintln!(
        "  {}                                            - Show this help",
        style("help").cyan()
    );
    eprintln!(
        "  {}                                            - Exit",
        style("quit").cyan()
    );
}

/// Render the encryption status of a file.
pub fn render_file_status(name: &str, status: &FileStatus) {
    if status.encrypted {
        eprintln!("{} {} is encrypted", style("*").green(), style(name).bold());
        for recipient in &status.recipients {
            eprintln!("    {} {}", style("recipient:").dim(), recipient);
        }
    } else {
        eprintln!(
            "{} {} is not encrypted",
            style("-").yellow(),
            style(name).bold()
        );
    }
}

/// Render the current key lifecycle state.
pub fn render_key_status(keys: &KeyLifecycleManager) {
    let phase = keys.phase();
    let label = match phase {
        KeyPhase::Idle if keys.is_decrypted() => style("unlocked").green(),
        KeyPhase::Idle if keys.has_encrypted_key() => style("locked").yellow(),
        KeyPhase::Idle => style("no key").dim(),
        KeyPhase::AwaitingPassphrase => style("awaiting passphrase").yellow(),
        KeyPhase::Generating => style("generating").yellow(),
        KeyPhase::Decrypting => style("unlocking").yellow(),
        KeyPhase::Deleting => style("locking").yellow(),
    };
    eprintln!("  {} {}", style("key:").dim(), label);

    if let Some(public_key) = keys.public_key() {
        eprintln!("  {} {}", style("public key:").dim(), public_key);
    }
    if let Some(remaining) = keys.remaining_lifetime() {
        eprintln!(
            "  {} {}",
            style("expires in:").dim(),
            duration_str::format(&remaining)
        );
    }
}

/// Render the loaded configuration, field by field.
pub fn render_config(config: &Config) {
    eprintln!("  {} {}", style("key_path:").dim(), config.key_path.display());
    eprintln!(
        "  {} {}",
        style("encrypted_key_path:").dim(),
        config.encrypted_key_path.display()
    );
    eprintln!(
        "  {} {}",
        style("auto_delete_interval:").dim(),
        duration_str::format(&config.auto_delete_interval)
    );
    eprintln!(
        "  {} {}",
        style("editor_command:").dim(),
        config.editor_command
    );
    let recipients = config.default_recipient_list();
    eprintln!(
        "  {} {}",
        style("default_recipients:").dim(),
        if recipients.is_empty() {
            "(none)".to_string()
        } else {
            recipients.join(", ")
        }
    );
    match &config.backup.dir {
        Some(dir) => eprintln!("  {} {}", style("backup.dir:").dim(), dir.display()),
        None => eprintln!("  {} (default)", style("backup.dir:").dim()),
    }
    eprintln!(
        "  {} {}",
        style("backup.max_backups:").dim(),
        config.backup.max_backups
    );
}

/// Yes/no confirmation on the terminal. Defaults to no.
pub fn confirm(prompt: &str) -> bool {
    eprint!("{} {} ", style("?").yellow().bold(), style(prompt).bold());
    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_ok() {
        matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
    } else {
        false
    }
}
