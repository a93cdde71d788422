//! Passphrase entry with an optional confirmation step.

use secretseal_core::secret::SecretString;

/// Outcome of feeding one entry into a [`PassphraseFlow`].
#[derive(Debug)]
pub enum PassphraseStep {
    /// First entry taken; a confirming entry is required next.
    NeedsConfirmation,
    /// Confirmation did not byte-match the first entry. The first entry is
    /// kept; only the confirmation must be re-entered.
    Mismatch,
    /// Entry accepted (confirmed, or no confirmation required).
    Accepted(SecretString),
}

/// Two-step entry/confirm sub-flow used while a new passphrase is set.
///
/// A mismatch does not abort the flow: it flags the error and waits for a
/// fresh confirmation against the original first entry.
#[derive(Debug, Default)]
pub struct PassphraseFlow {
    require_confirmation: bool,
    first: Option<SecretString>,
    mismatched: bool,
}

impl PassphraseFlow {
    pub fn new(require_confirmation: bool) -> Self {
        Self {
            require_confirmation,
            first: None,
            mismatched: false,
        }
    }

    /// Whether the next entry is the confirmation step.
    pub fn awaiting_confirmation(&self) -> bool {
        self.require_confirmation && self.first.is_some()
    }

    /// Whether the previous confirmation attempt mismatched.
    pub fn had_mismatch(&self) -> bool {
        self.mismatched
    }

    /// Feed the next entry into the flow.
    pub fn submit(&mut self, entry: SecretString) -> PassphraseStep {
        if !self.require_confirmation {
            return PassphraseStep::Accepted(entry);
        }

        match &self.first {
            None => {
                self.first = Some(entry);
                PassphraseStep::NeedsConfirmation
            }
            Some(first) => {
                if *first == entry {
                    self.mismatched = false;
                    PassphraseStep::Accepted(self.first.take().expect("first entry present"))
                } else {
                    self.mismatched = true;
                    PassphraseStep::Mismatch
                }
            }
        }
    }

    /// Start over completely, discarding both entries.
    pub fn reset(&mut self) {
        self.first = None;
        self.mismatched = false;
    }
}
