//! Classification of external tool diagnostics.
//!
//! The encryption and key tools report failures as free-form stderr text.
//! [`DiagnosticClassifier`] maps that text onto the [`ErrorKind`] taxonomy so
//! callers can decide between rollback and pass-through without string
//! matching of their own. The trait exists so tests can inject synthetic
//! diagnostics without invoking real tools.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, ErrorKind};

/// Maps raw diagnostic text from an external tool to a classified error.
pub trait DiagnosticClassifier: Send + Sync {
    /// Classify `diagnostic` (typically captured stderr).
    fn classify(&self, diagnostic: &str) -> AppError;
}

/// One ordered classification rule.
struct Rule {
    pattern: Regex,
    kind: ErrorKind,
    message: &'static str,
}

/// Default rule table. First match wins; order matters because several tools
/// emit overlapping phrases.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule {
            pattern: Regex::new(r"(?i)failed to decrypt").unwrap(),
            kind: ErrorKind::Security,
            message: "Failed to decrypt file (incorrect key or corrupted file)",
        },
        Rule {
            pattern: Regex::new(r"(?i)incorrect passphrase").unwrap(),
            kind: ErrorKind::Security,
            message: "Incorrect passphrase provided",
        },
        Rule {
            pattern: Regex::new(r"(?i)no key.*found").unwrap(),
            kind: ErrorKind::Security,
            message: "No suitable decryption key found",
        },
        Rule {
            pattern: Regex::new(r"(?i)already encrypted").unwrap(),
            kind: ErrorKind::FileOperation,
            message: "File is already encrypted",
        },
        Rule {
            pattern: Regex::new(r"(?i)no regex match").unwrap(),
            kind: ErrorKind::Config,
            message: "Encryption pattern did not match any values",
        },
        Rule {
            pattern: Regex::new(r"(?i)could not find sops configuration").unwrap(),
            kind: ErrorKind::Config,
            message: "Missing encryption tool configuration (.sops.yaml)",
        },
    ]
});

/// Regex rule-table classifier covering the known tool diagnostics.
#[derive(Debug, Default, Clone)]
pub struct PatternClassifier;

impl PatternClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl DiagnosticClassifier for PatternClassifier {
    fn classify(&self, diagnostic: &str) -> AppError {
        for rule in RULES.iter() {
            if rule.pattern.is_match(diagnostic) {
                return AppError::new(rule.kind, rule.message);
            }
        }
        AppError::new(ErrorKind::General, "External tool operation failed")
            .with_context("details", diagnostic.trim())
    }
}
