//! Core types, error taxonomy, and configuration for Secretseal.

pub mod classify;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod paths;
pub mod secret;

pub use classify::{DiagnosticClassifier, PatternClassifier};
pub use config::Config;
pub use error::{AppError, ErrorKind, Result};
pub use secret::SecretString;
