//! Key lifecycle management: generation, passphrase protection, timed
//! decryption, auto-expiry, and secure erasure.

pub mod agetool;
pub mod lifecycle;
pub mod passphrase;

#[cfg(test)]
mod testsupport;

pub use agetool::{KeyPair, KeyTool};
pub use lifecycle::{KeyLifecycleManager, KeyPhase};
pub use passphrase::{PassphraseFlow, PassphraseStep};
