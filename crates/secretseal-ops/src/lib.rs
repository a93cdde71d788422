//! File operations on secret files, delegated to an external encryption
//! tool and wrapped in backup transactions.

pub mod facade;
pub mod sops;

pub use facade::{OperationOutcome, SecretOperationFacade};
pub use sops::{EncryptionTool, FileStatus, ToolError};
