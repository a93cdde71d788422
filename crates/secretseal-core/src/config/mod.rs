//! Configuration schema and persistence.

mod loader;
mod schema;

pub use schema::{duration_str, BackupConfig, Config};
