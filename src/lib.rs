//! # sqlite-memory - Persistent key-value memory on SQLite
//!
//! Stores arbitrary binary values under unique string keys in a single
//! SQLite table. The database can live in a file or in memory.
//!
//! sqlite-memory provides:
//! - [`SqliteMemory`], the store itself (set, get, delete, keys, close)
//! - [`Memory`], the trait hosts program against
//! - TOML configuration for hosts that open the store from a config file

pub mod storage;
pub mod memory;
pub mod config;

// Re-exports for convenient access
pub use memory::Memory;
pub use storage::{Locator, Options, SqliteMemory};

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open DB for given DSN: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("failed to configure DB connection: {0}")]
    Configure(#[source] rusqlite::Error),

    #[error("failed to find existing tables: {0}")]
    SchemaLookup(#[source] rusqlite::Error),

    #[error("failed to initialise: {0}")]
    SchemaInit(#[source] rusqlite::Error),

    #[error("unable to set key: {0}")]
    Set(#[source] rusqlite::Error),

    #[error("unable to get key: {0}")]
    Get(#[source] rusqlite::Error),

    #[error("unable to delete key: {0}")]
    Delete(#[source] rusqlite::Error),

    #[error("failed to get key list: {0}")]
    ListKeys(#[source] rusqlite::Error),

    #[error("failed to scan key: {0}")]
    ScanKey(#[source] rusqlite::Error),

    #[error("failed to close DB: {0}")]
    Close(#[source] rusqlite::Error),

    #[error("memory is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("config already exists at {0} (use --force to overwrite)")]
    ConfigExists(std::path::PathBuf),
}

impl Error {
    /// True for failures raised while opening the store, before any
    /// operation could run.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Error::Open(_) | Error::Configure(_) | Error::SchemaLookup(_) | Error::SchemaInit(_)
        )
    }
}
