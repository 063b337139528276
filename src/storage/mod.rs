//! Storage Layer - SQLite-backed persistence
//!
//! A single table holds every entry:
//! - keys(key, value)

pub mod schema;
pub mod sqlite;

pub use sqlite::{Locator, Options, SqliteMemory};
