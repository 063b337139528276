//! SQLite storage implementation

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::Span;

use super::schema;
use crate::memory::Memory;
use crate::{Error, Result};

/// Where the backing database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Private database that disappears with its connection
    InMemory,
    /// Database file or SQLite `file:` URI, created on first open
    File(PathBuf),
}

impl Locator {
    /// DSN that selects an in-memory database
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Interpret a DSN string, `:memory:` or anything `Connection::open` takes
    pub fn parse(dsn: &str) -> Self {
        if dsn == Self::IN_MEMORY {
            Locator::InMemory
        } else {
            Locator::File(PathBuf::from(dsn))
        }
    }

    /// Filesystem path the database file lives at, `None` for in-memory
    /// databases. For `file:` URIs this is the path part without authority
    /// or query; percent-escapes are not decoded.
    pub fn file_path(&self) -> Option<PathBuf> {
        let Locator::File(path) = self else {
            return None;
        };
        let Some(uri) = path.to_str().and_then(|p| p.strip_prefix("file:")) else {
            return Some(path.clone());
        };

        let (uri, query) = uri.split_once('?').unwrap_or((uri, ""));
        let uri = uri.split('#').next().unwrap_or_default();
        let query = query.split('#').next().unwrap_or_default();
        if query.split('&').any(|param| param == "mode=memory") {
            return None;
        }

        // file://host/path, host is empty or localhost
        let uri = match uri.strip_prefix("//") {
            Some(rest) => &rest[rest.find('/').unwrap_or(rest.len())..],
            None => uri,
        };
        if uri.is_empty() || uri == Self::IN_MEMORY {
            return None;
        }
        Some(PathBuf::from(uri))
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            Locator::InMemory => Connection::open_in_memory(),
            Locator::File(path) => Connection::open(path),
        }
    }
}

impl From<&str> for Locator {
    fn from(dsn: &str) -> Self {
        Locator::parse(dsn)
    }
}

impl From<String> for Locator {
    fn from(dsn: String) -> Self {
        Locator::parse(&dsn)
    }
}

impl From<&Path> for Locator {
    fn from(path: &Path) -> Self {
        Locator::File(path.to_path_buf())
    }
}

impl From<PathBuf> for Locator {
    fn from(path: PathBuf) -> Self {
        Locator::File(path)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::InMemory => f.write_str(Self::IN_MEMORY),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Options applied when a store is opened
#[derive(Debug, Clone)]
pub struct Options {
    /// Span that schema initialisation events are recorded in
    pub span: Span,
    /// How long a statement waits on a locked database before failing
    pub busy_timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            span: Span::none(),
            busy_timeout: None,
        }
    }
}

impl Options {
    /// Record schema initialisation events inside `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Wait up to `timeout` for a locked database
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }
}

/// SQLite-backed key-value memory
///
/// The connection sits behind a mutex so a single store can be shared
/// between threads. `None` marks a closed store.
pub struct SqliteMemory {
    conn: Mutex<Option<Connection>>,
}

impl SqliteMemory {
    /// Open a database at `locator` (creates the file if it doesn't exist)
    pub fn open(locator: impl Into<Locator>, options: Options) -> Result<Self> {
        let conn = locator.into().connect().map_err(Error::Open)?;
        Self::from_connection(conn, options)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::open(Locator::InMemory, Options::default())
    }

    /// Take ownership of an already opened connection and make sure the
    /// keys table exists.
    pub fn from_connection(conn: Connection, options: Options) -> Result<Self> {
        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout).map_err(Error::Configure)?;
        }
        initialize_schema(&conn, &options.span)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Insert or replace the value stored under `key`
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        conn.execute(schema::UPSERT_KEY, params![key, value])
            .map_err(Error::Set)?;
        Ok(())
    }

    /// Get the value stored under `key`, `None` if there is no entry
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        let value: Option<Option<Vec<u8>>> = conn
            .query_row(schema::SELECT_VALUE, [key], |row| row.get(0))
            .optional()
            .map_err(Error::Get)?;

        // A NULL column still means the entry exists
        Ok(value.map(Option::unwrap_or_default))
    }

    /// Delete `key`, returning whether an entry was removed
    pub fn delete(&self, key: &str) -> Result<bool> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        let affected = conn
            .execute(schema::DELETE_KEY, [key])
            .map_err(Error::Delete)?;
        Ok(affected > 0)
    }

    /// All stored keys in ascending order
    pub fn keys(&self) -> Result<Vec<String>> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        let mut stmt = conn.prepare(schema::SELECT_KEYS).map_err(Error::ListKeys)?;

        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(Error::ListKeys)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::ScanKey)?;

        Ok(keys)
    }

    /// Close the connection. Closing an already closed store does nothing.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        let Some(conn) = guard.take() else {
            return Ok(());
        };

        if let Err((conn, e)) = conn.close() {
            // Keep the handle so the close can be retried
            *guard = Some(conn);
            return Err(Error::Close(e));
        }
        Ok(())
    }

    /// Whether [`SqliteMemory::close`] has released the connection
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    // Statements never leave the connection half-updated, so a panic in
    // another caller doesn't invalidate it.
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create the keys table unless the catalog already lists it
fn initialize_schema(conn: &Connection, span: &Span) -> Result<()> {
    let _entered = span.enter();

    let count: i64 = conn
        .query_row(schema::FIND_TABLE, [schema::KEYS_TABLE], |row| row.get(0))
        .map_err(Error::SchemaLookup)?;
    if count == 1 {
        tracing::debug!(table = schema::KEYS_TABLE, "DB is already initialised");
        return Ok(());
    }

    tracing::debug!(table = schema::KEYS_TABLE, "Initialising DB");
    conn.execute(schema::CREATE_KEYS_TABLE, [])
        .map_err(Error::SchemaInit)?;
    Ok(())
}

impl Memory for SqliteMemory {
    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        SqliteMemory::set(self, key, value)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        SqliteMemory::get(self, key)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        SqliteMemory::delete(self, key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        SqliteMemory::keys(self)
    }

    fn close(&self) -> Result<()> {
        SqliteMemory::close(self)
    }
}
