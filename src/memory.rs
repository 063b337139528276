//! The key-value contract a host application programs against.

use crate::Result;

/// Persistent key-value memory.
///
/// Missing keys are never errors: [`Memory::get`] returns `None` and
/// [`Memory::delete`] returns `false`.
pub trait Memory: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Look up the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove `key`. Returns whether an entry was actually removed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// List every stored key.
    fn keys(&self) -> Result<Vec<String>>;

    /// Release the underlying resources. Calling it again is a no-op.
    fn close(&self) -> Result<()>;
}
