use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::storage::{Locator, Options, SqliteMemory};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file, or `:memory:`
    pub database: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

impl StoreConfig {
    /// Locator for the configured database, falling back to the default
    /// path under `base`.
    pub fn locator_in(&self, base: &Path) -> Locator {
        match &self.database {
            Some(dsn) => Locator::parse(dsn),
            None => Locator::File(default_database_path_in(base)),
        }
    }

    pub fn options(&self) -> Options {
        let mut options = Options::default();
        if let Some(ms) = self.busy_timeout_ms {
            options = options.with_busy_timeout(Duration::from_millis(ms));
        }
        options
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sqlite-memory.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".sqlite-memory").join("memory.db")
}

pub fn load_config(path: Option<&Path>) -> Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::ConfigExists(path.to_path_buf()));
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Create the parent directory of a file-backed database
pub fn ensure_db_dir(locator: &Locator) -> Result<()> {
    let Some(db_path) = locator.file_path() else {
        return Ok(());
    };
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Open the configured database once, then record the config at `path`.
/// Nothing is written when the database can't be opened.
pub fn init(path: &Path, config: &StoreConfig, base: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::ConfigExists(path.to_path_buf()));
    }

    let locator = config.locator_in(base);
    ensure_db_dir(&locator)?;
    SqliteMemory::open(locator, config.options())?.close()?;

    write_config(path, config, force)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite-memory.toml");
        assert_eq!(load_config(Some(&path)).unwrap(), None);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite-memory.toml");
        let config = StoreConfig {
            database: Some("data/memory.db".to_string()),
            busy_timeout_ms: Some(500),
        };

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        let err = write_config(&path, &config, false).unwrap_err();
        assert!(matches!(err, Error::ConfigExists(_)));
        write_config(&path, &StoreConfig::default(), true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(StoreConfig::default()));
    }

    #[test]
    fn test_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite-memory.toml");
        std::fs::write(&path, "busy_timeout_ms = \"soon\"").unwrap();

        assert!(matches!(load_config(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_locator_and_options() {
        let base = Path::new("/srv/app");
        assert_eq!(
            StoreConfig::default().locator_in(base),
            Locator::File(PathBuf::from("/srv/app/.sqlite-memory/memory.db"))
        );

        let config = StoreConfig {
            database: Some(":memory:".to_string()),
            busy_timeout_ms: Some(1500),
        };
        assert_eq!(config.locator_in(base), Locator::InMemory);
        assert_eq!(config.options().busy_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_ensure_db_dir_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let locator = StoreConfig::default().locator_in(dir.path());

        ensure_db_dir(&locator).unwrap();
        let store = SqliteMemory::open(locator, StoreConfig::default().options()).unwrap();
        store.set("foo", b"bar").unwrap();
        assert!(default_database_path_in(dir.path()).exists());
    }

    #[test]
    fn test_ensure_db_dir_with_uri_locator() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("memory.db");
        let config = StoreConfig {
            database: Some(format!("file:{}?mode=rwc", db_path.display())),
            busy_timeout_ms: None,
        };
        let locator = config.locator_in(dir.path());

        ensure_db_dir(&locator).unwrap();
        assert!(dir.path().join("data").is_dir());
        let created: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(created, ["data"]);

        let store = SqliteMemory::open(locator, config.options()).unwrap();
        store.set("foo", b"bar").unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_ensure_db_dir_skips_memory_uri() {
        let locator = Locator::parse("file:shared?mode=memory&cache=shared");
        ensure_db_dir(&locator).unwrap();
        assert!(!Path::new("file:shared").exists());
    }

    #[test]
    fn test_init_writes_config_after_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite-memory.toml");

        init(&path, &StoreConfig::default(), dir.path(), false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(StoreConfig::default()));
        assert!(default_database_path_in(dir.path()).exists());

        let err = init(&path, &StoreConfig::default(), dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::ConfigExists(_)));
    }

    #[test]
    fn test_init_leaves_no_config_for_unusable_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqlite-memory.toml");
        let db_path = dir.path().join("corrupt.db");
        std::fs::write(&db_path, [b'x'; 4096]).unwrap();
        let config = StoreConfig {
            database: Some(db_path.to_string_lossy().into_owned()),
            busy_timeout_ms: None,
        };

        let err = init(&path, &config, dir.path(), false).unwrap_err();
        assert!(err.is_construction(), "{err}");
        assert!(!path.exists());

        // a later init doesn't need --force
        std::fs::remove_file(&db_path).unwrap();
        init(&path, &config, dir.path(), false).unwrap();
        assert!(path.exists());
    }
}
