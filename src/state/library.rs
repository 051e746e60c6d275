use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::data::CatalogEntry;

/// Key holding the serialized catalog (JSON array of entries)
pub const CATALOG_KEY: &str = "tierListData";
/// Key holding the RFC 3339 timestamp of the last catalog write
pub const LAST_UPDATE_KEY: &str = "lastUpdate";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Flat string key-value persistence.
///
/// Reads of a missing key yield `Ok(None)`; callers choose the fallback.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// SQLite-backed key-value store, one file per user.
pub struct SqliteStore {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the store file inside `data_dir`.
    ///
    /// The default location is the user's data directory:
    /// - Linux: ~/.local/share/tierdeck/tierdeck.db
    /// - macOS: ~/Library/Application Support/tierdeck/tierdeck.db
    /// - Windows: %APPDATA%\tierdeck\tierdeck.db
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir).map_err(|source| StorageError::DataDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let db_path = data_dir.join("tierdeck.db");
        let conn = Connection::open(&db_path)?;
        tracing::info!("📁 Catalog store opened at: {}", db_path.display());

        let store = SqliteStore {
            conn,
            db_path: Some(db_path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Private, throwaway store (tests and headless use)
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = SqliteStore {
            conn: Connection::open_in_memory()?,
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key     TEXT PRIMARY KEY,
                value   TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Path to the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

/// The Library is the durable copy of the catalog.
/// Every catalog write also stamps the last-update time.
#[derive(Debug)]
pub struct Library<S> {
    store: S,
}

impl<S: KeyValueStore> Library<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The persisted catalog, or `None` if nothing was ever saved
    pub fn read_catalog(&self) -> Result<Option<Vec<CatalogEntry>>, StorageError> {
        match self.store.get(CATALOG_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn write_catalog(&self, entries: &[CatalogEntry]) -> Result<(), StorageError> {
        let json = serde_json::to_string(entries)?;
        self.store.set(CATALOG_KEY, &json)?;

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.store.set(LAST_UPDATE_KEY, &stamp)?;

        tracing::debug!("💾 Saved {} catalog entries", entries.len());
        Ok(())
    }

    /// Time of the last catalog write. A stamp that does not parse counts as absent.
    pub fn read_last_update(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let Some(raw) = self.store.get(LAST_UPDATE_KEY)? else {
            return Ok(None);
        };

        match DateTime::parse_from_rfc3339(&raw) {
            Ok(stamp) => Ok(Some(stamp.with_timezone(&Utc))),
            Err(e) => {
                tracing::warn!("⚠️  Ignoring unreadable last-update stamp {:?}: {}", raw, e);
                Ok(None)
            }
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{EntryId, ImagePayload, Rank};

    fn library() -> Library<SqliteStore> {
        Library::new(SqliteStore::open_in_memory().unwrap())
    }

    fn sample_entries() -> Vec<CatalogEntry> {
        vec![
            CatalogEntry {
                id: EntryId(1_700_000_000_000),
                title: "Foo".to_string(),
                rank: Rank::S,
                image: Some(ImagePayload::from_bytes("image/jpeg", b"foo")),
                description: None,
            },
            CatalogEntry {
                id: EntryId(1_700_000_000_001),
                title: "Ünïcødé — Bar".to_string(),
                rank: Rank::F,
                image: None,
                description: Some("long\nmultiline text".to_string()),
            },
        ]
    }

    #[test]
    fn test_missing_keys_read_as_absent() {
        let library = library();
        assert!(library.read_catalog().unwrap().is_none());
        assert!(library.read_last_update().unwrap().is_none());
    }

    #[test]
    fn test_write_then_read_returns_same_catalog() {
        let library = library();
        let entries = sample_entries();

        library.write_catalog(&entries).unwrap();

        assert_eq!(library.read_catalog().unwrap(), Some(entries));
    }

    #[test]
    fn test_empty_catalog_is_present_not_absent() {
        let library = library();
        library.write_catalog(&[]).unwrap();
        assert_eq!(library.read_catalog().unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_write_stamps_last_update() {
        let library = library();
        let before = Utc::now() - chrono::Duration::seconds(1);

        library.write_catalog(&sample_entries()).unwrap();

        let stamp = library.read_last_update().unwrap().unwrap();
        assert!(stamp >= before);
        let raw = library.store().get(LAST_UPDATE_KEY).unwrap().unwrap();
        assert!(raw.ends_with('Z'));
    }

    #[test]
    fn test_unparseable_stamp_is_absent() {
        let library = library();
        library.store().set(LAST_UPDATE_KEY, "yesterday").unwrap();
        assert!(library.read_last_update().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_catalog_is_an_error() {
        let library = library();
        library.store().set(CATALOG_KEY, "{not json").unwrap();
        assert!(matches!(library.read_catalog(), Err(StorageError::Json(_))));
    }

    #[test]
    fn test_store_file_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let library = Library::new(SqliteStore::open(dir.path()).unwrap());
            library.write_catalog(&sample_entries()).unwrap();
        }

        let reopened = Library::new(SqliteStore::open(dir.path()).unwrap());
        assert_eq!(reopened.read_catalog().unwrap(), Some(sample_entries()));
        assert!(reopened.store().path().unwrap().ends_with("tierdeck.db"));
    }
}
