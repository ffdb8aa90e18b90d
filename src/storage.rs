//! Persistence backends for the URL store
//!
//! The store keeps its records in memory and hands the whole mapping to a
//! [`Storage`] after every mutation. Backends only need to load and save that
//! mapping; they never see individual operations.

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;
use tracing::error;

use crate::error::StorageError;
use crate::model::UrlRecord;

/// Short code to record mapping, as loaded and saved by backends
pub type RecordMap = HashMap<String, UrlRecord>;

/// Main table for URL records
///
/// Key: short code
/// Value: JSON-serialized UrlRecord
///
/// Example:
/// - Key: "abc123"
/// - Value: '{"longURL":"https://example.com","shortCode":"abc123",...}'
pub const TABLE_URLS: TableDefinition<&str, &str> = TableDefinition::new("short_urls_v1");

pub trait Storage: Send + Sync {
    /// Reads every persisted record. An empty backend yields an empty map.
    fn load(&self) -> Result<RecordMap, StorageError>;

    /// Replaces the persisted contents with `records`
    fn save(&self, records: &RecordMap) -> Result<(), StorageError>;
}

/// Embedded redb file backend
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    /// Creates or opens the database file at `db_path` and makes sure the
    /// records table exists.
    ///
    /// ```no_run
    /// # use ttl_shortener::storage::RedbStorage;
    /// let storage = RedbStorage::open("data.db").expect("Failed to open database");
    /// ```
    pub fn open(db_path: &str) -> Result<Self, StorageError> {
        let db = Database::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(TABLE_URLS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Like [`RedbStorage::open`], but a file redb cannot open is moved aside
    /// to `{db_path}.corrupt-{unix_ts}` and replaced by a fresh, empty one.
    pub fn open_or_recover(db_path: &str) -> Result<Self, StorageError> {
        match Self::open(db_path) {
            Ok(storage) => Ok(storage),
            Err(err) => {
                let moved_to = format!("{}.corrupt-{}", db_path, Utc::now().timestamp());
                error!(
                    path = db_path,
                    moved_to = %moved_to,
                    error = %err,
                    "Failed to open database, starting with an empty one"
                );
                fs::rename(db_path, &moved_to).map_err(|io| {
                    StorageError::Unavailable(format!(
                        "could not move '{}' aside: {}",
                        db_path, io
                    ))
                })?;
                Self::open(db_path)
            }
        }
    }
}

impl Storage for RedbStorage {
    fn load(&self) -> Result<RecordMap, StorageError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_URLS)?;

        let mut records = RecordMap::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            let record: UrlRecord = serde_json::from_str(value.value())?;
            records.insert(key.value().to_string(), record);
        }

        Ok(records)
    }

    fn save(&self, records: &RecordMap) -> Result<(), StorageError> {
        // Serialize up front so a bad record aborts before anything is written
        let rows = records
            .iter()
            .map(|(code, record)| Ok((code.as_str(), serde_json::to_string(record)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_URLS)?;

            let mut stale = Vec::new();
            for entry in table.iter()? {
                let (key, _) = entry?;
                let code = key.value();
                if !records.contains_key(code) {
                    stale.push(code.to_string());
                }
            }

            for code in &stale {
                table.remove(code.as_str())?;
            }

            for (code, json) in &rows {
                table.insert(*code, json.as_str())?;
            }
        }
        write_txn.commit()?;

        Ok(())
    }
}

/// Process-local backend, mostly for tests and throwaway instances
#[derive(Default)]
pub struct MemoryStorage {
    records: Mutex<RecordMap>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `records` already "persisted"
    pub fn with_records(records: RecordMap) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Copy of what was last saved
    pub fn snapshot(&self) -> RecordMap {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<RecordMap, StorageError> {
        Ok(self.snapshot())
    }

    fn save(&self, records: &RecordMap) -> Result<(), StorageError> {
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = records.clone();
        Ok(())
    }
}
