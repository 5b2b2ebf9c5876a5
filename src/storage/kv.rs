//! Synchronous key-value store adapter.
//!
//! The adapter sits over any [`KeyValueBackend`] and exposes the two
//! logical collections as JSON-serialized sequences. Reads degrade to an
//! empty collection when the backend misbehaves; writes always surface the
//! failure.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::KV_TABLE;

/// Default per-origin quota, matching what browsers typically grant.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// A synchronous string key-value store.
///
/// Implementations must make each `set` atomic: a reader sees either the old
/// value or the new one, never a mix.
pub trait KeyValueBackend: Send {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&mut self, key: &str) -> StorageResult<()>;

    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Key-value backend persisted in a single SQLite file.
pub struct SqliteKeyValue {
    conn: Connection,
    quota_bytes: Option<u64>,
}

impl SqliteKeyValue {
    /// Open or create the store at the given path.
    pub fn open(path: &Path, quota_bytes: Option<u64>) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::StorageUnavailable(e.to_string()))?;
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, quota_bytes)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(quota_bytes: Option<u64>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, quota_bytes)
    }

    fn from_connection(conn: Connection, quota_bytes: Option<u64>) -> StorageResult<Self> {
        conn.execute_batch(KV_TABLE)?;
        Ok(Self { conn, quota_bytes })
    }

    /// Bytes used by every entry except `key`.
    fn used_bytes_excluding(&self, key: &str) -> StorageResult<u64> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM kv_entries WHERE key != ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as u64)
    }
}

impl KeyValueBackend for SqliteKeyValue {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_excluding(key)? + (key.len() + value.len()) as u64;
            if needed > quota {
                return Err(StorageError::StorageUnavailable(format!(
                    "quota exceeded writing '{}' ({} of {} bytes)",
                    key, needed, quota
                )));
            }
        }

        self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.conn
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryState {
    entries: HashMap<String, String>,
    quota_bytes: Option<u64>,
    available: bool,
}

/// In-process backend.
///
/// Clones share the same entries, so a test can keep a handle to change the
/// quota, switch the store off, or play the part of a second writer.
#[derive(Debug, Clone)]
pub struct MemoryKeyValue {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryKeyValue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryKeyValue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                entries: HashMap::new(),
                quota_bytes: None,
                available: true,
            })),
        }
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        let store = Self::new();
        store.set_quota(Some(quota_bytes));
        store
    }

    pub fn set_quota(&self, quota_bytes: Option<u64>) {
        self.lock().quota_bytes = quota_bytes;
    }

    /// Simulate storage being disabled (privacy mode) or re-enabled.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Bytes currently stored.
    pub fn used_bytes(&self) -> u64 {
        self.lock()
            .entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KeyValueBackend for MemoryKeyValue {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let state = self.lock();
        if !state.available {
            return Err(StorageError::StorageUnavailable("storage disabled".into()));
        }
        Ok(state.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let mut state = self.lock();
        if !state.available {
            return Err(StorageError::StorageUnavailable("storage disabled".into()));
        }

        if let Some(quota) = state.quota_bytes {
            let others: u64 = state
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.len() + v.len()) as u64)
                .sum();
            let needed = others + (key.len() + value.len()) as u64;
            if needed > quota {
                return Err(StorageError::StorageUnavailable(format!(
                    "quota exceeded writing '{}' ({} of {} bytes)",
                    key, needed, quota
                )));
            }
        }

        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let mut state = self.lock();
        if !state.available {
            return Err(StorageError::StorageUnavailable("storage disabled".into()));
        }
        state.entries.remove(key);
        Ok(())
    }
}

/// The two logical collections kept in the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Workouts,
    Templates,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Workouts, Collection::Templates];

    /// Storage key of the collection.
    pub fn key(self) -> &'static str {
        match self {
            Collection::Workouts => "workouts",
            Collection::Templates => "templates",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Collection-level adapter over a [`KeyValueBackend`].
pub struct KeyValueStore<B> {
    backend: B,
}

impl<B: KeyValueBackend> KeyValueStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a reference to the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create any missing collection as an empty sequence. Existing data is
    /// never overwritten, so calling this repeatedly is harmless.
    pub fn initialize_storage(&mut self) -> StorageResult<()> {
        for collection in Collection::ALL {
            if !self.backend.contains(collection.key())? {
                self.backend.set(collection.key(), "[]")?;
                tracing::info!("Created empty '{}' collection", collection);
            }
        }
        Ok(())
    }

    /// Read a collection, degrading to empty on any failure.
    pub fn get_collection<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        match self.try_get_collection(collection) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Reading '{}' failed, using empty collection: {}", collection, e);
                Vec::new()
            }
        }
    }

    /// Read a collection, surfacing backend and parse failures.
    pub fn try_get_collection<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> StorageResult<Vec<T>> {
        match self.backend.get(collection.key())? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replace a collection wholesale.
    pub fn set_collection<T: Serialize>(
        &mut self,
        collection: Collection,
        items: &[T],
    ) -> StorageResult<()> {
        let raw = serde_json::to_string(items)?;
        self.backend.set(collection.key(), &raw)
    }

    /// Read an arbitrary key without interpretation.
    pub fn get_raw(&self, key: &str) -> StorageResult<Option<String>> {
        self.backend.get(key)
    }

    pub fn set_raw(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.backend.set(key, value)
    }

    /// Read a collection as untyped JSON values (for migrations).
    pub fn get_raw_collection(&self, collection: Collection) -> StorageResult<Vec<Value>> {
        self.try_get_collection(collection)
    }
}
