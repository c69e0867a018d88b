//! Storage backends for the session and offline tiers.
//!
//! The tiers serialize entries to JSON strings under caller-chosen keys; the
//! backend is the injected analogue of browser session/local storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use xxhash_rust::xxh3::xxh3_64;

use crate::error::StorageError;

/// A string key-value store a cache tier persists into
pub trait StorageBackend: Send + Sync {
    /// Read a value. Absent keys and unreadable values are both `None`.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value, if present
    fn remove(&self, key: &str);
}

/// Process-memory backend, scoped to one instance. The session-storage
/// analogue: survives within the process, gone on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    /// Optional byte budget across all values; writes beyond it fail
    max_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects writes once total stored bytes exceed the budget
    pub fn with_quota(max_bytes: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), max_bytes: Some(max_bytes) }
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(max) = self.max_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if used + value.len() > max {
                return Err(StorageError::QuotaExceeded);
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Durable backend writing one file per key under a directory. The
/// local-storage analogue: survives process restarts.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create (and if needed, mkdir) a store rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Map a key to a filesystem-safe file name. The xxh3 suffix keeps
    /// distinct keys distinct after sanitization.
    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(64)
            .collect();
        self.dir.join(format!("{safe}-{:016x}.json", xxh3_64(key.as_bytes())))
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get("k").is_none());

        store.set("k", "value").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("value"));

        store.remove("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("a", "12345").unwrap();

        let result = store.set("b", "1234567");
        assert!(matches!(result, Err(StorageError::QuotaExceeded)));

        // Overwriting under budget is fine.
        store.set("a", "123456789").unwrap();
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.set("events:list", r#"{"n":1}"#).unwrap();
        assert_eq!(store.get("events:list").as_deref(), Some(r#"{"n":1}"#));

        store.remove("events:list");
        assert!(store.get("events:list").is_none());
    }

    #[test]
    fn test_file_store_distinct_keys_after_sanitization() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        // Both sanitize to the same prefix; hashes keep them apart.
        store.set("user/1", "one").unwrap();
        store.set("user:1", "two").unwrap();

        assert_eq!(store.get("user/1").as_deref(), Some("one"));
        assert_eq!(store.get("user:1").as_deref(), Some("two"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::new(dir.path()).unwrap();
            store.set("durable", "yes").unwrap();
        }
        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get("durable").as_deref(), Some("yes"));
    }
}
