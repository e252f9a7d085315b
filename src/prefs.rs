//! Key/value preference storage.
//!
//! Search history and saved filters are persisted through the
//! [`PreferenceStore`] capability so the view components never touch storage
//! directly. Values are strings; structured values are JSON-encoded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read a JSON value. Missing keys and undecodable values both read as `None`.
pub fn read_json<T: DeserializeOwned>(store: &dyn PreferenceStore, key: &str) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!(key, error = %err, "ignoring undecodable preference value");
            Ok(None)
        }
    }
}

pub fn write_json<T: Serialize>(store: &dyn PreferenceStore, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, &encoded)
}

/// Process-local store, used by tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::OperationFailed("preference store poisoned".to_string()))
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values()?.remove(key);
        Ok(())
    }
}

/// JSON object file shared across processes.
///
/// Every write is a locked read-modify-write followed by an atomic rename.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    timeout_ms: u64,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    /// `preferences.json` in the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "taskview", "taskview")
            .map(|dirs| dirs.data_dir().join("preferences.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.lock", self.path.display()))
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(Error::Io(err)),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _lock = FileLock::acquire(self.lock_path(), self.timeout_ms)?;
        let mut values = self.load()?;
        apply(&mut values);
        let encoded = serde_json::to_string_pretty(&values)?;
        lock::write_atomic(&self.path, encoded.as_bytes())
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(content) = lock::read_locked_str(&self.path, self.timeout_ms)? else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let values: BTreeMap<String, String> = serde_json::from_str(&content)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip_and_remove() {
        let prefs = MemoryPreferences::new();
        assert_eq!(prefs.get("k").expect("get"), None);
        prefs.set("k", "v").expect("set");
        assert_eq!(prefs.get("k").expect("get").as_deref(), Some("v"));
        prefs.remove("k").expect("remove");
        assert_eq!(prefs.get("k").expect("get"), None);
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = FilePreferences::new(dir.path().join("nested").join("prefs.json"));
        prefs.set("a", "1").expect("set a");
        prefs.set("b", "2").expect("set b");
        prefs.remove("a").expect("remove a");

        let reopened = FilePreferences::new(prefs.path().to_path_buf());
        assert_eq!(reopened.get("a").expect("get"), None);
        assert_eq!(reopened.get("b").expect("get").as_deref(), Some("2"));
    }

    #[test]
    fn undecodable_json_reads_as_none() {
        let prefs = MemoryPreferences::new();
        prefs.set("history", "not json").expect("set");
        let value: Option<Vec<String>> = read_json(&prefs, "history").expect("read");
        assert!(value.is_none());
    }
}
