//! Persisted crawl state: last result, display preference, last-run timestamp.
//!
//! State lives in a flat key/value store:
//!
//! | key                 | value                               |
//! |---------------------|-------------------------------------|
//! | `lastRunTimestamp`  | epoch milliseconds                  |
//! | `crawlResult`       | array of flat character records     |
//! | `displayPreference` | `"full"` or `"short"`               |
//!
//! Every write replaces the previous value. There is no history.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::types::{CrawlError, CrawlResult, DisplayPreference, ZenyResult};

pub const KEY_LAST_RUN: &str = "lastRunTimestamp";
pub const KEY_CRAWL_RESULT: &str = "crawlResult";
pub const KEY_DISPLAY_PREFERENCE: &str = "displayPreference";

/// A flat key/value store of JSON values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> ZenyResult<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> ZenyResult<()>;
}

/// In-memory store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ZenyResult<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> ZenyResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// The whole object is rewritten on every `set`, via a temp file and rename.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

impl JsonFileStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> ZenyResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let values = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            if data.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&data).map_err(|e| {
                    CrawlError::Storage(format!("corrupt store {}: {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("opened store {} ({} keys)", path.display(), values.len());

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> ZenyResult<()> {
        let data = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> ZenyResult<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> ZenyResult<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        let mut staged = values.clone();
        staged.insert(key.to_string(), value);
        self.flush(&staged)?;
        *values = staged;
        Ok(())
    }
}

/// Typed access to the persisted crawl state.
#[derive(Clone)]
pub struct ResultStore {
    backend: Arc<dyn KeyValueStore>,
}

impl ResultStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Replace the stored result.
    pub fn persist(&self, result: &CrawlResult) -> ZenyResult<()> {
        self.backend.set(KEY_CRAWL_RESULT, serde_json::to_value(result)?)?;
        tracing::info!("stored crawl result ({} entries)", result.len());
        Ok(())
    }

    /// The stored result, or an empty one.
    pub fn load(&self) -> ZenyResult<CrawlResult> {
        match self.backend.get(KEY_CRAWL_RESULT)? {
            Some(Value::Array(items)) => Ok(serde_json::from_value(Value::Array(items))?),
            Some(other) => {
                tracing::warn!("ignoring non-array {KEY_CRAWL_RESULT}: {other}");
                Ok(CrawlResult::default())
            }
            None => Ok(CrawlResult::default()),
        }
    }

    pub fn display_preference(&self) -> ZenyResult<DisplayPreference> {
        match self.backend.get(KEY_DISPLAY_PREFERENCE)? {
            Some(Value::String(s)) => Ok(s.parse().unwrap_or_else(|_| {
                tracing::warn!("unknown stored display preference {s:?}, using full");
                DisplayPreference::Full
            })),
            _ => Ok(DisplayPreference::default()),
        }
    }

    pub fn set_display_preference(&self, preference: DisplayPreference) -> ZenyResult<()> {
        self.backend
            .set(KEY_DISPLAY_PREFERENCE, Value::from(preference.as_str()))
    }

    pub fn last_run_ms(&self) -> ZenyResult<Option<i64>> {
        Ok(self.backend.get(KEY_LAST_RUN)?.and_then(|v| v.as_i64()))
    }

    pub fn set_last_run_ms(&self, timestamp_ms: i64) -> ZenyResult<()> {
        self.backend.set(KEY_LAST_RUN, Value::from(timestamp_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterDetail, CharacterPageLink, WorldInfo};
    use tempfile::TempDir;

    fn result_with(names: &[&str]) -> CrawlResult {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                CharacterDetail::scraped(
                    CharacterPageLink::new(
                        WorldInfo::new("1", "Alpha"),
                        format!("https://x/character/1/{i}"),
                    ),
                    *name,
                    "100 Zeny",
                )
            })
            .collect()
    }

    #[test]
    fn test_load_empty_store() {
        let store = ResultStore::in_memory();
        assert!(store.load().unwrap().is_empty());
        assert_eq!(store.display_preference().unwrap(), DisplayPreference::Full);
        assert_eq!(store.last_run_ms().unwrap(), None);
    }

    #[test]
    fn test_persist_overwrites() {
        let store = ResultStore::in_memory();
        let a = result_with(&["a1", "a2", "a3"]);
        let b = result_with(&["b1"]);

        store.persist(&a).unwrap();
        store.persist(&b).unwrap();
        assert_eq!(store.load().unwrap(), b);
    }

    #[test]
    fn test_persist_empty_result() {
        let store = ResultStore::in_memory();
        store.persist(&result_with(&["a"])).unwrap();
        store.persist(&CrawlResult::default()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_file_store_round_trip_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("storage.json");

        {
            let store = ResultStore::new(Arc::new(JsonFileStore::open(&path).unwrap()));
            store.persist(&result_with(&["Poring"])).unwrap();
            store.set_display_preference(DisplayPreference::Short).unwrap();
            store.set_last_run_ms(1_700_000_000_000).unwrap();
        }

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[KEY_DISPLAY_PREFERENCE], "short");
        assert_eq!(raw[KEY_LAST_RUN], 1_700_000_000_000i64);
        assert_eq!(raw[KEY_CRAWL_RESULT][0]["characterName"], "Poring");

        let store = ResultStore::new(Arc::new(JsonFileStore::open(&path).unwrap()));
        assert_eq!(store.load().unwrap(), result_with(&["Poring"]));
        assert_eq!(store.display_preference().unwrap(), DisplayPreference::Short);
        assert_eq!(store.last_run_ms().unwrap(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(CrawlError::Storage(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.set(KEY_LAST_RUN, Value::from(1)).unwrap();

        // A directory in the temp file's place makes the next write fail.
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
        assert!(store.set(KEY_DISPLAY_PREFERENCE, Value::from("short")).is_err());
        assert_eq!(store.get(KEY_DISPLAY_PREFERENCE).unwrap(), None);

        std::fs::remove_dir(path.with_extension("json.tmp")).unwrap();
        store.set(KEY_LAST_RUN, Value::from(2)).unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[KEY_LAST_RUN], 2);
        assert!(raw.get(KEY_DISPLAY_PREFERENCE).is_none());
    }

    #[test]
    fn test_unknown_preference_falls_back_to_full() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(KEY_DISPLAY_PREFERENCE, Value::from("huge"))
            .unwrap();
        let store = ResultStore::new(backend);
        assert_eq!(store.display_preference().unwrap(), DisplayPreference::Full);
    }
}
