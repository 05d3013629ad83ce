//! File-backed key/value store for persistent progress variables.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use game_core::{KeyValueStore, StoreResult};

use super::error::{RepositoryError, Result};

const STORE_FILE: &str = "store.json";

/// Persists every entry as one JSON object.
///
/// Reads are served from memory. Each write rewrites the whole file through
/// a temp file and an atomic rename; memory only changes once that succeeds.
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Opens (or creates) the store inside `base_dir`.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir).map_err(RepositoryError::Io)?;

        let path = base_dir.join(STORE_FILE);
        let entries = if path.exists() {
            let text = fs::read_to_string(&path).map_err(RepositoryError::Io)?;
            let entries: HashMap<String, String> = serde_json::from_str(&text).map_err(|e| {
                RepositoryError::CorruptedData(format!("{}: {}", path.display(), e))
            })?;
            tracing::debug!("Loaded {} keys from {}", entries.len(), path.display());
            entries
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let mut updated = entries.clone();
        mutate(&mut updated);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let ordered: BTreeMap<&str, &str> = entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        let text =
            serde_json::to_string_pretty(&ordered).map_err(|e| RepositoryError::Json(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, text).map_err(RepositoryError::Io)?;
        fs::rename(&temp_path, &self.path).map_err(RepositoryError::Io)?;

        tracing::debug!("Saved {} keys to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().ok()?;
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
        .map_err(|err| err.into_store_error(key))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
        .map_err(|err| err.into_store_error(key))
    }
}
