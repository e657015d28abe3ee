use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key holding the serialized signed-in user
pub const USER_KEY: &str = "wardroom.user";
/// Key holding the conversation id
pub const THREAD_KEY: &str = "wardroom.thread_id";

/// String key/value storage tier.
///
/// Implementations are shared between the UI loop and spawned request tasks,
/// so they synchronize internally.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Process-scoped store. Dropped with the client, like a browser tab's session storage.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Durable store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file; the store holds a handful of small keys.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .context("Failed to read storage file")?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .context("Failed to parse storage file")?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create storage directory")?;
        }
        let content = serde_json::to_string_pretty(entries)
            .context("Failed to serialize storage")?;
        fs::write(&self.path, content)
            .context("Failed to write storage file")?;
        Ok(())
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("file store lock poisoned"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

/// The two tiers available to the client
#[derive(Clone)]
pub struct StorageTiers {
    pub tab: SharedStore,
    pub durable: SharedStore,
}

impl StorageTiers {
    pub fn open(durable_path: PathBuf) -> Result<Self> {
        Ok(Self {
            tab: MemoryStore::shared(),
            durable: Arc::new(FileStore::open(durable_path)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let store = FileStore::open(path.clone()).unwrap();
        store.set(USER_KEY, "{\"id\":\"7\"}").unwrap();
        store.set(THREAD_KEY, "case_1").unwrap();
        drop(store);

        let reopened = FileStore::open(path.clone()).unwrap();
        assert_eq!(reopened.get(THREAD_KEY).unwrap().as_deref(), Some("case_1"));

        reopened.remove(THREAD_KEY).unwrap();
        let again = FileStore::open(path).unwrap();
        assert_eq!(again.get(THREAD_KEY).unwrap(), None);
        assert!(again.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        assert!(FileStore::open(path).is_err());
    }
}
