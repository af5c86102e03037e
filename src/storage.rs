use dashmap::DashMap;
use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Key holding the serialized signed-in identity.
pub const IDENTITY_KEY: &str = "user";

/// Legacy auth-token key. Nothing writes it any more, but logout still
/// clears it in case an older client left one behind.
pub const TOKEN_KEY: &str = "token";

/// Durable string key/value storage, the client-side equivalent of a
/// browser's local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> io::Result<()>;
    fn remove(&self, key: &str) -> io::Result<()>;
}

// ── File-backed store ──────────────────────────────────────────────────────

/// Persists every entry into one flat JSON object on disk. The whole file is
/// rewritten on each mutation; a missing or corrupt file reads as empty.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles on the file.
    guard: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Could not read {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Ignoring corrupt storage file {}: {}", self.path.display(), e);
            BTreeMap::new()
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries).map_err(io::Error::other)?;
        fs::write(&self.path, json)
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> io::Result<()> {
        let _lock = self.guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries = self.load();
        f(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: String) -> io::Result<()> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value);
        })
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
        })
    }
}

// ── In-memory store ────────────────────────────────────────────────────────

/// Non-durable store for tests and throwaway sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: String) -> io::Result<()> {
        self.inner.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.inner.remove(key);
        Ok(())
    }
}
