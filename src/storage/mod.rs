//! Small string key/value persistence.
//!
//! The notification poller keeps its last-check timestamp here so that a
//! restarted process does not replay old notifications.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// A persistent string store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// Process-local store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
    }
}

/// Store backed by a JSON object on disk, rewritten on every `set`.
///
/// Each rewrite goes to a sibling temp file that is renamed over `path`, so
/// a crash mid-write leaves the previous contents intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<DashMap<String, String>>,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Open `path`, loading existing entries if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let store = Self {
            inner: Arc::new(DashMap::new()),
            path: path.into(),
            write_lock: Arc::default(),
        };
        if store.path.exists() {
            let reader = BufReader::new(File::open(&store.path)?);
            let map: HashMap<String, String> = serde_json::from_reader(reader)?;
            for (k, v) in map {
                store.inner.insert(k, v);
            }
            tracing::debug!(path = %store.path.display(), entries = store.inner.len(), "Loaded key/value store");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> std::io::Result<()> {
        let map: HashMap<String, String> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        // Renames from concurrent saves must land in snapshot order.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tmp = self.temp_path();
        let result = write_snapshot(&tmp, &map).and_then(|()| std::fs::rename(&tmp, &self.path));
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

fn write_snapshot(path: &Path, map: &HashMap<String, String>) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, map)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    /// Write failures are logged; the in-memory value is kept.
    fn set(&self, key: &str, value: &str) {
        self.inner.insert(key.to_string(), value.to_string());
        if let Err(e) = self.save() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist key/value store");
        }
    }
}
