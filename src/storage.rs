// Key-value storage capability with cross-context change notifications

use eyre::{Context, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Scoped key-value persistence.
///
/// Write failures are swallowed by implementations: the caller's
/// in-memory state stays authoritative for the session even when
/// persistence is unavailable.
pub trait KvStorage: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn delete(&mut self, key: &str);
}

/// In-memory storage, used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn delete(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Durable storage: one file per key under a base directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open or create storage rooted at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create storage directory")?;
        Ok(Self { base_path })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }
}

impl KvStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.key_path(key)).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        let path = self.key_path(key);

        let mut file = match fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
        {
            Ok(f) => f,
            Err(e) => {
                warn!(key, error = ?e, "Failed to open storage file, dropping write");
                return;
            }
        };

        // Acquire exclusive lock before writing
        if let Err(e) = file.lock_exclusive() {
            warn!(key, error = ?e, "Failed to acquire file lock, dropping write");
            return;
        }

        if let Err(e) = file.write_all(value.as_bytes()).and_then(|()| file.sync_all()) {
            warn!(key, error = ?e, "Failed to write storage file, dropping write");
        }

        // Lock is automatically released when file is dropped
    }

    fn delete(&mut self, key: &str) {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key, error = ?e, "Failed to delete storage key"),
        }
    }
}

/// A change observed on a watched storage key.
///
/// `new_value` is `None` when the key was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub key: String,
    pub new_value: Option<String>,
}

struct Subscriber {
    id: u64,
    tx: Sender<ChangeEvent>,
}

struct Inner {
    backend: Box<dyn KvStorage>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
}

impl Inner {
    /// Fan a change out to every context except the one that wrote it.
    fn broadcast(&mut self, from: u64, key: &str, new_value: Option<&str>) {
        self.subscribers.retain(|sub| {
            if sub.id == from {
                return true;
            }
            sub.tx
                .send(ChangeEvent {
                    key: key.to_string(),
                    new_value: new_value.map(str::to_string),
                })
                .is_ok()
        });
    }
}

/// Storage shared between execution contexts.
///
/// Each context holds a [`StorageHandle`]; writes through one handle are
/// delivered to every other handle as [`ChangeEvent`]s, mirroring the
/// browser `storage` event across tabs. Same-context writers never
/// observe their own writes.
#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Mutex<Inner>>,
}

impl SharedStorage {
    pub fn new<S: KvStorage + 'static>(backend: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                backend: Box::new(backend),
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a new context against this storage.
    pub fn attach(&self) -> StorageHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let (tx, events) = channel();
        inner.subscribers.push(Subscriber { id, tx });
        debug!(context = id, "Attached storage context");

        StorageHandle {
            storage: self.clone(),
            id,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("storage mutex poisoned")
    }
}

/// One execution context's view of a [`SharedStorage`].
pub struct StorageHandle {
    storage: SharedStorage,
    id: u64,
    events: Receiver<ChangeEvent>,
}

impl StorageHandle {
    pub fn get(&self, key: &str) -> Option<String> {
        self.storage.lock().backend.get(key)
    }

    pub fn set(&self, key: &str, value: &str) {
        let mut inner = self.storage.lock();
        inner.backend.set(key, value);
        inner.broadcast(self.id, key, Some(value));
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.storage.lock();
        inner.backend.delete(key);
        inner.broadcast(self.id, key, None);
    }

    /// Next change made by another context, if any is pending.
    pub fn poll_change(&self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage_roundtrip() {
        let mut storage = MemoryStorage::new();
        assert_eq!(storage.get("k"), None);

        storage.set("k", "v");
        assert_eq!(storage.get("k"), Some("v".to_string()));

        storage.delete("k");
        assert_eq!(storage.get("k"), None);
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path()).unwrap();

        storage.set("todos.v1", "[1,2,3]");
        assert_eq!(storage.get("todos.v1"), Some("[1,2,3]".to_string()));
        assert!(temp.path().join("todos.v1").exists());

        storage.set("todos.v1", "[]");
        assert_eq!(storage.get("todos.v1"), Some("[]".to_string()));

        storage.delete("todos.v1");
        assert_eq!(storage.get("todos.v1"), None);
    }

    #[test]
    fn test_file_storage_delete_missing_key_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::open(temp.path()).unwrap();
        storage.delete("never-written");
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let temp = TempDir::new().unwrap();

        {
            let mut storage = FileStorage::open(temp.path()).unwrap();
            storage.set("todos", r#"["a"]"#);
        }

        let storage = FileStorage::open(temp.path()).unwrap();
        assert_eq!(storage.get("todos"), Some(r#"["a"]"#.to_string()));
    }

    #[test]
    fn test_writer_does_not_observe_own_change() {
        let shared = SharedStorage::new(MemoryStorage::new());
        let writer = shared.attach();

        writer.set("k", "v");
        assert_eq!(writer.poll_change(), None);
    }

    #[test]
    fn test_other_contexts_observe_changes() {
        let shared = SharedStorage::new(MemoryStorage::new());
        let a = shared.attach();
        let b = shared.attach();

        a.set("k", "v1");
        let event = b.poll_change().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.new_value, Some("v1".to_string()));

        a.delete("k");
        let event = b.poll_change().unwrap();
        assert_eq!(event.key, "k");
        assert_eq!(event.new_value, None);

        assert_eq!(b.poll_change(), None);
    }

    #[test]
    fn test_contexts_share_backend_state() {
        let shared = SharedStorage::new(MemoryStorage::new());
        let a = shared.attach();
        let b = shared.attach();

        a.set("k", "v");
        assert_eq!(b.get("k"), Some("v".to_string()));
    }
}
