// todostore - Todo task store with versioned key-value persistence and
// a SQLite-backed HTTP API

pub mod backend;
pub mod http;
pub mod storage;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use backend::{BackendError, SqliteBackend};
pub use storage::{ChangeEvent, FileStorage, KvStorage, MemoryStorage, SharedStorage, StorageHandle};
pub use store::{CURRENT_KEY, LEGACY_KEY, TaskStore};
pub use task::{FilterKind, Stats, Task, now_ms};
