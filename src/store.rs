// TaskStore: in-memory task list with write-through key-value persistence

use crate::storage::{ChangeEvent, StorageHandle};
use crate::task::{FilterKind, Stats, Task, normalized_key, now_ms};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Storage key holding the versioned, structured task list.
pub const CURRENT_KEY: &str = "todos.v1";

/// Storage key of the pre-migration format: a JSON array of titles.
pub const LEGACY_KEY: &str = "todos";

/// Owns the in-memory task list and its persisted representation.
///
/// Every mutation computes a new full list and funnels through
/// [`TaskStore::commit`]: replace memory, serialize, write through to
/// storage. Persistence failures are swallowed; the in-memory list
/// stays authoritative for the session.
pub struct TaskStore {
    storage: StorageHandle,
    tasks: Vec<Task>,
}

impl TaskStore {
    /// Build a store over one context's storage handle. Call
    /// [`TaskStore::load`] before use.
    pub fn new(storage: StorageHandle) -> Self {
        Self {
            storage,
            tasks: Vec::new(),
        }
    }

    /// Bootstrap from storage.
    ///
    /// Prefers the versioned key; falls back to migrating the legacy
    /// title array (mapped in original order, no dedup), writing the
    /// result to the versioned key and deleting the legacy one. After a
    /// successful migration, repeated loads always take the versioned
    /// path and never re-migrate. Malformed payloads fail soft to an
    /// empty list.
    pub fn load(&mut self) -> &[Task] {
        if let Some(raw) = self.storage.get(CURRENT_KEY) {
            self.tasks = parse_task_list(&raw);
            return &self.tasks;
        }

        if let Some(raw) = self.storage.get(LEGACY_KEY) {
            let titles = parse_legacy_titles(&raw);
            info!(count = titles.len(), "Migrating legacy task list");

            let tasks: Vec<Task> = titles.iter().map(|title| Task::new(title)).collect();
            self.commit(tasks);
            self.storage.delete(LEGACY_KEY);
            return &self.tasks;
        }

        self.tasks.clear();
        &self.tasks
    }

    /// Prepend a fresh task. No-op when the trimmed title is blank or
    /// its normalized key collides with an existing task. Returns
    /// whether a task was added.
    pub fn add(&mut self, title: &str) -> bool {
        let key = normalized_key(title);
        if key.is_empty() {
            debug!("Ignoring blank title");
            return false;
        }
        if self.tasks.iter().any(|task| task.normalized_key() == key) {
            debug!(title, "Ignoring duplicate title");
            return false;
        }

        let mut tasks = Vec::with_capacity(self.tasks.len() + 1);
        tasks.push(Task::new(title));
        tasks.extend(self.tasks.iter().cloned());
        self.commit(tasks);
        true
    }

    /// Set a task's completion state and bump its `updated_at`. No-op
    /// on unknown ids.
    pub fn toggle(&mut self, id: Uuid, completed: bool) -> bool {
        if !self.tasks.iter().any(|task| task.id == id) {
            debug!(%id, "Ignoring toggle for unknown task");
            return false;
        }

        let tasks = self
            .tasks
            .iter()
            .cloned()
            .map(|mut task| {
                if task.id == id {
                    task.completed = completed;
                    task.updated_at = now_ms();
                }
                task
            })
            .collect();
        self.commit(tasks);
        true
    }

    /// Remove the task with the given id. No-op on unknown ids.
    pub fn remove(&mut self, id: Uuid) -> bool {
        if !self.tasks.iter().any(|task| task.id == id) {
            debug!(%id, "Ignoring removal of unknown task");
            return false;
        }

        let tasks = self.tasks.iter().filter(|task| task.id != id).cloned().collect();
        self.commit(tasks);
        true
    }

    /// Drop every completed task. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let tasks: Vec<Task> = self.tasks.iter().filter(|task| !task.completed).cloned().collect();
        let removed = self.tasks.len() - tasks.len();
        self.commit(tasks);
        removed
    }

    /// Mark every task completed. Already-completed tasks keep their
    /// `updated_at`, which makes repeated calls idempotent.
    pub fn complete_all(&mut self) {
        self.set_all(true);
    }

    /// Mark every task incomplete. Already-incomplete tasks are left
    /// unchanged.
    pub fn uncheck_all(&mut self) {
        self.set_all(false);
    }

    fn set_all(&mut self, completed: bool) {
        let tasks = self
            .tasks
            .iter()
            .cloned()
            .map(|mut task| {
                if task.completed != completed {
                    task.completed = completed;
                    task.updated_at = now_ms();
                }
                task
            })
            .collect();
        self.commit(tasks);
    }

    /// Pure projection of the list; never mutates.
    pub fn filter(&self, kind: FilterKind) -> Vec<&Task> {
        self.tasks.iter().filter(|task| kind.matches(task)).collect()
    }

    /// Counts over the full list, independent of any filter.
    pub fn stats(&self) -> Stats {
        let completed = self.tasks.iter().filter(|task| task.completed).count();
        Stats {
            total: self.tasks.len(),
            active: self.tasks.len() - completed,
            completed,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Drain pending change notifications from other contexts and apply
    /// them. This is the only way the list changes without a local
    /// mutation.
    pub fn sync_external(&mut self) {
        while let Some(event) = self.storage.poll_change() {
            self.apply_external(&event);
        }
    }

    fn apply_external(&mut self, event: &ChangeEvent) {
        if event.key != CURRENT_KEY {
            return;
        }
        let Some(raw) = event.new_value.as_deref() else {
            return;
        };
        if raw.is_empty() {
            return;
        }

        // Whole-list replace, last writer wins. An unparseable payload
        // keeps the last-known-good state.
        match serde_json::from_str::<Vec<Task>>(raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "Applying cross-context task list update");
                self.tasks = tasks;
            }
            Err(e) => {
                warn!(error = ?e, "Ignoring unparseable cross-context update");
            }
        }
    }

    /// Single choke-point for mutations: replace memory, then write
    /// through.
    fn commit(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        match serde_json::to_string(&self.tasks) {
            Ok(json) => self.storage.set(CURRENT_KEY, &json),
            Err(e) => warn!(error = ?e, "Failed to serialize task list"),
        }
    }
}

fn parse_task_list(raw: &str) -> Vec<Task> {
    match serde_json::from_str(raw) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(error = ?e, "Malformed task list in storage, starting empty");
            Vec::new()
        }
    }
}

fn parse_legacy_titles(raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(titles) => titles,
        Err(e) => {
            warn!(error = ?e, "Malformed legacy task list, starting empty");
            Vec::new()
        }
    }
}
