// Data model for the todo task store

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single todo item.
///
/// The persisted payload uses camelCase field names, matching the
/// storage format the versioned key has always held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Build a fresh task from a title. The title is stored trimmed but
    /// otherwise raw; normalization only ever happens for dedup keys.
    pub fn new(title: &str) -> Self {
        let now = now_ms();
        Self {
            id: Uuid::now_v7(),
            title: title.trim().to_string(),
            completed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Duplicate-detection key for this task's title.
    pub fn normalized_key(&self) -> String {
        normalized_key(&self.title)
    }
}

/// Trim, then strip every internal whitespace run entirely.
///
/// This is deliberately stricter than trimming: "Buy milk" and
/// "Buy  milk" both map to "Buymilk" and collide. The key is used only
/// for duplicate detection, never as the stored title.
pub fn normalized_key(title: &str) -> String {
    title.split_whitespace().collect()
}

/// Projection over a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    All,
    Active,
    Completed,
}

impl FilterKind {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterKind::All => true,
            FilterKind::Active => !task.completed,
            FilterKind::Completed => task.completed,
        }
    }
}

/// Counts over the full list, independent of any active filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

/// Current timestamp in milliseconds since epoch.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before Unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms() {
        let ts = now_ms();
        assert!(ts > 0);
        // Should be reasonable timestamp (after year 2020)
        assert!(ts > 1_600_000_000_000);
    }

    #[test]
    fn test_new_task_defaults() {
        let task = Task::new("  Buy milk  ");
        assert_eq!(task.title, "Buy milk");
        assert!(!task.completed);
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn test_new_tasks_get_distinct_ids() {
        let a = Task::new("a");
        let b = Task::new("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_normalized_key_strips_internal_whitespace() {
        assert_eq!(normalized_key("Buy milk"), "Buymilk");
        assert_eq!(normalized_key("Buy  milk"), "Buymilk");
        assert_eq!(normalized_key("  Buy\tmilk \n"), "Buymilk");
        assert_eq!(normalized_key("   "), "");
    }

    #[test]
    fn test_task_serialization_uses_camel_case() {
        let task = Task::new("x");
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\""));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_filter_kind_matches() {
        let mut task = Task::new("x");
        assert!(FilterKind::All.matches(&task));
        assert!(FilterKind::Active.matches(&task));
        assert!(!FilterKind::Completed.matches(&task));

        task.completed = true;
        assert!(FilterKind::All.matches(&task));
        assert!(!FilterKind::Active.matches(&task));
        assert!(FilterKind::Completed.matches(&task));
    }
}
