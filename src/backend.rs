// Relational backend: the simpler, server-side persistence strategy

use crate::task::Task;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// Errors surfaced by the relational backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A create without a usable title; maps to HTTP 400.
    #[error("Missing title")]
    MissingTitle,
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),
}

/// SQLite-backed task collection.
///
/// Deliberately minimal: list and create only, no migration and no
/// change notifications. The key-value [`crate::TaskStore`] is the
/// richer strategy; this one exists for the HTTP surface.
pub struct SqliteBackend {
    db: Connection,
}

impl SqliteBackend {
    /// Open or create the backing database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let db = Connection::open(path)?;
        Self::with_connection(db)
    }

    /// Fully in-memory database, used by tests and the demo server.
    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self, BackendError> {
        debug!("Creating todos schema");
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_todos_created_at ON todos(created_at);
            "#,
        )?;
        Ok(Self { db })
    }

    /// Full collection, newest-created-first.
    pub fn list_all(&self) -> Result<Vec<Task>, BackendError> {
        let mut stmt = self.db.prepare(
            "SELECT id, title, completed, created_at, updated_at
             FROM todos ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, title, completed, created_at, updated_at) = row?;
            // Rows with corrupt ids are dropped rather than failing the list
            let Ok(id) = Uuid::parse_str(&id) else {
                continue;
            };
            tasks.push(Task {
                id,
                title,
                completed,
                created_at,
                updated_at,
            });
        }
        Ok(tasks)
    }

    /// Insert a fresh task. The server assigns id and timestamps;
    /// blank or absent titles are rejected.
    pub fn create(&mut self, title: &str) -> Result<Task, BackendError> {
        if title.trim().is_empty() {
            return Err(BackendError::MissingTitle);
        }

        let task = Task::new(title);
        self.db.execute(
            "INSERT INTO todos (id, title, completed, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                task.id.to_string(),
                task.title,
                task.completed,
                task.created_at,
                task.updated_at
            ],
        )?;

        debug!(id = %task.id, "Created todo");
        Ok(task)
    }
}
