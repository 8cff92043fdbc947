//! HTTP surface over the relational backend.
//!
//! Two routes, mirroring the backend's two operations: `GET /api/todos`
//! returns the full collection, `POST /api/todos` creates a task (201)
//! or rejects a missing title (400).

use crate::backend::{BackendError, SqliteBackend};
use crate::task::Task;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    backend: Arc<Mutex<SqliteBackend>>,
}

impl AppState {
    pub fn new(backend: SqliteBackend) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
        }
    }
}

/// Build the HTTP router for the todo service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/todos", get(list_todos).post(create_todo))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(addr: SocketAddr, backend: SqliteBackend) -> eyre::Result<()> {
    let app = build_router(AppState::new(backend));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Request body for task creation.
#[derive(Debug, Deserialize)]
pub struct CreateTodo {
    #[serde(default)]
    pub title: Option<String>,
}

async fn list_todos(
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, (StatusCode, Json<Value>)> {
    let backend = state.backend.lock().await;
    match backend.list_all() {
        Ok(tasks) => Ok(Json(tasks)),
        Err(e) => {
            error!(error = %e, "Failed to list todos");
            Err(internal_error())
        }
    }
}

async fn create_todo(
    State(state): State<AppState>,
    Json(request): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, Json<Value>)> {
    let title = request.title.unwrap_or_default();

    let mut backend = state.backend.lock().await;
    match backend.create(&title) {
        Ok(task) => Ok((StatusCode::CREATED, Json(task))),
        Err(BackendError::MissingTitle) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing title" })),
        )),
        Err(e) => {
            error!(error = %e, "Failed to create todo");
            Err(internal_error())
        }
    }
}

async fn health_check() -> &'static str {
    "ok"
}

fn internal_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "database error" })),
    )
}
