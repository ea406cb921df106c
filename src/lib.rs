pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod projects;
pub mod rooms;
pub mod session;

use std::sync::Arc;

use axum::{debug_handler, extract::{FromRef, State}, routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub use appresult::{AppError, AppResult};
pub use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub chat: rooms::Chat,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, hub: rooms::Hub, outbox_capacity: usize) -> Self {
        let store = Arc::new(rooms::SqliteChatStore::new(db_pool.clone()));
        AppState {
            db_pool,
            chat: rooms::Chat { hub, store, outbox_capacity },
        }
    }
}

/// Every route of the service, without the session and http layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api", auth::router())
        .nest("/api/projects", projects::router())
        .nest("/api/chats", rooms::router())
}

#[debug_handler(state = AppState)]
async fn health(State(chat): State<rooms::Chat>) -> Json<Value> {
    Json(json!({ "status": "healthy", "rooms": chat.hub.room_count().await }))
}
