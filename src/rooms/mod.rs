//! Project chat rooms: admission, live fan-out and history.

mod conn;
mod history;
mod hub;
mod msg;
mod registry;
mod store;
mod ws;

use std::sync::Arc;

use axum::{routing::{get, patch}, Router};
use uuid::Uuid;

pub use conn::{ConnId, Connection, Outbox, Rejected};
pub use hub::Hub;
pub use msg::{Inbound, ServerEvent};
pub use registry::RoomRegistry;
pub use store::{ChatStore, SqliteChatStore};
pub use ws::run_session;

use crate::AppState;

/// A room is a project's conversation, keyed by the project id.
pub type RoomId = Uuid;

/// What a chat session needs besides its transport.
#[derive(Clone)]
pub struct Chat {
    pub hub: Hub,
    pub store: Arc<dyn ChatStore>,
    pub outbox_capacity: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/unread", get(history::unread_count))
        .route("/{project_id}/ws", get(ws::room_ws))
        .route("/{project_id}/messages", get(history::chat_history))
        .route("/{project_id}/read", patch(history::mark_read))
}
