use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{auth, db::ChatMessage, AppResult};

use super::Chat;

/// GET /api/chats/{project_id}/messages
#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_history(
    State(db_pool): State<SqlitePool>,
    State(chat): State<Chat>,
    session: Session,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<ChatMessage>>> {
    auth::admit_session(&session, &db_pool, project_id).await?;
    Ok(Json(chat.store.fetch_history(project_id).await?))
}

/// PATCH /api/chats/{project_id}/read
#[debug_handler(state = crate::AppState)]
pub(crate) async fn mark_read(
    State(db_pool): State<SqlitePool>,
    State(chat): State<Chat>,
    session: Session,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let identity = auth::admit_session(&session, &db_pool, project_id).await?;
    let count = chat.store.mark_read(project_id, identity.user_id).await?;
    Ok(Json(json!({ "message": "Messages marked as read", "count": count })))
}

/// GET /api/chats/unread
#[debug_handler(state = crate::AppState)]
pub(crate) async fn unread_count(
    State(chat): State<Chat>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = auth::session_user_id(&session).await?;
    let count = chat.store.unread_count(user_id).await?;
    Ok(Json(json!({ "count": count })))
}
