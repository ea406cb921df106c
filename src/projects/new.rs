use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{auth::{self, users::AccountRole}, AppError, AppResult};

#[derive(Debug, Deserialize)]
pub(crate) struct NewProjectBody {
    title: String,
    advisor_id: Option<Uuid>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_project(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(NewProjectBody { title, advisor_id }): Json<NewProjectBody>,
) -> AppResult<Json<Value>> {
    let user = auth::current_user(&session, &db_pool).await?;
    if user.role != AccountRole::Student {
        return Err(AppError::Forbidden("only students create projects".into()));
    }

    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("title is required".into()));
    }

    if let Some(advisor_id) = advisor_id {
        match auth::users::find_by_id(&db_pool, advisor_id).await? {
            Some(advisor) if advisor.role == AccountRole::Advisor => {}
            _ => return Err(AppError::BadRequest(format!("{advisor_id} is not an advisor"))),
        }
    }

    let id = super::create_project(&db_pool, title, user.id, advisor_id).await?;
    Ok(Json(json!({ "id": id, "title": title, "student_id": user.id, "advisor_id": advisor_id })))
}
