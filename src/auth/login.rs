use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{session::USER_ID, AppError, AppResult};

use super::users;

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[debug_handler(state = crate::AppState)]
pub async fn login(
    State(db_pool): State<SqlitePool>,
    session: Session,

    Json(LoginBody { email, password }): Json<LoginBody>,
) -> AppResult<Json<Value>> {
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("email and password are required".into()));
    }

    let invalid = || AppError::Unauthorized("invalid credentials".into());
    let Some((user, hash)) = users::find_by_email(&db_pool, &email).await? else {
        return Err(invalid());
    };

    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(anyhow::Error::from)??;
    if !verified {
        return Err(invalid());
    }

    session.cycle_id().await?;
    session.insert(USER_ID, user.id.to_string()).await?;
    tracing::info!(user = %user.id, "signed in");

    Ok(Json(json!({ "message": "Login successful", "user": user })))
}
