use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{AppError, AppResult};

use super::users::{self, AccountRole};

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub async fn signup(
    State(db_pool): State<SqlitePool>,

    Json(SignupBody { email, password, full_name, role }): Json<SignupBody>,
) -> AppResult<Json<Value>> {
    let email = email.trim().to_lowercase();
    let full_name = full_name.trim().to_owned();
    if email.is_empty() || password.is_empty() || full_name.is_empty() {
        return Err(AppError::BadRequest("email, password and full_name are required".into()));
    }

    let role = match role.as_deref().map(str::trim) {
        None | Some("") => AccountRole::Student,
        Some(role) => role.parse().map_err(AppError::BadRequest)?,
    };

    if users::email_taken(&db_pool, &email).await? {
        return Err(AppError::Conflict("email already exists".into()));
    }

    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(anyhow::Error::from)??;
    let user = users::create_user(&db_pool, &email, &hash, &full_name, role).await?;

    Ok(Json(json!({ "message": "Sign up successful", "user": user })))
}
