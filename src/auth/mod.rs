use axum::{routing::post, Router};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

mod identity;
mod login;
mod logout;
mod signup;
pub mod users;

pub use identity::{admit, AdmissionError, Identity};
pub use login::login;
pub use logout::logout;
pub use signup::signup;

use crate::{session::USER_ID, AppError, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

/// User id stored in the session by [`login`].
pub async fn session_user_id(session: &Session) -> AppResult<Uuid> {
    let Some(user_id) = session.get::<String>(USER_ID).await? else {
        return Err(AdmissionError::NotSignedIn.into());
    };
    Ok(Uuid::parse_str(&user_id)?)
}

pub async fn current_user(session: &Session, db_pool: &SqlitePool) -> AppResult<users::User> {
    let user_id = session_user_id(session).await?;
    users::find_by_id(db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("account {user_id} no longer exists")))
}

/// Admission check for a project chat, driven by the caller's session.
pub async fn admit_session(session: &Session, db_pool: &SqlitePool, project_id: Uuid) -> AppResult<Identity> {
    let user_id = session_user_id(session).await?;
    Ok(admit(db_pool, user_id, project_id).await?)
}
