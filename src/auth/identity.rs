use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::{db::Role, projects, AppError};

use super::users;

/// Who is on the other end of a chat connection. Fixed for the connection's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("account {0} no longer exists")]
    UnknownUser(Uuid),

    #[error("{0}")]
    RoleNotAllowed(String),

    #[error("project {0} does not exist")]
    ProjectNotFound(Uuid),

    #[error("not a participant of project {0}")]
    NotAParticipant(Uuid),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::NotSignedIn | AdmissionError::UnknownUser(_) => AppError::Unauthorized(err.to_string()),
            AdmissionError::RoleNotAllowed(_) | AdmissionError::NotAParticipant(_) => AppError::Forbidden(err.to_string()),
            AdmissionError::ProjectNotFound(_) => AppError::NotFound(err.to_string()),
            AdmissionError::Store(err) => AppError::Internal(err),
        }
    }
}

/// Resolves `user_id` into a chat identity for `project_id`.
///
/// Admission succeeds only for the project's student or advisor; everybody
/// else is turned away before a connection is ever created.
pub async fn admit(db_pool: &SqlitePool, user_id: Uuid, project_id: Uuid) -> Result<Identity, AdmissionError> {
    let user = users::find_by_id(db_pool, user_id)
        .await?
        .ok_or(AdmissionError::UnknownUser(user_id))?;
    let role = user
        .role
        .chat_role()
        .ok_or_else(|| AdmissionError::RoleNotAllowed(format!("{} accounts cannot take part in project chats", user.role)))?;

    let participants = projects::participants(db_pool, project_id)
        .await?
        .ok_or(AdmissionError::ProjectNotFound(project_id))?;
    if !participants.includes(user_id) {
        return Err(AdmissionError::NotAParticipant(project_id));
    }

    Ok(Identity {
        user_id,
        name: user.full_name,
        role,
    })
}
