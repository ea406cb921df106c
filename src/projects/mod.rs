mod new;

use anyhow::Context;
use axum::{routing::post, Router};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::new_project))
}

/// Who may talk in a project's chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participants {
    pub student_id: Uuid,
    pub advisor_id: Option<Uuid>,
}

impl Participants {
    pub fn includes(&self, user_id: Uuid) -> bool {
        self.student_id == user_id || self.advisor_id == Some(user_id)
    }
}

pub async fn create_project(
    db_pool: &SqlitePool,
    title: &str,
    student_id: Uuid,
    advisor_id: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO projects (id,title,student_id,advisor_id,created_at) VALUES (?,?,?,?,?)")
        .bind(id.to_string())
        .bind(title)
        .bind(student_id.to_string())
        .bind(advisor_id.as_ref().map(Uuid::to_string))
        .bind(OffsetDateTime::now_utc())
        .execute(db_pool)
        .await
        .context("inserting project")?;

    tracing::info!(project = %id, student = %student_id, "project created");
    Ok(id)
}

pub async fn participants(db_pool: &SqlitePool, project_id: Uuid) -> anyhow::Result<Option<Participants>> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT student_id,advisor_id FROM projects WHERE id=?")
            .bind(project_id.to_string())
            .fetch_optional(db_pool)
            .await
            .context("fetching project participants")?;

    let Some((student_id, advisor_id)) = row else {
        return Ok(None);
    };
    Ok(Some(Participants {
        student_id: Uuid::parse_str(&student_id)?,
        advisor_id: advisor_id.as_deref().map(Uuid::parse_str).transpose()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::users::{self, AccountRole},
        db,
    };

    #[tokio::test]
    async fn participants_cover_student_and_advisor_only() {
        let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
        let student = users::create_user(&db_pool, "s@uni.test", "h", "Sam", AccountRole::Student).await.unwrap();
        let advisor = users::create_user(&db_pool, "a@uni.test", "h", "Ada", AccountRole::Advisor).await.unwrap();
        let outsider = users::create_user(&db_pool, "o@uni.test", "h", "Otto", AccountRole::Student).await.unwrap();

        let project_id = create_project(&db_pool, "Thesis", student.id, Some(advisor.id)).await.unwrap();
        let who = participants(&db_pool, project_id).await.unwrap().unwrap();

        assert!(who.includes(student.id));
        assert!(who.includes(advisor.id));
        assert!(!who.includes(outsider.id));
        assert!(participants(&db_pool, Uuid::now_v7()).await.unwrap().is_none());
    }
}
