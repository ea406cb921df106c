use std::{fmt, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name     TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('student', 'advisor', 'admin')),
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    student_id TEXT NOT NULL REFERENCES users(id),
    advisor_id TEXT REFERENCES users(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id          TEXT PRIMARY KEY,
    project_id  TEXT NOT NULL,
    sender_id   TEXT NOT NULL,
    sender_role TEXT NOT NULL CHECK (sender_role IN ('student', 'advisor')),
    message     TEXT NOT NULL,
    is_read     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_messages_project
    ON chat_messages (project_id, created_at);
"#;

/// Opens the pool and makes sure the schema exists.
///
/// In-memory databases are per connection, so callers using `sqlite::memory:`
/// should pass `max_connections = 1`.
pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .with_context(|| format!("connecting to {database_url}"))?;

    sqlx::raw_sql(SCHEMA)
        .execute(&db_pool)
        .await
        .context("initializing schema")?;

    Ok(db_pool)
}

/// Role of a chat participant. Admins have accounts but never join a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Advisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Advisor => "advisor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "advisor" => Ok(Role::Advisor),
            other => Err(format!("{other} cannot take part in project chats")),
        }
    }
}

/// Display info of the author, joined from `users`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sender {
    pub id: Uuid,
    pub full_name: String,
    pub role: String,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub project_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub message: String,
    pub is_read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: String,
    project_id: String,
    sender_id: String,
    sender_role: String,
    message: String,
    is_read: bool,
    created_at: OffsetDateTime,
    sender_name: Option<String>,
    sender_account_role: Option<String>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> anyhow::Result<Self> {
        let sender_id = Uuid::parse_str(&row.sender_id)?;
        let sender = match (row.sender_name, row.sender_account_role) {
            (Some(full_name), Some(role)) => Some(Sender { id: sender_id, full_name, role }),
            _ => None,
        };

        Ok(ChatMessage {
            id: Uuid::parse_str(&row.id)?,
            project_id: Uuid::parse_str(&row.project_id)?,
            sender_id,
            sender_role: row.sender_role.parse().map_err(anyhow::Error::msg)?,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
            sender,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_idempotent() {
        let db_pool = connect("sqlite::memory:", 1).await.unwrap();
        sqlx::raw_sql(SCHEMA).execute(&db_pool).await.unwrap();

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('users','projects','chat_messages')",
        )
        .fetch_one(&db_pool)
        .await
        .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn admin_is_not_a_chat_role() {
        assert_eq!("advisor".parse::<Role>(), Ok(Role::Advisor));
        assert!("admin".parse::<Role>().is_err());
    }
}
