use std::{fmt, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Role;

/// Account row without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: AccountRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Student,
    Advisor,
    Admin,
}

impl AccountRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::Student => "student",
            AccountRole::Advisor => "advisor",
            AccountRole::Admin => "admin",
        }
    }

    /// Role in project chats. Admins never take part.
    pub fn chat_role(self) -> Option<Role> {
        match self {
            AccountRole::Student => Some(Role::Student),
            AccountRole::Advisor => Some(Role::Advisor),
            AccountRole::Admin => None,
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(AccountRole::Student),
            "advisor" => Ok(AccountRole::Advisor),
            "admin" => Ok(AccountRole::Admin),
            other => Err(format!("invalid role {other}")),
        }
    }
}

/// Inserts a user with an already-hashed password.
pub async fn create_user(
    db_pool: &SqlitePool,
    email: &str,
    password_hash: &str,
    full_name: &str,
    role: AccountRole,
) -> anyhow::Result<User> {
    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO users (id,email,password_hash,full_name,role,created_at) VALUES (?,?,?,?,?,?)")
        .bind(id.to_string())
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(role.as_str())
        .bind(OffsetDateTime::now_utc())
        .execute(db_pool)
        .await
        .context("inserting user")?;

    tracing::info!(user = %id, %role, "user created");
    Ok(User {
        id,
        email: email.to_owned(),
        full_name: full_name.to_owned(),
        role,
    })
}

pub async fn email_taken(db_pool: &SqlitePool, email: &str) -> anyhow::Result<bool> {
    let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE email=?")
        .bind(email)
        .fetch_optional(db_pool)
        .await
        .context("checking email")?;
    Ok(found.is_some())
}

/// Returns the user and stored hash for `email`, if any.
pub async fn find_by_email(db_pool: &SqlitePool, email: &str) -> anyhow::Result<Option<(User, String)>> {
    let row: Option<(String, String, String, String, String)> =
        sqlx::query_as("SELECT id,email,full_name,role,password_hash FROM users WHERE email=?")
            .bind(email)
            .fetch_optional(db_pool)
            .await
            .context("fetching user by email")?;

    let Some((id, email, full_name, role, hash)) = row else {
        return Ok(None);
    };
    let user = User {
        id: Uuid::parse_str(&id)?,
        email,
        full_name,
        role: role.parse().map_err(anyhow::Error::msg)?,
    };
    Ok(Some((user, hash)))
}

pub async fn find_by_id(db_pool: &SqlitePool, user_id: Uuid) -> anyhow::Result<Option<User>> {
    let row: Option<(String, String, String)> =
        sqlx::query_as("SELECT email,full_name,role FROM users WHERE id=?")
            .bind(user_id.to_string())
            .fetch_optional(db_pool)
            .await
            .context("fetching user")?;

    let Some((email, full_name, role)) = row else {
        return Ok(None);
    };
    Ok(Some(User {
        id: user_id,
        email,
        full_name,
        role: role.parse().map_err(anyhow::Error::msg)?,
    }))
}
