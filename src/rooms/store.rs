//! Durable side of the chat: messages and their read flags.

use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{ChatMessage, MessageRow, Role};

use super::RoomId;

/// Persistence used by chat sessions and the history endpoints.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Appends a message (unread) and returns it with sender info resolved.
    async fn save_message(&self, room: RoomId, sender_id: Uuid, sender_role: Role, body: &str) -> anyhow::Result<ChatMessage>;

    /// Marks every unread message in `room` not sent by `reader` as read.
    async fn mark_read(&self, room: RoomId, reader: Uuid) -> anyhow::Result<u64>;

    /// Whole conversation, oldest first.
    async fn fetch_history(&self, room: RoomId) -> anyhow::Result<Vec<ChatMessage>>;

    /// Unread messages from others across every project `user` takes part in.
    async fn unread_count(&self, user: Uuid) -> anyhow::Result<i64>;
}

const SELECT_MESSAGE: &str = r#"
SELECT m.id, m.project_id, m.sender_id, m.sender_role, m.message, m.is_read, m.created_at,
       u.full_name AS sender_name, u.role AS sender_account_role
FROM chat_messages m
LEFT JOIN users u ON u.id = m.sender_id
"#;

#[derive(Debug, Clone)]
pub struct SqliteChatStore {
    db_pool: SqlitePool,
}

impl SqliteChatStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    async fn message_by_id(&self, id: Uuid) -> anyhow::Result<ChatMessage> {
        let row: MessageRow = sqlx::query_as(&format!("{SELECT_MESSAGE} WHERE m.id = ?"))
            .bind(id.to_string())
            .fetch_one(&self.db_pool)
            .await
            .context("fetching chat message")?;
        row.try_into()
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn save_message(&self, room: RoomId, sender_id: Uuid, sender_role: Role, body: &str) -> anyhow::Result<ChatMessage> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO chat_messages (id,project_id,sender_id,sender_role,message,is_read,created_at) VALUES (?,?,?,?,?,0,?)",
        )
        .bind(id.to_string())
        .bind(room.to_string())
        .bind(sender_id.to_string())
        .bind(sender_role.as_str())
        .bind(body)
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db_pool)
        .await
        .context("inserting chat message")?;

        self.message_by_id(id).await
    }

    async fn mark_read(&self, room: RoomId, reader: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("UPDATE chat_messages SET is_read=1 WHERE project_id=? AND sender_id<>? AND is_read=0")
            .bind(room.to_string())
            .bind(reader.to_string())
            .execute(&self.db_pool)
            .await
            .context("marking messages read")?;
        Ok(result.rows_affected())
    }

    async fn fetch_history(&self, room: RoomId) -> anyhow::Result<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "{SELECT_MESSAGE} WHERE m.project_id = ? ORDER BY m.created_at ASC, m.rowid ASC"
        ))
        .bind(room.to_string())
        .fetch_all(&self.db_pool)
        .await
        .context("fetching chat history")?;

        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn unread_count(&self, user: Uuid) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM chat_messages m
            JOIN projects p ON p.id = m.project_id
            WHERE (p.student_id = ?1 OR p.advisor_id = ?1)
              AND m.sender_id <> ?1
              AND m.is_read = 0
            "#,
        )
        .bind(user.to_string())
        .fetch_one(&self.db_pool)
        .await
        .context("counting unread messages")?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::users::{self, AccountRole},
        db, projects,
    };

    struct Fixture {
        store: SqliteChatStore,
        room: RoomId,
        student: Uuid,
        advisor: Uuid,
    }

    async fn setup() -> Fixture {
        let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
        let student = users::create_user(&db_pool, "s@uni.test", "h", "Sam", AccountRole::Student).await.unwrap();
        let advisor = users::create_user(&db_pool, "a@uni.test", "h", "Ada", AccountRole::Advisor).await.unwrap();
        let room = projects::create_project(&db_pool, "Thesis", student.id, Some(advisor.id)).await.unwrap();

        Fixture { store: SqliteChatStore::new(db_pool), room, student: student.id, advisor: advisor.id }
    }

    #[tokio::test]
    async fn save_resolves_sender() {
        let f = setup().await;
        let saved = f.store.save_message(f.room, f.student, Role::Student, "hello").await.unwrap();

        assert_eq!(saved.message, "hello");
        assert_eq!(saved.sender_id, f.student);
        assert!(!saved.is_read);
        let sender = saved.sender.unwrap();
        assert_eq!(sender.full_name, "Sam");
        assert_eq!(sender.role, "student");
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_scoped_to_the_room() {
        let f = setup().await;
        for body in ["one", "two", "three"] {
            f.store.save_message(f.room, f.student, Role::Student, body).await.unwrap();
        }
        f.store.save_message(Uuid::now_v7(), f.student, Role::Student, "elsewhere").await.unwrap();

        let bodies: Vec<String> = f.store.fetch_history(f.room).await.unwrap().into_iter().map(|m| m.message).collect();
        assert_eq!(bodies, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn mark_read_skips_own_messages_and_is_idempotent() {
        let f = setup().await;
        f.store.save_message(f.room, f.student, Role::Student, "from student").await.unwrap();
        f.store.save_message(f.room, f.advisor, Role::Advisor, "from advisor").await.unwrap();
        assert_eq!(f.store.unread_count(f.advisor).await.unwrap(), 1);

        assert_eq!(f.store.mark_read(f.room, f.advisor).await.unwrap(), 1);
        assert_eq!(f.store.mark_read(f.room, f.advisor).await.unwrap(), 0);

        let history = f.store.fetch_history(f.room).await.unwrap();
        let read: Vec<(&str, bool)> = history.iter().map(|m| (m.message.as_str(), m.is_read)).collect();
        assert_eq!(read, [("from student", true), ("from advisor", false)]);
        assert_eq!(f.store.unread_count(f.advisor).await.unwrap(), 0);
        assert_eq!(f.store.unread_count(f.student).await.unwrap(), 1);
    }
}
