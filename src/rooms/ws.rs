use std::fmt;

use axum::{
    debug_handler,
    extract::{ws::Message, Path, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::{Sink, Stream, StreamExt};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{auth::{self, Identity}, AppResult};

use super::{
    conn::Connection,
    msg::{self, Inbound, ServerEvent},
    Chat, RoomId,
};

/// GET /api/chats/{project_id}/ws
#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    Path(project_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(chat): State<Chat>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let identity = auth::admit_session(&session, &db_pool, project_id).await?;
    tracing::debug!(room = %project_id, user = %identity.user_id, "chat connection admitted");

    Ok(ws.on_upgrade(async move |socket| {
        let (sink, stream) = socket.split();
        run_session(chat, identity, project_id, stream, sink).await;
    }))
}

/// Drives one participant's connection from registration to close.
///
/// Frames read from `stream` are handled in order; everything bound for the
/// participant is written to `sink` by a separate delivery task, so a busy
/// read loop never delays the room and vice versa.
pub async fn run_session<St, Si, E>(chat: Chat, identity: Identity, room: RoomId, mut stream: St, sink: Si)
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: fmt::Display + Send,
{
    let (conn, outbox) = Connection::open(identity.clone(), room, chat.outbox_capacity);
    let id = conn.id();
    let closed = conn.close_signal();

    let connected = ServerEvent::Connected {
        project_id: room,
        user_id: identity.user_id,
        user_name: &identity.name,
        timestamp: OffsetDateTime::now_utc(),
    };
    // queued before registering so it is always the first frame out
    match connected.encode() {
        Ok(frame) => {
            let _ = conn.offer(frame);
        }
        Err(err) => tracing::error!(%err, "encoding connected event"),
    }

    let writer = tokio::spawn(outbox.deliver(sink, chat.hub.clone()));
    chat.hub.register(conn).await;

    let session = SessionCtx { chat: &chat, identity: &identity, room };
    loop {
        let next = tokio::select! {
            biased;
            _ = closed.cancelled() => {
                tracing::debug!(%room, conn = %id, "closed by hub");
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => session.handle(text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => {
                tracing::debug!(%room, conn = %id, "peer closed");
                break;
            }
            Some(Ok(Message::Binary(_))) => tracing::debug!(%room, conn = %id, "ignoring binary frame"),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Err(err)) => {
                tracing::warn!(%room, conn = %id, %err, "read failed");
                break;
            }
        }
    }

    if !closed.is_cancelled() {
        chat.hub.unregister(id).await;
    }
    let _ = writer.await;
    tracing::info!(%room, conn = %id, user = %identity.user_id, "chat session ended");
}

struct SessionCtx<'a> {
    chat: &'a Chat,
    identity: &'a Identity,
    room: RoomId,
}

impl SessionCtx<'_> {
    /// At most one store call and one broadcast per inbound frame.
    async fn handle(&self, text: &str) {
        let room = self.room;
        let user = self.identity.user_id;

        let inbound = match Inbound::decode(text) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::warn!(%room, %user, %err, "malformed chat frame");
                return;
            }
        };

        match inbound {
            Inbound::Message { body } => {
                if body.trim().is_empty() {
                    tracing::debug!(%room, %user, "ignoring empty message");
                    return;
                }

                let saved = match self.chat.store.save_message(room, user, self.identity.role, &body).await {
                    Ok(saved) => saved,
                    Err(err) => {
                        tracing::error!(%room, %user, error = ?err, "saving message failed, dropping it");
                        return;
                    }
                };
                tracing::debug!(%room, %user, id = %saved.id, "message saved");

                let event = ServerEvent::Message {
                    project_id: room,
                    message: &saved,
                    user_id: user,
                    user_name: &self.identity.name,
                    timestamp: OffsetDateTime::now_utc(),
                };
                match event.encode() {
                    Ok(frame) => self.chat.hub.broadcast(room, frame).await,
                    Err(err) => tracing::error!(%room, %err, "encoding message event"),
                }
            }
            Inbound::Typing(raw) => self.chat.hub.broadcast(room, msg::relay(&raw)).await,
            Inbound::Ping => tracing::trace!(%room, %user, "ping"),
            Inbound::Read => match self.chat.store.mark_read(room, user).await {
                Ok(count) => tracing::debug!(%room, %user, count, "messages marked read"),
                Err(err) => tracing::error!(%room, %user, error = ?err, "marking messages read failed"),
            },
            Inbound::Unknown(kind) => tracing::warn!(%room, %user, %kind, "unknown chat event"),
        }
    }
}
