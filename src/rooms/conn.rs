//! One participant's end of a room: identity, outbound queue and close signal.

use std::{fmt, time::Duration};

use axum::extract::ws::{Message, Utf8Bytes};
use futures_util::{Sink, SinkExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::Identity;

use super::{hub::Hub, RoomId};

/// How long a closing connection may spend flushing its transport.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(Uuid);

impl ConnId {
    fn new() -> Self {
        ConnId(Uuid::now_v7())
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a frame could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    Full,
    Closed,
}

/// A registered (or about to be registered) connection.
///
/// Owned by the hub once registered. Frames pushed with [`Connection::offer`]
/// are written to the transport by the matching [`Outbox`] task.
#[derive(Debug)]
pub struct Connection {
    id: ConnId,
    identity: Identity,
    room: RoomId,
    outbox: mpsc::Sender<Utf8Bytes>,
    closed: CancellationToken,
}

impl Connection {
    /// Creates a connection with room for `capacity` pending frames.
    pub fn open(identity: Identity, room: RoomId, capacity: usize) -> (Connection, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = ConnId::new();
        let closed = CancellationToken::new();

        let conn = Connection {
            id,
            identity,
            room,
            outbox: tx,
            closed: closed.clone(),
        };
        (conn, Outbox { id, rx, closed })
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Fires once the connection has been closed by anyone.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Queues a frame without waiting.
    pub fn offer(&self, frame: Utf8Bytes) -> Result<(), Rejected> {
        if self.is_closed() {
            return Err(Rejected::Closed);
        }
        self.outbox.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => Rejected::Full,
            TrySendError::Closed(_) => Rejected::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    #[cfg(test)]
    pub(crate) fn force_id(&mut self, id: ConnId) {
        self.id = id;
    }
}

/// Receiving half of a connection's queue; drives writes to the transport.
#[derive(Debug)]
pub struct Outbox {
    id: ConnId,
    rx: mpsc::Receiver<Utf8Bytes>,
    closed: CancellationToken,
}

impl Outbox {
    /// Writes queued frames to `sink` until the connection closes.
    ///
    /// A failed write asks the hub to unregister the connection. Either way the
    /// transport is closed on return.
    pub async fn deliver<S>(mut self, mut sink: S, hub: Hub)
    where
        S: Sink<Message> + Unpin,
        S::Error: fmt::Display + Send,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                frame = self.rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            let written = tokio::select! {
                biased;
                _ = self.closed.cancelled() => break,
                written = sink.send(Message::Text(frame)) => written,
            };
            if let Err(err) = written {
                tracing::warn!(conn = %self.id, %err, "write failed, dropping connection");
                // closed first so a Register still in the hub queue is refused
                self.closed.cancel();
                hub.unregister(self.id).await;
                break;
            }
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
            tracing::debug!(conn = %self.id, "transport did not close in time");
        }
        tracing::trace!(conn = %self.id, "outbox finished");
    }
}
