//! The hub: one task that owns room membership and fans frames out.
//!
//! Every membership change and broadcast goes through a single FIFO command
//! queue, so a broadcast always sees a consistent member set. Delivery never
//! waits on a transport: frames are pushed into each member's bounded outbox
//! and a member that cannot keep up is dropped.

use axum::extract::ws::Utf8Bytes;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{
    conn::{ConnId, Connection, Rejected},
    registry::RoomRegistry,
    RoomId,
};

enum Command {
    Register(Connection),
    Unregister(ConnId),
    Broadcast { room: RoomId, frame: Utf8Bytes },
    Members { room: RoomId, reply: oneshot::Sender<Vec<ConnId>> },
    RoomCount { reply: oneshot::Sender<usize> },
    Shutdown,
}

/// Handle to the hub task. Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct Hub {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Register(conn) => write!(f, "Register({})", conn.id()),
            Command::Unregister(id) => write!(f, "Unregister({id})"),
            Command::Broadcast { room, .. } => write!(f, "Broadcast({room})"),
            Command::Members { room, .. } => write!(f, "Members({room})"),
            Command::RoomCount { .. } => f.write_str("RoomCount"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl Hub {
    /// Starts the hub task. It runs until [`Hub::shutdown`] or until every
    /// handle is dropped.
    pub fn spawn(queue_capacity: usize) -> (Hub, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let task = tokio::spawn(run(rx));
        (Hub { tx }, task)
    }

    pub async fn register(&self, conn: Connection) {
        if let Err(mpsc::error::SendError(Command::Register(conn))) = self.tx.send(Command::Register(conn)).await {
            tracing::debug!(conn = %conn.id(), "hub is gone, closing connection");
            conn.close();
        }
    }

    pub async fn unregister(&self, id: ConnId) {
        self.send(Command::Unregister(id)).await;
    }

    /// Queues `frame` for every member of `room`, sender included.
    pub async fn broadcast(&self, room: RoomId, frame: Utf8Bytes) {
        self.send(Command::Broadcast { room, frame }).await;
    }

    /// Connection ids currently in `room`, sorted.
    pub async fn members(&self, room: RoomId) -> Vec<ConnId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Members { room, reply }).await;
        rx.await.unwrap_or_default()
    }

    pub async fn room_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RoomCount { reply }).await;
        rx.await.unwrap_or_default()
    }

    /// Closes every connection and stops the hub task.
    pub async fn shutdown(&self) {
        self.send(Command::Shutdown).await;
    }

    async fn send(&self, cmd: Command) {
        if let Err(err) = self.tx.send(cmd).await {
            tracing::debug!(cmd = ?err.0, "hub is gone, dropping command");
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut registry = RoomRegistry::new();
    tracing::debug!("hub started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Register(conn) => {
                let (id, room) = (conn.id(), conn.room());
                if conn.is_closed() {
                    tracing::debug!(%room, %id, "connection closed before registering");
                    continue;
                }
                let user = conn.identity().user_id;
                match registry.register(conn) {
                    Ok(()) => tracing::info!(
                        %room, %id, %user,
                        members = registry.members(room).count(),
                        connections = registry.connection_count(),
                        "connection registered"
                    ),
                    Err(_) => tracing::debug!(%room, %id, "already registered"),
                }
            }
            Command::Unregister(id) => unregister(&mut registry, id),
            Command::Broadcast { room, frame } => broadcast(&mut registry, room, frame),
            Command::Members { room, reply } => {
                let _ = reply.send(registry.member_ids(room));
            }
            Command::RoomCount { reply } => {
                let _ = reply.send(registry.room_count());
            }
            Command::Shutdown => break,
        }
    }

    let mut closed = 0;
    for conn in registry.drain() {
        conn.close();
        closed += 1;
    }
    tracing::info!(closed, "hub stopped");
}

fn unregister(registry: &mut RoomRegistry, id: ConnId) {
    match registry.unregister(id) {
        Some(conn) => {
            conn.close();
            let room = conn.room();
            tracing::info!(
                %room, %id,
                members = registry.members(room).count(),
                "connection unregistered"
            );
        }
        None => tracing::trace!(%id, "unregister of unknown connection"),
    }
}

fn broadcast(registry: &mut RoomRegistry, room: RoomId, frame: Utf8Bytes) {
    let mut evicted = Vec::new();
    let mut delivered = 0usize;

    for conn in registry.members(room) {
        match conn.offer(frame.clone()) {
            Ok(()) => delivered += 1,
            Err(Rejected::Full) => {
                tracing::warn!(%room, id = %conn.id(), "outbox full, evicting slow connection");
                evicted.push(conn.id());
            }
            Err(Rejected::Closed) => evicted.push(conn.id()),
        }
    }

    for id in evicted {
        unregister(registry, id);
    }
    tracing::trace!(%room, delivered, "broadcast");
}
