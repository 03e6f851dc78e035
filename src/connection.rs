//! Per-socket outbound plumbing. Kept separate from the User/Room
//! registries (`registry.rs`) because this bookkeeping carries no
//! cross-entry invariants — unlike name/room uniqueness, dropping or
//! adding a connection handle never needs to be atomic with another
//! connection's — so a `DashMap` (the teacher crate's concurrent peer
//! map, repurposed) is the right granularity here, whereas the
//! registries need one coarse lock (see registry.rs).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, Notify};
use warp::ws::Message;

use crate::id_types::ConnectionId;

/// Bound of the per-connection outbound queue (spec.md §5: "a
/// bounded per-socket outbound channel"). Overridable via
/// `OUTBOUND_QUEUE_CAPACITY` at startup (config.rs).
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;

/// Handle used by other connections' dispatch loops to forward a
/// frame to this connection, and to request that it be torn down.
#[derive(Clone)]
pub struct SocketHandle {
    pub id: ConnectionId,
    tx: mpsc::Sender<Message>,
    kill: Arc<Notify>,
}

impl SocketHandle {
    /// Attempts to forward one frame without blocking. On a full or
    /// closed queue, kills this connection instead of stalling the
    /// caller — that peer's own read loop will observe the resulting
    /// close and run leave-cleanup from its own task (spec.md §5).
    pub fn forward(&self, message: Message) {
        if self.tx.try_send(message).is_err() {
            self.kill();
        }
    }

    /// Requests that this connection's dispatch loop terminate as if
    /// its socket had failed.
    pub fn kill(&self) {
        self.kill.notify_one();
    }
}

/// Registry of live connections' outbound handles, keyed by
/// `ConnectionId`. One entry per accepted socket, from accept to
/// teardown.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    handles: DashMap<ConnectionId, SocketHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handles: DashMap::new(),
        }
    }

    /// Allocates a fresh connection id and registers its outbound
    /// channel + kill signal, returning the consumer-facing pieces
    /// the dispatch loop owns directly (the receiver and the kill
    /// signal) plus the id to tag its tracing span with.
    pub fn register(
        &self,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<Message>, Arc<Notify>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(capacity);
        let kill = Arc::new(Notify::new());
        self.handles.insert(
            id,
            SocketHandle {
                id,
                tx,
                kill: kill.clone(),
            },
        );
        (id, rx, kill)
    }

    pub fn handle(&self, id: ConnectionId) -> Option<SocketHandle> {
        self.handles.get(&id).map(|h| h.clone())
    }

    pub fn unregister(&self, id: ConnectionId) {
        self.handles.remove(&id);
    }

    pub fn active_count(&self) -> usize {
        self.handles.len()
    }
}
