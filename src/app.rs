//! Shared server state, wired together once at startup and handed to
//! every per-connection task as an `Arc<AppState>`.

use crate::connection::{ConnectionRegistry, DEFAULT_OUTBOUND_CAPACITY};
use crate::registry::SignalingState;

pub struct AppState {
    pub signaling: SignalingState,
    pub connections: ConnectionRegistry,
    pub outbound_capacity: usize,
}

impl AppState {
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            signaling: SignalingState::new(),
            connections: ConnectionRegistry::new(),
            outbound_capacity,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_OUTBOUND_CAPACITY)
    }
}
