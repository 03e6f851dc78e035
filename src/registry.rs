//! The User Registry and Room Registry (spec.md 4.1, 4.2), combined
//! behind one coarse lock.
//!
//! spec.md 5 calls for "a single coarse lock" over both registries:
//! several operations need atomicity *across* them -- `leaveRoom`
//! reads a participant list, decides whether the room is destroyed,
//! and removes the user from both registries as one step; `initiation`
//! needs name-uniqueness check-and-insert to serialize two concurrent
//! attempts with the same name to exactly one winner. A pair of
//! independently-sharded `DashMap`s (as the teacher crate's
//! `RoomManager` uses) gives per-entry atomicity but not cross-entry
//! atomicity, so this is a deliberate departure from the teacher's
//! concurrent-map style for the registries specifically -- see
//! DESIGN.md. Per-socket outbound plumbing, which has no such
//! cross-entry invariants, keeps the teacher's `DashMap` pattern in
//! `connection.rs`.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::Mutex;

use crate::id_types::{ConnectionId, RoomId, UserName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    NameTaken,
    RoomAlreadyExists,
    RoomNotFound,
    AlreadyInRoom,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            RegistryError::NameTaken => "User with the given name exists already",
            RegistryError::RoomAlreadyExists => "Room already exists",
            RegistryError::RoomNotFound => "Room not found",
            RegistryError::AlreadyInRoom => "User is already in the room",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for RegistryError {}

struct Room {
    owner: UserName,
    /// Ordered so join order is preserved in the `participants` list
    /// returned to joining peers (spec.md 3: "ordered set").
    participants: Vec<UserName>,
}

#[derive(Default)]
struct Registries {
    conn_by_name: HashMap<UserName, ConnectionId>,
    name_by_conn: HashMap<ConnectionId, UserName>,
    rooms: HashMap<RoomId, Room>,
    room_by_user: HashMap<UserName, RoomId>,
}

/// The outcome of a `leaveRoom` / implicit-leave procedure (spec.md
/// 4.4.6), computed atomically under the registry lock and handed back
/// for the caller to act on *after* releasing the lock (spec.md 5:
/// "Handlers must not hold the registry lock while performing socket
/// I/O").
pub struct LeavePlan {
    /// `None` if the connection had never completed `initiation`.
    pub leaver: Option<UserName>,
    /// Other participants of the leaver's room at the moment of
    /// departure, snapshotted before any destruction (spec.md 4.4.6
    /// tie-break: "do not re-read [the participant list] after
    /// destruction").
    pub other_participants: Vec<UserName>,
    pub room_destroyed: bool,
}

pub struct SignalingState {
    registries: Mutex<Registries>,
}

impl SignalingState {
    pub fn new() -> Self {
        Self {
            registries: Mutex::new(Registries::default()),
        }
    }

    /// spec.md 4.1 `add`. Single critical section: two concurrent
    /// `initiation`s with the same name serialize to one success, one
    /// `NameTaken`.
    pub async fn add_user(
        &self,
        conn_id: ConnectionId,
        name: UserName,
    ) -> Result<(), RegistryError> {
        let mut reg = self.registries.lock().await;
        if reg.conn_by_name.contains_key(&name) {
            return Err(RegistryError::NameTaken);
        }
        reg.conn_by_name.insert(name.clone(), conn_id);
        reg.name_by_conn.insert(conn_id, name);
        Ok(())
    }

    /// spec.md 4.1 `byName`.
    pub async fn user_by_name(&self, name: &UserName) -> Option<ConnectionId> {
        self.registries.lock().await.conn_by_name.get(name).copied()
    }

    /// spec.md 4.1 `bySocket`.
    pub async fn user_by_conn(&self, conn_id: ConnectionId) -> Option<UserName> {
        self.registries.lock().await.name_by_conn.get(&conn_id).cloned()
    }

    /// spec.md 4.2 `create`. Owner becomes the sole participant.
    pub async fn create_room(
        &self,
        owner: UserName,
        room_id: RoomId,
    ) -> Result<(), RegistryError> {
        let mut reg = self.registries.lock().await;
        if reg.rooms.contains_key(&room_id) {
            return Err(RegistryError::RoomAlreadyExists);
        }
        reg.rooms.insert(
            room_id.clone(),
            Room {
                owner: owner.clone(),
                participants: vec![owner.clone()],
            },
        );
        reg.room_by_user.insert(owner, room_id);
        Ok(())
    }

    /// spec.md 4.2 `join`. Returns the names of all *other* current
    /// participants (the ones present before this join), per spec.md
    /// 4.4.2.
    pub async fn join_room(
        &self,
        room_id: &RoomId,
        user: UserName,
    ) -> Result<Vec<UserName>, RegistryError> {
        let mut reg = self.registries.lock().await;

        let others = {
            let room = reg
                .rooms
                .get(room_id)
                .ok_or(RegistryError::RoomNotFound)?;
            if room.participants.contains(&user) {
                return Err(RegistryError::AlreadyInRoom);
            }
            room.participants.clone()
        };

        reg.rooms
            .get_mut(room_id)
            .expect("checked present above")
            .participants
            .push(user.clone());
        reg.room_by_user.insert(user, room_id.clone());
        Ok(others)
    }

    /// spec.md 4.2 `roomOf`.
    pub async fn room_of(&self, user: &UserName) -> Option<RoomId> {
        self.registries.lock().await.room_by_user.get(user).cloned()
    }

    /// Existence check backing the advisory `/initiate` pre-check
    /// (spec.md 4.5). Not authoritative -- `roomInitiation` re-checks
    /// under the same lock at join time.
    pub async fn room_exists(&self, room_id: &RoomId) -> bool {
        self.registries.lock().await.rooms.contains_key(room_id)
    }

    /// Implements the full atomic leave procedure of spec.md 4.4.6,
    /// steps 1-6 (fan-out and the leaver's own confirmation/close are
    /// the caller's responsibility once it has this plan in hand).
    pub async fn leave(&self, conn_id: ConnectionId) -> LeavePlan {
        let mut reg = self.registries.lock().await;

        let Some(leaver) = reg.name_by_conn.remove(&conn_id) else {
            return LeavePlan {
                leaver: None,
                other_participants: Vec::new(),
                room_destroyed: false,
            };
        };
        reg.conn_by_name.remove(&leaver);

        let Some(room_id) = reg.room_by_user.remove(&leaver) else {
            return LeavePlan {
                leaver: Some(leaver),
                other_participants: Vec::new(),
                room_destroyed: false,
            };
        };

        let room = reg
            .rooms
            .get(&room_id)
            .expect("room_by_user only points at live rooms");
        let owner_leaves = room.owner == leaver;
        let other_participants: Vec<UserName> = room
            .participants
            .iter()
            .filter(|p| **p != leaver)
            .cloned()
            .collect();

        if owner_leaves {
            let destroyed = reg.rooms.remove(&room_id).expect("checked present above");
            for participant in &destroyed.participants {
                reg.room_by_user.remove(participant);
            }
        } else {
            reg.rooms
                .get_mut(&room_id)
                .expect("checked present above")
                .participants
                .retain(|p| *p != leaver);
        }

        LeavePlan {
            leaver: Some(leaver),
            other_participants,
            room_destroyed: owner_leaves,
        }
    }

    pub async fn session_count(&self) -> usize {
        self.registries.lock().await.conn_by_name.len()
    }

    pub async fn room_count(&self) -> usize {
        self.registries.lock().await.rooms.len()
    }
}

impl Default for SignalingState {
    fn default() -> Self {
        Self::new()
    }
}
