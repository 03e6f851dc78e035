//! The protocol semantics of spec.md 4.4: each function here
//! transforms registry state and/or forwards an envelope to one or
//! more peer sockets. Handlers resolve destinations under the
//! registry lock, then release it before touching any socket
//! (spec.md 5) -- `registry.rs`'s async methods already take and
//! release the lock per call, so a handler simply never holds onto a
//! guard across an `.await` on a socket write.

use std::fmt;

use warp::ws::Message;

use crate::app::AppState;
use crate::id_types::{ConnectionId, RoomId, UserName};
use crate::metrics;
use crate::protocol::{parse_role, Answer, Candidate, Offer, Role, ServerMessage};
use crate::registry::RegistryError;

#[derive(Debug)]
pub enum HandlerError {
    /// `offer`/`answer`/`candidate` sent before `initiation` completed.
    NotRegistered,
    /// The named receiver has no live session.
    UnknownRecipient,
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HandlerError::NotRegistered => "Sender is not registered",
            HandlerError::UnknownRecipient => "Unknown recipient",
        };
        write!(f, "{msg}")
    }
}

/// Best-effort delivery to one connection's outbound queue. A missing
/// handle means that peer is already gone; spec.md 4.4.6 step 4 and
/// 7 call for exactly this: log and move on, the sender is never
/// blocked or failed by another peer's state.
fn forward(app: &AppState, to: ConnectionId, msg: ServerMessage, metric_label: &str) {
    match app.connections.handle(to) {
        Some(handle) => {
            handle.forward(Message::text(msg.to_json()));
            metrics::record_forwarded(metric_label);
        }
        None => {
            tracing::debug!(target = %to, "peer has no live outbound handle, dropping forward");
        }
    }
}

async fn sync_session_gauges(app: &AppState) {
    metrics::set_active_sessions(app.signaling.session_count().await as i64);
    metrics::set_active_rooms(app.signaling.room_count().await as i64);
}

/// spec.md 4.4.1.
pub async fn handle_initiation(app: &AppState, conn_id: ConnectionId, name: String) -> ServerMessage {
    if name.trim().is_empty() {
        return ServerMessage::Initiation {
            success: false,
            message: Some("Name must not be empty".to_string()),
        };
    }

    match app.signaling.add_user(conn_id, UserName::from(name)).await {
        Ok(()) => {
            sync_session_gauges(app).await;
            ServerMessage::Initiation {
                success: true,
                message: None,
            }
        }
        Err(err @ RegistryError::NameTaken) => ServerMessage::Initiation {
            success: false,
            message: Some(err.to_string()),
        },
        Err(_) => unreachable!("add_user only returns NameTaken"),
    }
}

/// spec.md 4.4.2.
pub async fn handle_room_initiation(
    app: &AppState,
    conn_id: ConnectionId,
    room_id: String,
    role: String,
) -> ServerMessage {
    let failure = |message: &str| ServerMessage::RoomInitiation {
        success: false,
        room_id: None,
        participants: None,
        message: Some(message.to_string()),
    };

    let Some(user) = app.signaling.user_by_conn(conn_id).await else {
        return failure("User must complete initiation before joining a room");
    };

    let Some(role) = parse_role(&role) else {
        return failure("Invalid role");
    };

    let typed_room_id = RoomId::from(room_id.clone());

    match role {
        Role::Creator => match app.signaling.create_room(user, typed_room_id).await {
            Ok(()) => {
                sync_session_gauges(app).await;
                ServerMessage::RoomInitiation {
                    success: true,
                    room_id: Some(room_id),
                    participants: Some(Vec::new()),
                    message: None,
                }
            }
            Err(err) => failure(&err.to_string()),
        },
        Role::Participant => match app.signaling.join_room(&typed_room_id, user).await {
            Ok(others) => ServerMessage::RoomInitiation {
                success: true,
                room_id: Some(room_id),
                participants: Some(others.into_iter().map(|n| n.to_string()).collect()),
                message: None,
            },
            Err(err) => failure(&err.to_string()),
        },
    }
}

async fn resolve_sender_and_receiver(
    app: &AppState,
    conn_id: ConnectionId,
    receiver_name: &str,
) -> Result<(UserName, ConnectionId), HandlerError> {
    let sender = app
        .signaling
        .user_by_conn(conn_id)
        .await
        .ok_or(HandlerError::NotRegistered)?;
    let receiver = app
        .signaling
        .user_by_name(&UserName::from(receiver_name))
        .await
        .ok_or(HandlerError::UnknownRecipient)?;
    Ok((sender, receiver))
}

/// spec.md 4.4.3.
pub async fn handle_offer(
    app: &AppState,
    conn_id: ConnectionId,
    name: String,
    offer: Offer,
) -> Result<(), HandlerError> {
    let (sender, receiver) = resolve_sender_and_receiver(app, conn_id, &name).await?;
    forward(
        app,
        receiver,
        ServerMessage::Offer {
            name: sender.to_string(),
            offer,
        },
        "offer",
    );
    Ok(())
}

/// spec.md 4.4.4.
pub async fn handle_answer(
    app: &AppState,
    conn_id: ConnectionId,
    name: String,
    answer: Answer,
) -> Result<(), HandlerError> {
    let (sender, receiver) = resolve_sender_and_receiver(app, conn_id, &name).await?;
    forward(
        app,
        receiver,
        ServerMessage::Answer {
            name: sender.to_string(),
            answer,
        },
        "answer",
    );
    Ok(())
}

/// spec.md 4.4.5. Point-to-point by `name` (spec.md 9 resolves the
/// fan-out-vs-point-to-point ambiguity from the original source in
/// favor of point-to-point, consistent with offer/answer).
pub async fn handle_candidate(
    app: &AppState,
    conn_id: ConnectionId,
    name: String,
    candidate: Candidate,
) -> Result<(), HandlerError> {
    let (sender, receiver) = resolve_sender_and_receiver(app, conn_id, &name).await?;
    forward(
        app,
        receiver,
        ServerMessage::Candidate {
            name: sender.to_string(),
            candidate,
        },
        "candidate",
    );
    Ok(())
}

/// spec.md 4.4.6, steps 1-7. Step 8 (closing the socket) is the
/// dispatcher's responsibility once this returns, since it owns the
/// socket's lifetime.
pub async fn run_leave_cleanup(app: &AppState, conn_id: ConnectionId) {
    let plan = app.signaling.leave(conn_id).await;

    let Some(leaver) = plan.leaver else {
        return;
    };

    let notification = ServerMessage::PeerLeavingRoom {
        name: leaver.to_string(),
        room_destroy: plan.room_destroyed,
    };

    for participant in &plan.other_participants {
        match app.signaling.user_by_name(participant).await {
            Some(target) => forward(app, target, notification.clone(), "peerLeavingRoom"),
            None => tracing::debug!(peer = %participant, "leave notification target has no live session"),
        }
    }

    sync_session_gauges(app).await;

    if let Some(handle) = app.connections.handle(conn_id) {
        handle.forward(Message::text(
            ServerMessage::LeaveConfirmed {
                success: true,
                message: "User successfully left the room".to_string(),
            }
            .to_json(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_types::ConnectionId;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId(n)
    }

    #[tokio::test]
    async fn initiation_rejects_duplicate_name() {
        let app = AppState::default();
        let first = handle_initiation(&app, conn(1), "alice".to_string()).await;
        assert!(matches!(first, ServerMessage::Initiation { success: true, .. }));

        let second = handle_initiation(&app, conn(2), "alice".to_string()).await;
        match second {
            ServerMessage::Initiation { success, message } => {
                assert!(!success);
                assert_eq!(message.unwrap(), "User with the given name exists already");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn initiation_rejects_empty_name() {
        let app = AppState::default();
        let reply = handle_initiation(&app, conn(1), "".to_string()).await;
        assert!(matches!(reply, ServerMessage::Initiation { success: false, .. }));
    }

    #[tokio::test]
    async fn room_initiation_requires_prior_initiation() {
        let app = AppState::default();
        let reply =
            handle_room_initiation(&app, conn(1), "r1".to_string(), "creator".to_string()).await;
        match reply {
            ServerMessage::RoomInitiation { success, message, .. } => {
                assert!(!success);
                assert!(message.unwrap().contains("initiation"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn room_initiation_invalid_role() {
        let app = AppState::default();
        handle_initiation(&app, conn(1), "alice".to_string()).await;
        let reply =
            handle_room_initiation(&app, conn(1), "r1".to_string(), "admin".to_string()).await;
        match reply {
            ServerMessage::RoomInitiation { success, message, .. } => {
                assert!(!success);
                assert_eq!(message.unwrap(), "Invalid role");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn create_then_join_reports_growing_participant_list() {
        let app = AppState::default();
        handle_initiation(&app, conn(1), "alice".to_string()).await;
        handle_initiation(&app, conn(2), "bob".to_string()).await;

        let created =
            handle_room_initiation(&app, conn(1), "r1".to_string(), "creator".to_string()).await;
        assert!(matches!(
            created,
            ServerMessage::RoomInitiation { success: true, participants: Some(p), .. } if p.is_empty()
        ));

        let joined = handle_room_initiation(&app, conn(2), "r1".to_string(), "participant".to_string())
            .await;
        match joined {
            ServerMessage::RoomInitiation { success, participants, .. } => {
                assert!(success);
                assert_eq!(participants.unwrap(), vec!["alice".to_string()]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn room_initiation_missing_room_not_found() {
        let app = AppState::default();
        handle_initiation(&app, conn(1), "alice".to_string()).await;
        let reply =
            handle_room_initiation(&app, conn(1), "nope".to_string(), "participant".to_string())
                .await;
        match reply {
            ServerMessage::RoomInitiation { success, message, .. } => {
                assert!(!success);
                assert_eq!(message.unwrap(), "Room not found");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[tokio::test]
    async fn offer_forwards_to_receivers_outbound_queue() {
        let app = AppState::default();
        let (sender_conn, _sender_rx, _sender_kill) = app.connections.register(app.outbound_capacity);
        let (receiver_conn, mut receiver_rx, _receiver_kill) =
            app.connections.register(app.outbound_capacity);

        handle_initiation(&app, sender_conn, "alice".to_string()).await;
        handle_initiation(&app, receiver_conn, "bob".to_string()).await;

        let offer = Offer {
            kind: "offer".to_string(),
            sdp: "SDP_B".to_string(),
        };
        handle_offer(&app, sender_conn, "bob".to_string(), offer)
            .await
            .unwrap();

        let received = receiver_rx.recv().await.unwrap();
        let text = received.to_str().unwrap();
        assert!(text.contains("SDP_B"));
        assert!(text.contains("\"name\":\"alice\""));
    }

    #[tokio::test]
    async fn offer_from_unregistered_sender_errors() {
        let app = AppState::default();
        handle_initiation(&app, conn(2), "bob".to_string()).await;
        let offer = Offer {
            kind: "offer".to_string(),
            sdp: "x".to_string(),
        };
        let err = handle_offer(&app, conn(1), "bob".to_string(), offer)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotRegistered));
    }

    #[tokio::test]
    async fn offer_to_unknown_receiver_errors() {
        let app = AppState::default();
        handle_initiation(&app, conn(1), "alice".to_string()).await;
        let offer = Offer {
            kind: "offer".to_string(),
            sdp: "x".to_string(),
        };
        let err = handle_offer(&app, conn(1), "ghost".to_string(), offer)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::UnknownRecipient));
    }

    #[tokio::test]
    async fn owner_leaving_notifies_remaining_participants() {
        let app = AppState::default();
        let (owner_conn, _owner_rx, _owner_kill) = app.connections.register(app.outbound_capacity);
        let (bob_conn, mut bob_rx, _bob_kill) = app.connections.register(app.outbound_capacity);

        handle_initiation(&app, owner_conn, "alice".to_string()).await;
        handle_initiation(&app, bob_conn, "bob".to_string()).await;
        handle_room_initiation(&app, owner_conn, "r1".to_string(), "creator".to_string()).await;
        handle_room_initiation(&app, bob_conn, "r1".to_string(), "participant".to_string()).await;

        run_leave_cleanup(&app, owner_conn).await;

        let received = bob_rx.recv().await.unwrap();
        let text = received.to_str().unwrap();
        assert!(text.contains("peerLeavingRoom"));
        assert!(text.contains("\"room_destroy\":true"));

        assert_eq!(app.signaling.room_count().await, 0);
    }

    #[tokio::test]
    async fn non_owner_leave_sends_confirmation_to_leaver() {
        let app = AppState::default();
        let (conn_id, mut rx, _kill) = app.connections.register(app.outbound_capacity);
        handle_initiation(&app, conn_id, "bob".to_string()).await;
        handle_initiation(&app, ConnectionId(999), "alice".to_string()).await;
        app.signaling
            .create_room(UserName::from("alice"), RoomId::from("r1"))
            .await
            .unwrap();
        app.signaling
            .join_room(&RoomId::from("r1"), UserName::from("bob"))
            .await
            .unwrap();

        run_leave_cleanup(&app, conn_id).await;

        let received = rx.recv().await.unwrap();
        assert!(received.to_str().unwrap().contains("leaveConfirmed"));
    }
}
