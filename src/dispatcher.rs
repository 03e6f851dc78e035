//! Owns one accepted WebSocket end to end: registers its outbound
//! plumbing, runs the read loop that decodes and routes client frames,
//! and runs the writer task that pumps the outbound queue onto the
//! wire. Modeled on the split-sender/receiver-loop shape of a plain
//! WebSocket relay (other_examples' `signaling_server.rs`), adapted to
//! warp's `WebSocket` sink/stream and to the kill-on-saturation
//! plumbing of `connection.rs`.

use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use warp::ws::{Message, WebSocket};

use crate::app::AppState;
use crate::handlers;
use crate::metrics;
use crate::protocol::{self, ClientMessage, DecodeError, ServerMessage};
use std::sync::Arc;

/// Drives one connection from accept to close. Never returns an error:
/// every failure mode (protocol violation, socket error, saturation)
/// is handled in place by sending a reply, closing the socket, or
/// both.
pub async fn run(socket: WebSocket, app: Arc<AppState>) {
    let (conn_id, mut outbound_rx, kill) = app.connections.register(app.outbound_capacity);
    metrics::record_connection_accepted();

    let span = tracing::info_span!("connection", id = %conn_id);
    let _enter = span.enter();
    info!("connection accepted");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            biased;

            _ = kill.notified() => {
                debug!("kill signal observed, closing connection");
                break;
            }
            next = ws_rx.next() => {
                match next {
                    Some(Ok(message)) => {
                        if message.is_close() {
                            debug!("peer sent close frame");
                            break;
                        }
                        if message.is_ping() || message.is_pong() {
                            // warp answers pings automatically; nothing to do.
                            continue;
                        }
                        if let Ok(text) = message.to_str() {
                            if handle_frame(&app, conn_id, text).await.is_break() {
                                debug!("explicit leaveRoom, closing connection");
                                break;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "websocket read error");
                        break;
                    }
                    None => {
                        debug!("peer closed the stream");
                        break;
                    }
                }
            }
        }
    }

    handlers::run_leave_cleanup(&app, conn_id).await;
    app.connections.unregister(conn_id);
    writer.abort();
    info!("connection closed");
}

/// Routes one decoded frame. Returns `ControlFlow::Break` when the
/// connection must close as a result of this frame -- currently only
/// an explicit `leaveRoom` (spec.md 4.4.6 step 8 applies to both the
/// explicit-envelope and implicit-close paths; the caller's `loop`
/// runs the shared leave-cleanup exactly once on every terminal path,
/// this one included).
async fn handle_frame(
    app: &AppState,
    conn_id: crate::id_types::ConnectionId,
    text: &str,
) -> std::ops::ControlFlow<()> {
    let parsed = match protocol::decode(text) {
        Ok(msg) => msg,
        Err(DecodeError::Malformed) => {
            metrics::record_protocol_error("decode");
            reply(app, conn_id, ServerMessage::error("Incorrect message format"));
            return std::ops::ControlFlow::Continue(());
        }
        Err(DecodeError::UnknownCommand) => {
            metrics::record_protocol_error("unrecognized_command");
            reply(app, conn_id, ServerMessage::error("Unrecognized command"));
            return std::ops::ControlFlow::Continue(());
        }
    };

    match parsed {
        ClientMessage::Initiation { name } => {
            let response = handlers::handle_initiation(app, conn_id, name).await;
            reply(app, conn_id, response);
        }
        ClientMessage::RoomInitiation { room_id, role } => {
            let response = handlers::handle_room_initiation(app, conn_id, room_id, role).await;
            reply(app, conn_id, response);
        }
        ClientMessage::Offer { name, offer } => {
            if let Err(err) = handlers::handle_offer(app, conn_id, name, offer).await {
                metrics::record_protocol_error("handler");
                reply(app, conn_id, ServerMessage::error(err.to_string()));
            }
        }
        ClientMessage::Answer { name, answer } => {
            if let Err(err) = handlers::handle_answer(app, conn_id, name, answer).await {
                metrics::record_protocol_error("handler");
                reply(app, conn_id, ServerMessage::error(err.to_string()));
            }
        }
        ClientMessage::Candidate { name, candidate } => {
            if let Err(err) = handlers::handle_candidate(app, conn_id, name, candidate).await {
                metrics::record_protocol_error("handler");
                reply(app, conn_id, ServerMessage::error(err.to_string()));
            }
        }
        ClientMessage::LeaveRoom => {
            return std::ops::ControlFlow::Break(());
        }
    }

    std::ops::ControlFlow::Continue(())
}

fn reply(app: &AppState, conn_id: crate::id_types::ConnectionId, msg: ServerMessage) {
    if let Some(handle) = app.connections.handle(conn_id) {
        handle.forward(Message::text(msg.to_json()));
    }
}
