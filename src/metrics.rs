use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

lazy_static! {
    pub static ref ACTIVE_SESSIONS: IntGauge =
        register_int_gauge!("signal_active_sessions", "Number of currently registered users").unwrap();
    pub static ref ACTIVE_ROOMS: IntGauge =
        register_int_gauge!("signal_active_rooms", "Number of currently active rooms").unwrap();
    pub static ref MESSAGES_FORWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "signal_messages_forwarded_total",
        "Total number of signaling envelopes forwarded to a peer",
        &["message_type"] // "offer" | "answer" | "candidate" | "peerLeavingRoom"
    )
    .unwrap();
    pub static ref PROTOCOL_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "signal_protocol_errors_total",
        "Total number of protocol-level errors sent back to a client",
        &["reason"] // "decode" | "unrecognized_command" | "handler"
    )
    .unwrap();
    pub static ref CONNECTIONS_ACCEPTED_TOTAL: IntCounter = register_int_counter!(
        "signal_connections_accepted_total",
        "Total number of WebSocket connections accepted"
    )
    .unwrap();
}

pub fn register_metrics() {
    // Force initialization of lazy_statics so /metrics reports a zero
    // value before the first event rather than omitting the series.
    let _ = ACTIVE_SESSIONS.get();
    let _ = ACTIVE_ROOMS.get();
    for kind in ["offer", "answer", "candidate", "peerLeavingRoom"] {
        let _ = MESSAGES_FORWARDED_TOTAL.with_label_values(&[kind]).get();
    }
    for reason in ["decode", "unrecognized_command", "handler"] {
        let _ = PROTOCOL_ERRORS_TOTAL.with_label_values(&[reason]).get();
    }
    let _ = CONNECTIONS_ACCEPTED_TOTAL.get();
}

pub fn set_active_sessions(n: i64) {
    ACTIVE_SESSIONS.set(n);
}

pub fn set_active_rooms(n: i64) {
    ACTIVE_ROOMS.set(n);
}

pub fn record_forwarded(message_type: &str) {
    MESSAGES_FORWARDED_TOTAL.with_label_values(&[message_type]).inc();
}

pub fn record_protocol_error(reason: &str) {
    PROTOCOL_ERRORS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_connection_accepted() {
    CONNECTIONS_ACCEPTED_TOTAL.inc();
}

/// Renders the current state of all registered metrics in the
/// Prometheus text exposition format, for the `/metrics` route.
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .expect("prometheus text encoding does not fail");
    String::from_utf8(buffer).expect("prometheus output is valid utf-8")
}
