use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with a JSON formatter for
/// production. Per-connection correlation now happens via the
/// `tracing::info_span!` each dispatch loop opens with its
/// `ConnectionId` (dispatcher.rs), rather than a header to propagate --
/// there is no RPC metadata here, just one long-lived WebSocket.
pub fn init(rust_log: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(rust_log));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
