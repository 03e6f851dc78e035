use std::sync::Arc;

use tokio::signal;
use tracing::info;
use warp::Filter;

use signal_bridge::app::AppState;
use signal_bridge::metrics::register_metrics;
use signal_bridge::{config, health, http, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Validate environment variables before starting the server
    let cfg = config::validate_env().unwrap_or_else(|e| {
        eprintln!("Environment validation failed: {}", e);
        std::process::exit(1);
    });

    // Initialize tracing with validated RUST_LOG
    logging::init(&cfg.rust_log);

    // Initialize metrics
    register_metrics();

    let app = Arc::new(AppState::new(cfg.outbound_queue_capacity));
    let routes = health::routes().or(http::routes(app));

    // config::validate_env already rejected any HOST that is neither
    // "localhost" nor a parseable IP address, so only the literal
    // default is special-cased here.
    let host: std::net::IpAddr = if cfg.host == "localhost" {
        [127, 0, 0, 1].into()
    } else {
        cfg.host
            .parse()
            .expect("validate_env guarantees HOST parses or is 'localhost'")
    };

    info!(host = %cfg.host, port = cfg.port, "signaling server listening");

    let shutdown_signal = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal (SIGINT/SIGTERM)");
    };

    let (_, server) =
        warp::serve(routes).bind_with_graceful_shutdown((host, cfg.port), shutdown_signal);
    server.await;

    info!("signaling server shut down");
    Ok(())
}
