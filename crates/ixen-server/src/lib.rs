//! # ixen-server
//!
//! HTTP front of the relay. `GET /api/live` opens one relay session per
//! request and streams it as server-sent events; the rest of the API backs
//! the embedded dashboard (classification, viewer profiles, health).

mod assets;
mod error;
mod server;
mod sse;

pub use error::ApiError;
pub use server::{router, serve, AppState, SharedState};

use ixen_core::IxenConfig;
use std::time::Duration;
use tracing::{info, warn};

/// Build the relay and classifier from `config` and serve until stopped
pub async fn run(config: IxenConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let browse_host = match config.server.host.as_str() {
        "0.0.0.0" | "::" => "localhost",
        host => host,
    };
    let url = format!("http://{}:{}", browse_host, config.server.port);

    let connector = ixen_relay::build_connector(&config);
    let classifier = ixen_agent::build_classifier(&config.classifier);

    info!("Starting ixen server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    if config.server.open_browser {
        let url = url.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                warn!("Failed to open browser: {}", e);
            }
        });
    }

    println!("Ixen running at {}", url);
    println!("Press Ctrl+C to stop");

    serve(listener, AppState::new(config, connector, classifier)).await
}
