//! pixelstrom viewer binary.
//!
//! Usage: `pixelstrom-viewer [config.yaml]` (default `pixelstrom.yaml`).
//! Log level via `RUST_LOG`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use pixelstrom_viewer::{config, sinks, transport::WsConnector, Viewer};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pixelstrom.yaml".to_string());

    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "config load failed");
            std::process::exit(2);
        }
    };

    let connector = match WsConnector::new(&cfg) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(error = %e, "transport init failed");
            std::process::exit(2);
        }
    };

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("ctrl-c received, shutting down");
                let _ = tx.send(true);
            }
            Err(e) => {
                // without a signal handler the viewer runs until killed
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });

    tracing::info!(
        ws_url = %cfg.server.ws_url,
        bootstrap = ?cfg.bootstrap.mode,
        sink = ?cfg.display.sink,
        "pixelstrom-viewer starting"
    );

    let mut viewer = Viewer::new(&cfg, connector, sinks::build(&cfg.display));
    if let Err(e) = viewer.run(rx).await {
        tracing::error!(code = e.code().as_str(), error = %e, "viewer stopped");
        std::process::exit(1);
    }
}
