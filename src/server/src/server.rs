//! HTTP server setup and lifecycle management

use crate::{routes, state::AppState};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

/// HTTP server instance
pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self {
            addr: addr.into(),
            state,
        }
    }

    /// Serve until a shutdown signal arrives
    ///
    /// On shutdown the state's cancellation token fires, so running crawls abandon their
    /// pending lookups before open connections are drained.
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .context(format!("Failed to bind to {}", self.addr))?;

        let local_addr = listener.local_addr()?;
        info!("Server listening on http://{}", local_addr);
        info!("Crawl endpoint: http://{}/", local_addr);
        info!("Health check endpoint: http://{}/_ah/health", local_addr);
        info!("Metrics endpoint: http://{}/metrics", local_addr);

        let shutdown = self.state.shutdown.clone();
        let app = routes::create_router(self.state);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                shutdown.cancel();
            })
            .await
            .context("Server error")?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
