//! Optimization job worker.
//!
//! Hosts the scheduled sweep, a bounded job pool and the HTTP trigger
//! surface around the campaign control loop.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod runner;
pub mod state;

pub use config::WorkerConfig;
pub use runner::{JobError, JobRunner};
pub use state::{AppState, UnavailableTips};

use axum::http::Request;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::routes::create_router;

/// HTTP server plus the background scheduler.
pub struct WorkerServer {
    config: WorkerConfig,
    state: Arc<AppState>,
}

impl WorkerServer {
    pub fn new(config: WorkerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Run until interrupted.
    pub async fn run(self) -> anyhow::Result<()> {
        let scheduler = tokio::spawn(
            self.state
                .runner
                .clone()
                .run_schedule(self.config.clone()),
        );

        let router = create_router(self.state.clone()).layer(
            TraceLayer::new_for_http()
                .on_request(|request: &Request<_>, _span: &tracing::Span| {
                    tracing::info!(
                        method = %request.method(),
                        uri = %request.uri(),
                        "Incoming request"
                    );
                })
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );
        let router = if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        };

        let addr = self.config.socket_addr()?;
        info!(address = %addr, "Starting optimizer worker");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        scheduler.abort();
        info!("Optimizer worker stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
