mod access_log;
mod routes;
mod webhook;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    alerts::{AlertNormalizer, Blacklist},
    config::Config,
    dispatch::Dispatch,
    Error, Result,
};

pub use access_log::AccessLine;
pub use webhook::WebhookResponse;

/// Shared by every request; never mutated after startup.
pub struct AppState {
    pub normalizer: AlertNormalizer,
    pub dispatcher: Arc<dyn Dispatch>,
    pub log_json_body: bool,
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: &Config, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            state: AppState {
                normalizer: AlertNormalizer::new(Blacklist::from_config(&config.blacklist)),
                dispatcher,
                log_json_body: config.logging.log_json_body,
            },
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self.state);

        Router::new()
            .route("/", post(webhook::receive_webhook))
            .route("/metrics", get(routes::metrics))
            // Alert batches are read whole, however large.
            .layer(DefaultBodyLimit::disable())
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::from_fn(access_log::access_log))
                    .layer(TraceLayer::new_for_http())
                    .layer(CatchPanicLayer::custom(routes::panic_response)),
            )
            .with_state(state)
    }

    /// Serves until Ctrl-C or SIGTERM.
    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Server listening on {}...", local_addr);

        axum::serve(
            listener,
            self.build_router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining in-flight requests");
}
