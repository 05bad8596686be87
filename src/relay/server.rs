use crate::{
    config::RelayConfig,
    error::{RelayError, Result},
    feed::MemoryFeedStore,
};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::handlers::{health_handler, push_handler, read_handler, write_handler};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct RelayState {
    pub(crate) store: MemoryFeedStore,
    pub(crate) shutdown: CancellationToken,
}

/// Build the relay routes over `store`. Event streams end when `shutdown` fires.
pub fn router(store: MemoryFeedStore, shutdown: CancellationToken) -> Router {
    let state = RelayState { store, shutdown };

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/*path",
            get(read_handler).put(write_handler).post(push_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Relay server exposing a memory store over HTTP
pub struct RelayServer {
    config: RelayConfig,
    store: MemoryFeedStore,
}

impl RelayServer {
    pub fn new(config: RelayConfig, store: MemoryFeedStore) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &MemoryFeedStore {
        &self.store
    }

    /// Bind the configured address and serve until `cancellation_token` fires
    pub async fn start(&self, cancellation_token: CancellationToken) -> Result<()> {
        let addr = format!("{}:{}", self.config.ip, self.config.port);

        info!("Starting relay server on {}", addr);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;

        self.serve(listener, cancellation_token).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        &self,
        listener: TcpListener,
        cancellation_token: CancellationToken,
    ) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        info!("Relay server listening on {}", local_addr);

        let app = router(self.store.clone(), cancellation_token.clone());

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
            .await
            .map_err(|e| RelayError::ServerFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Relay server on {} stopped", local_addr);
        Ok(())
    }
}
