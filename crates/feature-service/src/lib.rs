//! Feature Restriction Service
//!
//! HTTP ingress and the background `StreamConsumer` for the
//! event-driven feature-restriction pipeline, wired together behind
//! one axum server that owns both its router and its background
//! tasks.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use feature_consumer::StreamConsumer;
use feature_core::config::Config;
use feature_core::repository::{EventLog, UserRepository};
use feature_tripwire::TripwireController;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The feature-restriction service: an HTTP server plus its
/// background `StreamConsumer`, both driven from the same
/// [`Config`] and the same storage handles.
pub struct FeatureService {
    config: Config,
    state: Arc<AppState>,
    consumer: Arc<StreamConsumer>,
}

impl FeatureService {
    pub fn new(
        config: Config,
        user_repo: Arc<dyn UserRepository>,
        event_log: Arc<dyn EventLog>,
        tripwire: Arc<TripwireController>,
    ) -> Self {
        let consumer = Arc::new(StreamConsumer::new(
            event_log.clone(),
            user_repo.clone(),
            tripwire.clone(),
            config.stream.read_count,
            config.stream.block_ms,
        ));
        let state = Arc::new(AppState::new(user_repo, event_log, tripwire));
        Self {
            config,
            state,
            consumer,
        }
    }

    /// Run the HTTP server and the stream consumer side by side until
    /// `shutdown` fires, then wait for both to exit cleanly.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        self.consumer.start().await?;
        self.state.consumer_readiness.mark_ready();

        let consumer = self.consumer.clone();
        let consumer_shutdown = shutdown.clone();
        let consumer_handle = tokio::spawn(async move { consumer.serve(consumer_shutdown).await });

        let router = create_router(self.state.clone()).layer(TraceLayer::new_for_http());
        let addr: SocketAddr = self.config.server.bind_addr.parse()?;
        info!(address = %addr, "starting feature-restriction HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let mut server_shutdown = shutdown.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await?;

        consumer_handle.await??;
        Ok(())
    }
}
