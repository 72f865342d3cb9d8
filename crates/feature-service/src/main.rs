//! Feature Restriction Service binary entrypoint.

use feature_core::config::Config;
use feature_core::repository::{EventLog, UserRepository};
use feature_redis::{connect, RedisEventLog, RedisTripwireRepository, RedisUserRepository};
use feature_service::FeatureService;
use feature_tripwire::{TripwireConfig, TripwireController};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "feature_service=info,feature_consumer=info,tower_http=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Each store gets its own logical db — `RedisUserRepository::count`
    // relies on `DBSIZE` counting only user aggregates, which only
    // holds if the stream and tripwire hashes live elsewhere.
    let user_conn = connect(&config.redis.db_url(config.redis.user_db)).await?;
    let stream_conn = connect(&config.redis.db_url(config.redis.stream_db)).await?;
    let tripwire_conn = connect(&config.redis.db_url(config.redis.tripwire_db)).await?;

    let user_repo: Arc<dyn UserRepository> = Arc::new(RedisUserRepository::new(user_conn));
    let event_log: Arc<dyn EventLog> = Arc::new(RedisEventLog::new(
        stream_conn,
        config.stream.stream_key.clone(),
        config.stream.consumer_group.clone(),
        config.stream.consumer_name.clone(),
    ));
    let tripwire = Arc::new(TripwireController::new(
        Box::new(RedisTripwireRepository::new(tripwire_conn)),
        TripwireConfig {
            window_secs: config.tripwire.window_secs,
            threshold: config.tripwire.threshold,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let service = FeatureService::new(config, user_repo, event_log, tripwire);
    service.run(shutdown_rx).await
}
