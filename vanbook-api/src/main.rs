use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vanbook_api::{app, cors_origin, AppState, AuthConfig};
use vanbook_core::events::{EventPublisher, NoopEventPublisher};
use vanbook_store::app_config::Config;
use vanbook_store::{DbClient, EventProducer, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vanbook_api=debug,vanbook_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    let allowed_origin = cors_origin(&config.cors.allowed_origin)?;
    tracing::info!("Starting VanBook API on port {}", config.server.port);

    let db = DbClient::new(&config.database).await.context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let rules = match db.fetch_business_rules(config.business_rules.clone()).await {
        Ok(rules) => rules,
        Err(e) => {
            tracing::warn!("Could not read business rules, using configured values: {}", e);
            config.business_rules.clone()
        }
    };
    tracing::info!("Seat holds last {}s", rules.lock_ttl_seconds);

    // Redis being down is survivable: reservations fall back to the store check.
    let redis = RedisClient::new(&config.redis.url, Duration::from_millis(config.redis.lock_timeout_ms))
        .context("Invalid Redis URL")?;
    if let Err(e) = redis.ping().await {
        tracing::warn!("Redis unreachable at startup, seat locks degraded: {}", e);
    }

    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka) => Arc::new(EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?),
        None => {
            tracing::info!("No Kafka brokers configured, booking events are dropped");
            Arc::new(NoopEventPublisher)
        }
    };

    let app_state = AppState::new(
        db.repositories(),
        Arc::new(redis),
        events,
        rules,
        AuthConfig { secret: config.auth.jwt_secret.clone() },
        allowed_origin,
    )
    .context("Failed to register metrics")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
