use aerobook_api::{app, AppState};
use aerobook_store::app_config::Config;
use aerobook_store::{RedisClient, Repositories};
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerobook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting AeroBook API on port {}", config.server.port);

    let repos = Repositories::connect(&config.database)
        .await
        .context("Failed to initialise the database")?;

    let redis = match &config.redis.url {
        Some(url) => Some(Arc::new(RedisClient::new(url).context("Invalid Redis URL")?)),
        None => {
            tracing::info!("Redis not configured; rate limiting disabled");
            None
        }
    };

    let app_state = AppState::new(repos, config.auth.clone(), config.business_rules.clone(), redis);
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("Server error")?;

    Ok(())
}
