//! Blogicum - a small multi-author blog

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogicum::{
    config::Config,
    db,
    theme::ThemeEngine,
    web::{self, AppState},
};

/// How often expired sessions and stale rate-limit entries are dropped
const CLEANUP_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogicum=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Blogicum...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    let theme_engine = ThemeEngine::new(config.templates.path.as_deref())?;
    tracing::info!("Templates loaded");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, pool, theme_engine);

    {
        let user_service = state.user_service.clone();
        let limiter = state.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = user_service.cleanup_expired_sessions().await {
                    tracing::warn!("Failed to clean up sessions: {}", e);
                }
                limiter.cleanup().await;
            }
        });
    }

    let app = web::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
