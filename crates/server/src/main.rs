//! Plaza database setup entry point.
//!
//! Loads configuration, applies pending migrations and checks that the cache
//! answers. A cache that cannot be reached is reported but is not fatal: the
//! services run against the database alone until it comes back.

use std::sync::Arc;

use plaza_common::{Config, FastCache, RedisFastCache};
use plaza_core::CacheLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connect to the configured cache, or fall back to none.
async fn connect_cache(config: &Config) -> CacheLayer {
    if !config.redis.enabled {
        info!("Cache disabled by configuration");
        return CacheLayer::disabled();
    }

    let cache = match RedisFastCache::connect(&config.redis).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!(error = %e, "Cache unreachable, continuing without it");
            return CacheLayer::disabled();
        }
    };

    if let Err(e) = cache.ping().await {
        warn!(error = %e, "Cache did not answer ping");
    }

    CacheLayer::new(Arc::new(cache))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plaza=debug,sea_orm=info".into()),
        )
        .init();

    info!("Starting plaza setup...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = plaza_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    plaza_db::migrate(&db).await?;
    info!("Migrations completed");

    let cache = connect_cache(&config).await;
    info!(cache_enabled = cache.is_enabled(), "Setup finished");

    db.close().await?;
    Ok(())
}
