use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use fib_payments_backend::cache::{Cache, InMemoryCache};
use fib_payments_backend::config::Config;
use fib_payments_backend::database::{self, PaymentRepository, PoolConfig};
use fib_payments_backend::payments::providers::FibProvider;
use fib_payments_backend::payments::PaymentService;
use fib_payments_backend::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    info!(
        environment = %config.server.environment,
        fib_environment = %config.fib.environment,
        fib_base_url = %config.fib.base_url(),
        "Starting FIB payments backend"
    );

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await
    .context("Failed to connect to the database")?;

    database::run_migrations(&pool).await?;

    let tokens = token_cache(&config).await;
    let provider = FibProvider::new(config.fib.clone(), tokens)?;
    let store = PaymentRepository::new(pool);
    let payments = PaymentService::new(Arc::new(provider), Arc::new(store));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST and PORT must form a valid socket address")?;

    let app = api::router(AppState::new(config, payments));

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `RUST_LOG` filter (default `info`); `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[cfg(feature = "cache")]
async fn token_cache(config: &Config) -> Arc<dyn Cache<String>> {
    use fib_payments_backend::cache::{init_cache_pool, CacheConfig, RedisCache};

    let Some(url) = config.redis.url.clone() else {
        info!("REDIS_URL not set, caching provider tokens in memory");
        return Arc::new(InMemoryCache::new());
    };

    match init_cache_pool(CacheConfig {
        redis_url: url,
        ..CacheConfig::default()
    })
    .await
    {
        Ok(pool) => Arc::new(RedisCache::new(pool)),
        Err(e) => {
            warn!(error = %e, "Redis unavailable, caching provider tokens in memory");
            Arc::new(InMemoryCache::new())
        }
    }
}

#[cfg(not(feature = "cache"))]
async fn token_cache(config: &Config) -> Arc<dyn Cache<String>> {
    if config.redis.url.is_some() {
        warn!("REDIS_URL is set but the cache feature is disabled, caching tokens in memory");
    }
    Arc::new(InMemoryCache::new())
}
