use std::sync::Arc;

use jobrec_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, CacheWriterHandle, PgStore},
    routes::{create_router, AppState},
    services::{ClusterAssigner, RecommendationService},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobrec_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Database
    let pool = create_pool(&config.database_url, config.max_db_connections).await?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    // Optional recommendation cache
    let (cache, cache_writer) = match connect_cache(&config).await {
        Some((cache, writer)) => (Some(cache), Some(writer)),
        None => (None, None),
    };

    let recommender = RecommendationService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        config.recommender_settings(),
    );
    let assigner = ClusterAssigner::new(store.clone(), store.clone(), config.clustering_settings());

    let state = Arc::new(AppState {
        recommender: Arc::new(recommender),
        assigner: Arc::new(assigner),
        views: store,
        cache,
        cache_ttl_secs: config.recommendation_cache_ttl_secs,
    });

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(writer) = cache_writer {
        writer.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn connect_cache(config: &Config) -> Option<(Cache, CacheWriterHandle)> {
    let url = match config.redis_url.as_deref() {
        Some(url) if config.recommendation_cache_ttl_secs > 0 => url,
        _ => {
            tracing::info!("Recommendation cache disabled");
            return None;
        }
    };

    match create_redis_client(url) {
        Ok(client) => {
            tracing::info!("Recommendation cache enabled");
            Some(Cache::new(client).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Invalid Redis URL, recommendation cache disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
