use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use relgate::config::AppConfig;
use relgate::config_store::SqliteConfigStore;
use relgate::http::app_server::{AppServer, AppState};
use relgate::pipeline::QueryPipeline;
use relgate::registry::ConnectionRegistry;
use relgate::schema_cache::SchemaCache;

#[derive(Parser)]
#[command(name = "relgate-server", about = "Relational query gateway server")]
struct Cli {
    /// Path to config file
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!("starting relational query gateway");

    let config = AppConfig::load(&cli.config)?;
    config.validate()?;

    tracing::info!("configuration '{}' loaded successfully", &cli.config);

    let config_store: Arc<dyn relgate::config_store::ConfigStore> = Arc::new(
        SqliteConfigStore::connect(&config.config_store.path).await?,
    );
    let registry = Arc::new(ConnectionRegistry::new(
        config.cache.connection_capacity,
        config.cache.connection_idle_secs,
        config.cache.pool_size,
        Arc::clone(&config_store),
    ));
    let schema_cache = Arc::new(SchemaCache::new(
        config.cache.schema_capacity,
        config.cache.schema_ttl_secs,
    ));

    registry.preload().await;

    let pipeline = Arc::new(QueryPipeline::new(
        Arc::clone(&config_store),
        Arc::clone(&registry),
        Arc::clone(&schema_cache),
    ));

    let app = AppServer::new(AppState {
        pipeline,
        config_store,
        registry,
        schema_cache,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("server started in {}ms", now.elapsed().as_millis());
    tracing::info!("server listening on {}", addr);

    axum::serve(listener, app.router).await?;

    Ok(())
}
