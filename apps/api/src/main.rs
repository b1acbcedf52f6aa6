mod config;
mod correlation;
mod db;
mod drafts;
mod errors;
mod llm_client;
mod models;
mod normalizer;
mod reconcile;
mod routes;
mod state;
mod storage;
mod triggers;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::correlation::{CorrelationConfig, RedisCorrelationCache};
use crate::db::create_pool;
use crate::drafts::PgDraftStore;
use crate::llm_client::MoonshotClient;
use crate::normalizer::{Normalizer, NormalizerConfig};
use crate::reconcile::{PgPipelineStore, PgProductionStore};
use crate::routes::build_router;
use crate::state::AppState;
use crate::triggers::RedisTriggerQueue;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting talent intake API v{}", env!("CARGO_PKG_VERSION"));

    // Talent database (drafts + production) and pipeline database
    let talent_db = create_pool("talent", &config.database_url).await?;
    let pipeline_db = if config.pipeline_database_url == config.database_url {
        talent_db.clone()
    } else {
        create_pool("pipeline", &config.pipeline_database_url).await?
    };

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    let correlation = RedisCorrelationCache::new(redis.clone(), CorrelationConfig::from(&config));
    let triggers = RedisTriggerQueue::new(redis, config.trigger_queue.clone());
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize extraction service client
    let service = MoonshotClient::new(config.llm_api_key.clone(), &config.llm_base_url)?;
    let normalizer = Normalizer::new(Arc::new(service), NormalizerConfig::from(&config));
    info!(
        "Extraction service initialized (model: {}, base url: {})",
        config.llm_model, config.llm_base_url
    );

    let state = AppState::new(
        Arc::new(PgDraftStore::new(talent_db.clone())),
        Arc::new(correlation),
        Arc::new(PgProductionStore::new(talent_db)),
        Arc::new(PgPipelineStore::new(pipeline_db)),
        Arc::new(triggers),
        normalizer,
        s3,
        config.clone(),
    );

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "talent-intake-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets path-style
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
