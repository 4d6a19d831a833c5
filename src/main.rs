use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use image_batch_compressor::{
    app_state::AppState,
    config::AppConfig,
    db::{self, JobStore, MemoryJobStore, PgJobStore},
    routes,
    services::{
        compression::JpegCompressor, fetcher::HttpFetcher, notifier::WebhookNotifier,
        pipeline::ProductPipeline, storage::S3ArtifactStore,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing image-batch-compressor server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe();

    let jobs: Arc<dyn JobStore> = match config.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL database");
            let pool = db::init_pool(url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Running database migrations");
            db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");

            Arc::new(PgJobStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, product jobs are kept in memory only");
            Arc::new(MemoryJobStore::new())
        }
    };

    tracing::info!(bucket = %config.aws_bucket_name, "Initializing S3 artifact store");
    let artifacts = S3ArtifactStore::new(
        &config.aws_bucket_name,
        &config.aws_region,
        config.s3_endpoint.as_deref(),
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
    )
    .expect("Failed to initialize S3 client")
    .with_public_base_url(config.s3_public_base_url.as_deref());

    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))
        .expect("Failed to initialize image fetcher");

    if config.webhook_url.is_none() {
        tracing::warn!("WEBHOOK_URL not set, outcome notifications will be dropped");
    }
    let notifier = WebhookNotifier::new(
        config.webhook_url.clone(),
        Duration::from_secs(config.webhook_timeout_secs),
    )
    .expect("Failed to initialize webhook notifier");

    let pipeline = Arc::new(ProductPipeline::new(
        Arc::new(fetcher),
        Arc::new(JpegCompressor::default()),
        Arc::new(artifacts),
        Arc::clone(&jobs),
        Arc::new(notifier),
        config.image_permits(),
    ));

    let state = AppState::new(jobs, pipeline);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!(
        bind_addr = %config.bind_addr,
        max_concurrent_images = config.image_permits(),
        "Server listening"
    );

    axum::serve(listener, app).await.expect("Server error");
}
