//! SliceIO Gateway - HTTP API
//!
//! Thin wiring only: configuration, dependency construction, routes, and
//! graceful shutdown. Authentication happens upstream; requests arrive
//! with an already-resolved identity header.

mod routes;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use clap::Parser;
use sliceio_cache::RedisCache;
use sliceio_common::Config;
use sliceio_engine::ThresholdEngine;
use sliceio_pipeline::{Buckets, CoreDeps, ServiceContext, spawn_materializer};
use sliceio_store::{HttpObjectStore, RedbMetaStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sliceio-gateway")]
#[command(about = "SliceIO HTTP API Gateway")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/sliceio/gateway.toml")]
    config: String,

    /// Listen address (overrides configuration)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(config::File::with_name(&args.config).required(false))
        .add_source(config::Environment::with_prefix("SLICEIO").separator("__"))
        .build()?
        .try_deserialize::<Config>()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(&args)?;
    if let Some(listen) = &args.listen {
        config.gateway.listen = listen.parse()?;
    }

    info!("Starting SliceIO Gateway");
    info!("Cache: {}", config.cache.url);
    info!("Object store: {}", config.object_store.endpoint);
    info!("Metadata dir: {}", config.metadata.data_dir.display());

    let cache = RedisCache::new(&config.cache)?;
    let objects = HttpObjectStore::new(&config.object_store)?;
    let meta = RedbMetaStore::open(config.metadata.data_dir.join("meta.redb"))?;

    let deps = Arc::new(CoreDeps {
        cache: Arc::new(cache),
        objects: Arc::new(objects),
        meta: Arc::new(meta),
        // The segmentation model is deployed separately; the threshold
        // engine stands in behind the same seam.
        engine: Arc::new(ThresholdEngine::default()),
        buckets: Buckets {
            private: config.object_store.private_bucket.clone(),
            public: config.object_store.public_bucket.clone(),
        },
    });
    let materializer = spawn_materializer(Arc::clone(&deps), config.materializer.workers);
    let ctx = ServiceContext::new(deps, materializer);

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/files/upload", post(routes::upload_file))
        .route("/api/v1/files/predict", post(routes::predict))
        .route(
            "/api/v1/files/{volume_id}/slices/{slice}/image",
            get(routes::slice_image),
        )
        .route(
            "/api/v1/files/{volume_id}/slices/{slice}/contours",
            get(routes::slice_contours),
        )
        .route("/api/v1/photos/save", post(routes::save_photo))
        .route("/api/v1/photos", get(routes::list_photos))
        .route("/api/v1/photos/{photo_id}", delete(routes::delete_photo))
        .route(
            "/api/v1/contours/{volume_id}/{slice}/save",
            post(routes::save_contours),
        )
        .route(
            "/api/v1/contours/{volume_id}/{slice}/latest",
            get(routes::latest_contours),
        )
        .layer(DefaultBodyLimit::max(config.gateway.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx.clone());

    info!("Listening on {}", config.gateway.listen);
    let listener = TcpListener::bind(config.gateway.listen).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    // Let scheduled background work drain before exiting.
    ctx.materializer.wait_idle().await;
    info!("Gateway shut down gracefully");

    Ok(())
}
