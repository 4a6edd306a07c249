//! Blend Streamer - a multi-channel blending tile server.
//!
//! This binary starts the HTTP server and wires up all components.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blend_streamer::{
    blend::BlendService,
    channel::{ChannelRegistry, FileChannelSource},
    config::Config,
    pipeline::PipelineConfig,
    server::{create_router, RouterConfig},
    tile::TileCache,
};

#[tokio::main]
async fn main() {
    // Parse configuration from CLI and environment
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Starting Blend Streamer");
    info!("  Data root: {}", config.data_root);
    info!("  Interpolation: {}", config.interpolation);
    info!(
        "  Cache: {} images, {} MB tiles",
        config.cache_images, config.cache_tiles_mb
    );
    if config.max_size > 0 {
        info!("  Max output size: {}", config.max_size);
    }

    // Create the channel source and registry (image cache)
    let source = FileChannelSource::new(&config.data_root);
    let registry = ChannelRegistry::with_capacity(source, config.cache_images);

    // Create the blending service over the shared tile cache
    let tile_cache = Arc::new(TileCache::with_capacity(config.tile_cache_bytes()));
    let pipeline = PipelineConfig {
        interpolation: config.interpolation_mode().unwrap_or_default(),
        embed_icc: config.embed_icc,
    };
    let service = BlendService::new(registry, tile_cache, pipeline, config.jpeg_quality);

    // Build the router
    let router_config = build_router_config(&config);
    let router = create_router(service, router_config);

    // Bind and serve
    let addr = config.bind_address();
    info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "blend_streamer=debug,tower_http=debug"
    } else {
        "blend_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_max_size(config.max_size)
        .with_allow_upscaling(config.allow_upscaling)
        .with_auto_contrast(config.auto_contrast)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
