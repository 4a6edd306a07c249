//! Router configuration for the blend server.
//!
//! # Route Structure
//!
//! ```text
//! /health              - Health check
//! /zoomify/{*argument} - Zoomify-style blend requests
//! /iiif/{*argument}    - IIIF-style blend requests
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::blend::BlendService;
use crate::channel::ChannelSource;

use super::handlers::{health_handler, iiif_blend_handler, zoomify_blend_handler, AppState};

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Maximum output dimension (0 = unrestricted)
    pub max_size: u32,

    /// Allow scaling beyond the native resolution
    pub allow_upscaling: bool,

    /// Auto contrast-stretch from channel histograms
    pub auto_contrast: bool,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a configuration with the default policies.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Output size is unrestricted, upscaling is off
    /// - Auto contrast-stretch is off
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            cache_max_age: 3600,
            max_size: 0,
            allow_upscaling: false,
            auto_contrast: false,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Set the maximum output dimension.
    pub fn with_max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    /// Allow or forbid upscaling.
    pub fn with_allow_upscaling(mut self, allow: bool) -> Self {
        self.allow_upscaling = allow;
        self
    }

    /// Enable or disable auto contrast-stretch.
    pub fn with_auto_contrast(mut self, enabled: bool) -> Self {
        self.auto_contrast = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the application router.
pub fn create_router<S>(service: BlendService<S>, config: RouterConfig) -> Router
where
    S: ChannelSource + 'static,
{
    let mut state = AppState::new(service);
    state.cache_max_age = config.cache_max_age;
    state.max_size = config.max_size;
    state.allow_upscaling = config.allow_upscaling;
    state.auto_contrast = config.auto_contrast;
    // The response header mirrors the first configured origin; the CORS
    // layer below enforces the full policy
    state.cors_origin = match &config.cors_origins {
        None => Some("*".to_string()),
        Some(origins) => origins.first().cloned(),
    };

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/zoomify/{*argument}", get(zoomify_blend_handler::<S>))
        .route("/iiif/{*argument}", get(iiif_blend_handler::<S>))
        .with_state(state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_config_defaults() {
        let config = RouterConfig::new();
        assert!(config.cors_origins.is_none());
        assert_eq!(config.cache_max_age, 3600);
        assert_eq!(config.max_size, 0);
        assert!(!config.allow_upscaling);
        assert!(!config.auto_contrast);
        assert!(config.enable_tracing);
    }

    #[test]
    fn test_router_config_builder() {
        let config = RouterConfig::new()
            .with_cors_origins(vec!["https://example.com".to_string()])
            .with_cache_max_age(7200)
            .with_max_size(5000)
            .with_allow_upscaling(true)
            .with_auto_contrast(true)
            .with_tracing(false);

        assert_eq!(
            config.cors_origins,
            Some(vec!["https://example.com".to_string()])
        );
        assert_eq!(config.cache_max_age, 7200);
        assert_eq!(config.max_size, 5000);
        assert!(config.allow_upscaling);
        assert!(config.auto_contrast);
        assert!(!config.enable_tracing);
    }

    #[test]
    fn test_build_cors_layer_variants() {
        // None, some, and empty origin lists must all build
        let _ = build_cors_layer(&RouterConfig::new());
        let _ = build_cors_layer(
            &RouterConfig::new().with_cors_origins(vec!["https://example.com".to_string()]),
        );
        let _ = build_cors_layer(&RouterConfig::new().with_cors_origins(vec![]));
    }
}
