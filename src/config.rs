//! Configuration management for the blend server.
//!
//! Supports command-line arguments via clap with environment-variable
//! fallbacks under the `BLEND_` prefix, plus sensible defaults.
//!
//! # Environment Variables
//!
//! - `BLEND_HOST` - Server bind address (default: 0.0.0.0)
//! - `BLEND_PORT` - Server port (default: 3000)
//! - `BLEND_DATA_ROOT` - Root directory of the channel pyramids (required)
//! - `BLEND_INTERPOLATION` - Region resampling: nearest|bilinear (default: bilinear)
//! - `BLEND_MAX_SIZE` - Maximum output dimension, 0 = unrestricted
//! - `BLEND_ALLOW_UPSCALING` - Allow output beyond native resolution
//! - `BLEND_EMBED_ICC` - Embed channel ICC profiles in JPEG output
//! - `BLEND_AUTO_CONTRAST` - Contrast-stretch from channel histograms
//! - `BLEND_CACHE_IMAGES` - Max channel images to cache (default: 100)
//! - `BLEND_CACHE_TILES_MB` - Tile cache budget in MB (default: 100)
//! - `BLEND_JPEG_QUALITY` - JPEG quality for blended tiles (default: 80)
//! - `BLEND_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use clap::Parser;

use crate::pipeline::Interpolation;
use crate::tile::DEFAULT_JPEG_QUALITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default number of channel images to cache.
pub const DEFAULT_IMAGE_CACHE_CAPACITY: usize = 100;

/// Default tile cache budget in megabytes.
pub const DEFAULT_TILE_CACHE_MB: usize = 100;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Blend Streamer - a multi-channel blending tile server.
///
/// Composes single-channel grayscale image pyramids into RGB tiles on
/// demand, with per-channel contrast normalization and solid RGB tints,
/// served over Zoomify-style and IIIF-style URLs.
#[derive(Parser, Debug, Clone)]
#[command(name = "blend-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "BLEND_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "BLEND_PORT")]
    pub port: u16,

    // =========================================================================
    // Image Source Configuration
    // =========================================================================
    /// Root directory containing the channel pyramid files.
    #[arg(long, env = "BLEND_DATA_ROOT")]
    pub data_root: String,

    // =========================================================================
    // Pipeline Configuration
    // =========================================================================
    /// Interpolation for region resampling: nearest or bilinear.
    #[arg(long, default_value = "bilinear", env = "BLEND_INTERPOLATION")]
    pub interpolation: String,

    /// Maximum output dimension in pixels; 0 means unrestricted.
    #[arg(long, default_value_t = 0, env = "BLEND_MAX_SIZE")]
    pub max_size: u32,

    /// Allow scaling output beyond the native resolution.
    #[arg(long, default_value_t = false, env = "BLEND_ALLOW_UPSCALING")]
    pub allow_upscaling: bool,

    /// Embed channel ICC profiles into JPEG output.
    #[arg(long, default_value_t = false, env = "BLEND_EMBED_ICC")]
    pub embed_icc: bool,

    /// Contrast-stretch each channel from its histogram.
    #[arg(long, default_value_t = false, env = "BLEND_AUTO_CONTRAST")]
    pub auto_contrast: bool,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of channel images to keep in the image cache.
    #[arg(long, default_value_t = DEFAULT_IMAGE_CACHE_CAPACITY, env = "BLEND_CACHE_IMAGES")]
    pub cache_images: usize,

    /// Tile cache budget in megabytes.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_MB, env = "BLEND_CACHE_TILES_MB")]
    pub cache_tiles_mb: usize,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// JPEG quality for blended tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "BLEND_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "BLEND_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated). Unset allows any origin.
    #[arg(long, env = "BLEND_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.data_root.is_empty() {
            return Err(
                "Data root directory is required. Set --data-root or BLEND_DATA_ROOT".to_string(),
            );
        }

        if self.interpolation_mode().is_none() {
            return Err(format!(
                "Unknown interpolation \"{}\": must be nearest or bilinear",
                self.interpolation
            ));
        }

        if self.cache_images == 0 {
            return Err("cache_images must be greater than 0".to_string());
        }
        if self.cache_tiles_mb == 0 {
            return Err("cache_tiles_mb must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the interpolation mode.
    pub fn interpolation_mode(&self) -> Option<Interpolation> {
        Interpolation::from_name(&self.interpolation)
    }

    /// Tile cache budget in bytes.
    pub fn tile_cache_bytes(&self) -> usize {
        self.cache_tiles_mb * 1024 * 1024
    }
}

// =============================================================================
// Tests
// =============================================================================
