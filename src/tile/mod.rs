//! Tile layer: raw buffers, the shared tile cache, fetch and JPEG codec.
//!
//! The fetch path sits between the preprocessing pipeline and the channel
//! images:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Preprocessing pipeline          │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileFetcher                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  TileCache   │  │  JPEG decode /  │  │
//! │  │  (raw tiles) │  │  edge cropping  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             ChannelImage                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`RawTile`]: the pixel buffer flowing through the pipeline
//! - [`TileCache`]: process-wide LRU of raw tiles keyed by
//!   (path, resolution, tile, compression) with size-based eviction
//! - [`TileFetcher`]: cache-first tile and region acquisition
//! - [`JpegTileEncoder`]: encodes blended tiles, decodes stored JPEG tiles

mod cache;
mod encoder;
mod fetch;
mod raw;

pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use encoder::{
    clamp_quality, is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
pub use fetch::TileFetcher;
pub use raw::{Compression, RawTile};
