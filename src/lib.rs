//! Blend Streamer - a multi-channel blending tile server.
//!
//! This library composes multiple single-channel grayscale image pyramids
//! into one RGB pyramid on demand: per-channel contrast normalization,
//! solid RGB tints, saturating additive accumulation and JPEG encoding,
//! served over Zoomify-style and IIIF-style URLs.

pub mod blend;
pub mod channel;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use blend::{blend_tiles, parse_blend_settings, BlendService, BlendSetting, EncodedTile, Tint};
pub use channel::{
    channel_filename, load_channels, ChannelImage, ChannelRegistry, ChannelSource,
    FileChannelSource,
};
pub use config::Config;
pub use error::{BlendError, BlendSpecError, FormatError, IoError, ProtocolError};
pub use format::{is_tiff_signature, ByteOrder, PyramidLevel, TiffCompression, TiffPyramid};
pub use io::{FileRangeReader, RangeReader};
pub use pipeline::{
    preprocess_region, preprocess_tile, Interpolation, PipelineConfig, ViewSpec,
};
pub use protocol::{
    parse_iiif, parse_zoomify, split_blend_argument, Flip, IiifKind, IiifRequest, ImageParams,
    OutputColour, Region, Rotation, SizeParam, ZoomifyKind, ZoomifyRequest,
};
pub use server::{create_router, AppState, ImageGeometry, RouterConfig};
pub use tile::{
    clamp_quality, is_valid_quality, Compression, JpegTileEncoder, RawTile, TileCache,
    TileCacheKey, TileFetcher, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY,
};
