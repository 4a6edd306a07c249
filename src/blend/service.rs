//! Orchestration of the blending pipeline.
//!
//! The service owns the shared caches and pipeline configuration and walks
//! one request through channel loading, per-channel preprocessing, tinted
//! accumulation and JPEG encoding. Channels are processed strictly in
//! settings order; the blender requires every preprocessed tile before it
//! starts, so the sequential loop doubles as the barrier.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::channel::{load_channels, ChannelImage, ChannelRegistry, ChannelSource};
use crate::error::BlendError;
use crate::pipeline::{preprocess_region, preprocess_tile, PipelineConfig, ViewSpec};
use crate::protocol::Rotation;
use crate::tile::{JpegTileEncoder, TileCache, TileFetcher};

use super::blender::blend_tiles;
use super::settings::BlendSetting;

/// A JPEG-encoded blend result ready for response framing.
#[derive(Debug, Clone)]
pub struct EncodedTile {
    /// The JPEG stream
    pub data: Bytes,

    /// RFC 1123 timestamp of the reference channel, for `Last-Modified`
    pub last_modified: String,
}

/// Service that turns blend requests into encoded RGB tiles.
pub struct BlendService<S: ChannelSource> {
    registry: Arc<ChannelRegistry<S>>,
    fetcher: TileFetcher,
    pipeline: PipelineConfig,
    quality: u8,
}

impl<S: ChannelSource> BlendService<S> {
    /// Create a service over a channel registry and shared tile cache.
    pub fn new(
        registry: ChannelRegistry<S>,
        tile_cache: Arc<TileCache>,
        pipeline: PipelineConfig,
        quality: u8,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            fetcher: TileFetcher::new(tile_cache),
            pipeline,
            quality,
        }
    }

    /// The channel registry (image cache).
    pub fn registry(&self) -> &Arc<ChannelRegistry<S>> {
        &self.registry
    }

    /// The pipeline configuration.
    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Open every channel named by the settings, in order.
    pub async fn open_channels(
        &self,
        base_path: &str,
        ext: Option<&str>,
        settings: &[BlendSetting],
    ) -> Result<Vec<Arc<ChannelImage<S::Reader>>>, BlendError> {
        load_channels(&self.registry, base_path, ext, settings).await
    }

    /// Blend one pyramid-native tile (the fast path).
    ///
    /// A 180-degree rotation remaps the tile index to the mirrored
    /// position before fetching; quarter rotations keep the index and are
    /// handled by the per-channel rotation transform.
    pub async fn blend_tile(
        &self,
        channels: &[Arc<ChannelImage<S::Reader>>],
        settings: &[BlendSetting],
        view: &ViewSpec,
        resolution: u32,
        tile_index: u32,
    ) -> Result<EncodedTile, BlendError> {
        let reference = self.reference_channel(channels, settings)?;
        let level = reference
            .level_at(resolution)
            .ok_or(BlendError::InvalidResolution {
                resolution,
                num_resolutions: reference.num_resolutions(),
            })?;

        let tile_index = if view.rotation == Rotation::Half {
            let tw = level.tile_width;
            let total = level.width.div_ceil(tw) * level.height.div_ceil(tw);
            if tile_index >= total {
                return Err(BlendError::TileOutOfRange {
                    tile: tile_index,
                    resolution,
                    total,
                });
            }
            total - tile_index - 1
        } else {
            tile_index
        };

        debug!(resolution, tile_index, channels = channels.len(), "blending tile");

        let mut encoder = JpegTileEncoder::new();
        let mut tiles = Vec::with_capacity(channels.len());
        for (image, setting) in channels.iter().zip(settings) {
            let tile = preprocess_tile(
                &self.fetcher,
                image,
                setting,
                view,
                resolution,
                tile_index,
                &mut encoder,
                &self.pipeline,
            )
            .await?;
            tiles.push(tile);
        }

        let blended = blend_tiles(&tiles, settings)?;
        let data = encoder.encode(&blended, self.quality)?;

        Ok(EncodedTile {
            data,
            last_modified: reference.timestamp().to_string(),
        })
    }

    /// Blend an arbitrary region with resampling (the region path).
    ///
    /// Resolves the best resolution for the requested output, extracts the
    /// viewport per channel and resamples to the requested size.
    pub async fn blend_region(
        &self,
        channels: &[Arc<ChannelImage<S::Reader>>],
        settings: &[BlendSetting],
        view: &ViewSpec,
    ) -> Result<EncodedTile, BlendError> {
        let reference = self.reference_channel(channels, settings)?;

        let level_dims: Vec<(u32, u32)> = (0..reference.num_resolutions() as u32)
            .map(|r| {
                (
                    reference.width_at(r).unwrap_or(0),
                    reference.height_at(r).unwrap_or(0),
                )
            })
            .collect();

        let resolution = view.best_resolution(&level_dims);
        let (level_width, level_height) = level_dims[resolution as usize];

        // Viewport in pixels at the chosen resolution, clipped to the image
        let (left, top, mut width, mut height) = if view.viewport_set() {
            view.viewport_pixels(level_width, level_height)
        } else {
            (0, 0, level_width, level_height)
        };
        width = width.min(level_width - left.min(level_width));
        height = height.min(level_height - top.min(level_height));

        let mut resampled_width = view.request_width();
        let mut resampled_height = view.request_height();

        // Prevent upscaling beyond the chosen resolution unless allowed
        if !view.allow_upscaling {
            resampled_width = resampled_width.min(level_width);
            resampled_height = resampled_height.min(level_height);
        }

        // Fit within the requested size when keeping aspect; sizes within
        // 0.1% are left alone as resolution-level rounding noise
        if view.maintain_aspect {
            let ratio = (resampled_width as f32 / width as f32)
                / (resampled_height as f32 / height as f32);
            if ratio < 0.999 {
                resampled_height = ((resampled_width as f32 / width as f32) * height as f32)
                    .round() as u32;
            } else if ratio > 1.001 {
                resampled_width = ((resampled_height as f32 / height as f32) * width as f32)
                    .round() as u32;
            }
        }

        debug!(
            resolution,
            left, top, width, height, resampled_width, resampled_height,
            "blending region"
        );

        let mut encoder = JpegTileEncoder::new();
        let mut tiles = Vec::with_capacity(channels.len());
        for (image, setting) in channels.iter().zip(settings) {
            let tile = preprocess_region(
                &self.fetcher,
                image,
                setting,
                view,
                resolution,
                (left, top, width, height),
                (resampled_width, resampled_height),
                &mut encoder,
                &self.pipeline,
            )
            .await?;
            tiles.push(tile);
        }

        let blended = blend_tiles(&tiles, settings)?;
        let data = encoder.encode(&blended, self.quality)?;

        Ok(EncodedTile {
            data,
            last_modified: reference.timestamp().to_string(),
        })
    }

    /// The first channel, which anchors geometry and timestamps.
    fn reference_channel<'a>(
        &self,
        channels: &'a [Arc<ChannelImage<S::Reader>>],
        settings: &[BlendSetting],
    ) -> Result<&'a Arc<ChannelImage<S::Reader>>, BlendError> {
        if channels.len() != settings.len() || channels.is_empty() {
            return Err(BlendError::ChannelCountMismatch {
                settings: settings.len(),
                channels: channels.len(),
            });
        }
        Ok(&channels[0])
    }
}
