//! Raw tile and region acquisition.
//!
//! The fetcher sits between the pipeline and the channel images: it serves
//! raw tiles from the process-wide cache, reads and conditions stored tile
//! data on a miss (stored JPEG tiles are decoded, 16-bit samples are
//! normalized to native byte order, edge tiles are cropped), and assembles
//! arbitrary regions from the underlying tile grid. Every tile it delivers
//! is uncompressed: the blending pipeline has no use for encoded data.

use std::sync::Arc;

use tracing::debug;

use crate::channel::ChannelImage;
use crate::error::{BlendError, ProtocolError};
use crate::format::ByteOrder;
use crate::io::RangeReader;

use super::cache::{TileCache, TileCacheKey};
use super::encoder::JpegTileEncoder;
use super::raw::{Compression, RawTile};

/// Fetches raw tiles through the shared tile cache.
pub struct TileFetcher {
    cache: Arc<TileCache>,
    encoder: JpegTileEncoder,
}

impl TileFetcher {
    /// Create a fetcher over a shared tile cache.
    pub fn new(cache: Arc<TileCache>) -> Self {
        Self {
            cache,
            encoder: JpegTileEncoder::new(),
        }
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Fetch one tile at a request resolution as raw samples.
    ///
    /// Stored JPEG tiles are decoded on the way in; uncompressed 16-bit
    /// data is converted to native little-endian. Edge tiles are cropped
    /// to the portion inside the image.
    pub async fn fetch_tile<R: RangeReader + 'static>(
        &self,
        image: &ChannelImage<R>,
        resolution: u32,
        tile_index: u32,
    ) -> Result<Arc<RawTile>, BlendError> {
        let level = image
            .level_at(resolution)
            .ok_or(BlendError::InvalidResolution {
                resolution,
                num_resolutions: image.num_resolutions(),
            })?;

        if tile_index >= level.tile_count() {
            return Err(BlendError::TileOutOfRange {
                tile: tile_index,
                resolution,
                total: level.tile_count(),
            });
        }

        let key = TileCacheKey::new(
            image.path(),
            resolution,
            tile_index,
            Compression::Uncompressed,
        );
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        debug!(
            path = image.path(),
            resolution, tile_index, "tile cache miss"
        );

        let stored = image.read_tile_data(resolution, tile_index).await?;

        let tile_width = level.tile_width;
        let tile_height = level.tile_height;
        let tiles_x = level.tiles_x;
        let level_width = level.width;
        let level_height = level.height;

        let tx = tile_index % tiles_x;
        let ty = tile_index / tiles_x;

        // Edge tiles are stored padded to the full tile size; crop to the
        // portion inside the image
        let actual_width = tile_width.min(level_width - tx * tile_width);
        let actual_height = tile_height.min(level_height - ty * tile_height);

        let tile = match image.stored_compression() {
            Compression::Jpeg => {
                let (w, h, pixels) = self.encoder.decode_gray(&stored)?;
                let cropped = crop_samples(&pixels, w, h, actual_width, actual_height, 1);
                RawTile {
                    width: actual_width,
                    height: actual_height,
                    channels: 1,
                    bits_per_channel: 8,
                    resolution,
                    h_sequence: tx,
                    v_sequence: ty,
                    compression: Compression::Uncompressed,
                    data: cropped,
                }
            }
            Compression::Uncompressed => {
                let bytes_per_sample = (image.bits_per_channel() / 8) as u32;
                let mut data = crop_samples(
                    &stored,
                    tile_width,
                    tile_height,
                    actual_width,
                    actual_height,
                    bytes_per_sample as usize,
                );
                // 16-bit samples are stored in the file byte order; the
                // pipeline expects native little-endian
                if bytes_per_sample == 2 && image.byte_order() == ByteOrder::BigEndian {
                    for pair in data.chunks_exact_mut(2) {
                        pair.swap(0, 1);
                    }
                }
                RawTile {
                    width: actual_width,
                    height: actual_height,
                    channels: 1,
                    bits_per_channel: image.bits_per_channel(),
                    resolution,
                    h_sequence: tx,
                    v_sequence: ty,
                    compression: Compression::Uncompressed,
                    data,
                }
            }
        };

        let tile = Arc::new(tile);
        self.cache.put(key, tile.clone()).await;
        Ok(tile)
    }

    /// Assemble an uncompressed region from the tile grid.
    ///
    /// `left`, `top`, `width` and `height` are pixels at the requested
    /// resolution. The region must lie within the level.
    pub async fn fetch_region<R: RangeReader + 'static>(
        &self,
        image: &ChannelImage<R>,
        resolution: u32,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    ) -> Result<RawTile, BlendError> {
        let level = image
            .level_at(resolution)
            .ok_or(BlendError::InvalidResolution {
                resolution,
                num_resolutions: image.num_resolutions(),
            })?;

        if width == 0
            || height == 0
            || left + width > level.width
            || top + height > level.height
        {
            return Err(BlendError::Protocol(ProtocolError::InvalidRegion(format!(
                "region {left},{top},{width},{height} outside level {}x{}",
                level.width, level.height
            ))));
        }

        let tile_width = level.tile_width;
        let tile_height = level.tile_height;
        let tiles_x = level.tiles_x;

        // Stored JPEG tiles come back decoded, so the region is always
        // assembled from 8-bit samples in that case
        let bits = match image.stored_compression() {
            Compression::Jpeg => 8,
            Compression::Uncompressed => image.bits_per_channel(),
        };
        let bytes_per_sample = (bits / 8) as usize;
        let mut region = RawTile::zeroed(width, height, 1, bits, resolution, 0, 0);

        let tx0 = left / tile_width;
        let tx1 = (left + width - 1) / tile_width;
        let ty0 = top / tile_height;
        let ty1 = (top + height - 1) / tile_height;

        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                let tile_index = ty * tiles_x + tx;
                let tile = self.fetch_tile(image, resolution, tile_index).await?;

                // Intersection of the region with this tile, in level pixels
                let origin_x = tx * tile_width;
                let origin_y = ty * tile_height;
                let x_start = left.max(origin_x);
                let y_start = top.max(origin_y);
                let x_end = (left + width).min(origin_x + tile.width);
                let y_end = (top + height).min(origin_y + tile.height);

                let copy_width = (x_end - x_start) as usize * bytes_per_sample;
                for y in y_start..y_end {
                    let src_offset = ((y - origin_y) as usize * tile.width as usize
                        + (x_start - origin_x) as usize)
                        * bytes_per_sample;
                    let dst_offset = ((y - top) as usize * width as usize
                        + (x_start - left) as usize)
                        * bytes_per_sample;
                    region.data[dst_offset..dst_offset + copy_width]
                        .copy_from_slice(&tile.data[src_offset..src_offset + copy_width]);
                }
            }
        }

        Ok(region)
    }
}

/// Copy the top-left `width`x`height` window out of a padded sample grid.
fn crop_samples(
    data: &[u8],
    padded_width: u32,
    _padded_height: u32,
    width: u32,
    height: u32,
    bytes_per_sample: usize,
) -> Vec<u8> {
    if padded_width == width {
        let len = width as usize * height as usize * bytes_per_sample;
        return data[..len].to_vec();
    }

    let src_stride = padded_width as usize * bytes_per_sample;
    let dst_stride = width as usize * bytes_per_sample;
    let mut out = Vec::with_capacity(dst_stride * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(&data[y * src_stride..y * src_stride + dst_stride]);
    }
    out
}
