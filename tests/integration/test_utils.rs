//! Shared test utilities: in-memory channel sources, TIFF builders and
//! response helpers.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

use blend_streamer::{
    BlendService, ChannelRegistry, ChannelSource, IoError, PipelineConfig, RangeReader,
    RouterConfig, TileCache,
};

/// Fixed timestamp every in-memory image reports.
pub const TEST_TIMESTAMP: &str = "Thu, 01 Jan 2026 00:00:00 GMT";

// =============================================================================
// In-memory source
// =============================================================================

/// A [`RangeReader`] over an in-memory byte buffer.
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

#[async_trait]
impl RangeReader for MemoryReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Channel source serving images from memory.
pub struct MemoryChannelSource {
    images: HashMap<String, Bytes>,
}

impl MemoryChannelSource {
    pub fn new() -> Self {
        Self {
            images: HashMap::new(),
        }
    }

    pub fn with_image(mut self, path: &str, data: Vec<u8>) -> Self {
        self.images.insert(path.to_string(), Bytes::from(data));
        self
    }
}

#[async_trait]
impl ChannelSource for MemoryChannelSource {
    type Reader = MemoryReader;

    async fn open(&self, path: &str) -> Result<(Self::Reader, String), IoError> {
        let data = self
            .images
            .get(path)
            .ok_or_else(|| IoError::NotFound(path.to_string()))?;
        Ok((
            MemoryReader {
                data: data.clone(),
                identifier: path.to_string(),
            },
            TEST_TIMESTAMP.to_string(),
        ))
    }
}

// =============================================================================
// TIFF builder
// =============================================================================

/// One level of a synthetic grayscale pyramid.
pub struct TestLevel {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Samples over the padded tile grid, row-major per tile
    pub pixels: Vec<u16>,
}

impl TestLevel {
    /// Level filled with a constant value.
    pub fn filled(width: u32, height: u32, tile_size: u32, value: u16) -> Self {
        let tiles_x = width.div_ceil(tile_size);
        let tiles_y = height.div_ceil(tile_size);
        let n = (tiles_x * tiles_y * tile_size * tile_size) as usize;
        Self {
            width,
            height,
            tile_width: tile_size,
            tile_height: tile_size,
            pixels: vec![value; n],
        }
    }

    /// Level where every tile is filled with `base + index * step`.
    pub fn tile_indexed(width: u32, height: u32, tile_size: u32, base: u16, step: u16) -> Self {
        let mut level = Self::filled(width, height, tile_size, 0);
        let tile_px = (tile_size * tile_size) as usize;
        let tiles = (width.div_ceil(tile_size) * height.div_ceil(tile_size)) as usize;
        for t in 0..tiles {
            let value = base + step * t as u16;
            for p in 0..tile_px {
                level.pixels[t * tile_px + p] = value;
            }
        }
        level
    }
}

/// Build a classic little-endian grayscale tiled TIFF with raw tiles.
pub fn build_gray_tiff(levels: &[TestLevel], bits: u16) -> Vec<u8> {
    build_tiff(levels, bits, 1)
}

/// Build a grayscale tiled TIFF whose tiles are complete JPEG streams
/// (compression tag 7). JPEG tiles are always 8-bit.
pub fn build_gray_jpeg_tiff(levels: &[TestLevel]) -> Vec<u8> {
    build_tiff(levels, 8, 7)
}

fn build_tiff(levels: &[TestLevel], bits: u16, compression: u16) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(&[0x49, 0x49, 42, 0]);
    out.extend_from_slice(&[0, 0, 0, 0]);

    let bytes_per_sample = (bits / 8) as usize;
    let mut level_tiles: Vec<(Vec<u32>, Vec<u32>)> = Vec::new();
    for level in levels {
        let tiles_x = level.width.div_ceil(level.tile_width);
        let tiles_y = level.height.div_ceil(level.tile_height);
        let tile_px = (level.tile_width * level.tile_height) as usize;

        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for t in 0..(tiles_x * tiles_y) as usize {
            offsets.push(out.len() as u32);
            let tile_pixels = &level.pixels[t * tile_px..(t + 1) * tile_px];
            if compression == 7 {
                let stream =
                    encode_tile_jpeg(level.tile_width, level.tile_height, tile_pixels);
                counts.push(stream.len() as u32);
                out.extend_from_slice(&stream);
            } else {
                for &px in tile_pixels {
                    if bytes_per_sample == 1 {
                        out.push(px as u8);
                    } else {
                        out.extend_from_slice(&px.to_le_bytes());
                    }
                }
                counts.push((tile_px * bytes_per_sample) as u32);
            }
        }
        level_tiles.push((offsets, counts));
    }

    let mut prev_next_field: usize = 4;
    for (level, (offsets, counts)) in levels.iter().zip(&level_tiles) {
        let offsets_pos = if offsets.len() > 1 {
            let pos = out.len() as u32;
            for o in offsets {
                out.extend_from_slice(&o.to_le_bytes());
            }
            pos
        } else {
            offsets[0]
        };
        let counts_pos = if counts.len() > 1 {
            let pos = out.len() as u32;
            for c in counts {
                out.extend_from_slice(&c.to_le_bytes());
            }
            pos
        } else {
            counts[0]
        };

        let ifd_offset = out.len() as u32;
        out[prev_next_field..prev_next_field + 4].copy_from_slice(&ifd_offset.to_le_bytes());

        let entries: Vec<(u16, u16, u32, u32)> = vec![
            (256, 4, 1, level.width),
            (257, 4, 1, level.height),
            (258, 3, 1, bits as u32),
            (259, 3, 1, compression as u32),
            (262, 3, 1, 1),
            (277, 3, 1, 1),
            (322, 3, 1, level.tile_width),
            (323, 3, 1, level.tile_height),
            (324, 4, offsets.len() as u32, offsets_pos),
            (325, 4, counts.len() as u32, counts_pos),
        ];

        out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (tag, typ, count, value) in &entries {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&typ.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            if *typ == 3 && *count == 1 {
                out.extend_from_slice(&(*value as u16).to_le_bytes());
                out.extend_from_slice(&[0, 0]);
            } else {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        prev_next_field = out.len();
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    out
}

/// Encode one padded tile as a grayscale JPEG stream.
fn encode_tile_jpeg(tile_width: u32, tile_height: u32, pixels: &[u16]) -> Vec<u8> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{GrayImage, Luma};

    let img = GrayImage::from_fn(tile_width, tile_height, |x, y| {
        Luma([pixels[(y * tile_width + x) as usize] as u8])
    });

    let mut stream = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut stream, 95);
    encoder.encode_image(&img).unwrap();
    stream
}

// =============================================================================
// Router and request helpers
// =============================================================================

/// Build a router with default policies over in-memory images.
pub fn build_router(source: MemoryChannelSource) -> axum::Router {
    build_router_with_config(source, RouterConfig::new().with_tracing(false))
}

/// Build a router with explicit policies over in-memory images.
pub fn build_router_with_config(
    source: MemoryChannelSource,
    config: RouterConfig,
) -> axum::Router {
    let registry = ChannelRegistry::new(source);
    let service = BlendService::new(
        registry,
        Arc::new(TileCache::new()),
        PipelineConfig::default(),
        95,
    );
    blend_streamer::create_router(service, config)
}

/// Percent-encode the characters http::Uri rejects in a path.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '{' => out.push_str("%7B"),
            '}' => out.push_str("%7D"),
            '"' => out.push_str("%22"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            _ => out.push(c),
        }
    }
    out
}

/// Check JPEG SOI/EOI markers.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4
        && data[0] == 0xFF
        && data[1] == 0xD8
        && data[data.len() - 2] == 0xFF
        && data[data.len() - 1] == 0xD9
}
