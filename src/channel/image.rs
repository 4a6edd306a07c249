//! A view onto one single-channel pyramidal image.
//!
//! `ChannelImage` pairs the parsed pyramid structure with the reader it came
//! from, the modification timestamp used for `Last-Modified`, and a memoized
//! histogram slot. Instances live in the process-wide channel registry and
//! are shared by every request that touches the same image, so the histogram
//! computed for one request is visible to all later ones.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::FormatError;
use crate::format::{ByteOrder, PyramidLevel, TiffCompression, TiffPyramid};
use crate::io::RangeReader;
use crate::tile::Compression;

/// A pyramidal single-channel grayscale image participating in blends.
#[derive(Debug)]
pub struct ChannelImage<R: RangeReader + 'static> {
    /// Full path of the image (registry cache key)
    path: String,

    /// Range reader the pyramid was opened through
    reader: Arc<R>,

    /// Parsed pyramid structure
    pyramid: TiffPyramid,

    /// Modification timestamp, already RFC 1123 formatted
    timestamp: String,

    /// Memoized 256-bin histogram; empty until first computed
    histogram: RwLock<Arc<Vec<u32>>>,
}

impl<R: RangeReader + 'static> ChannelImage<R> {
    /// Wrap an opened pyramid. Called by the registry.
    pub(crate) fn new(path: String, reader: Arc<R>, pyramid: TiffPyramid, timestamp: String) -> Self {
        Self {
            path,
            reader,
            pyramid,
            timestamp,
            histogram: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Full path of the image.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// RFC 1123 modification timestamp for response headers.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Full-resolution width in pixels.
    pub fn width(&self) -> u32 {
        self.pyramid.dimensions().0
    }

    /// Full-resolution height in pixels.
    pub fn height(&self) -> u32 {
        self.pyramid.dimensions().1
    }

    /// Tile width, uniform across the pyramid.
    pub fn tile_width(&self) -> u32 {
        self.pyramid.level(0).map(|l| l.tile_width).unwrap_or(0)
    }

    /// Tile height, uniform across the pyramid.
    pub fn tile_height(&self) -> u32 {
        self.pyramid.level(0).map(|l| l.tile_height).unwrap_or(0)
    }

    /// Number of pyramid resolutions.
    pub fn num_resolutions(&self) -> usize {
        self.pyramid.level_count()
    }

    /// Bits per channel: 8 or 16.
    pub fn bits_per_channel(&self) -> u8 {
        self.pyramid.bits_per_sample as u8
    }

    /// Lowest sample value of the image's native range.
    pub fn min_value(&self) -> f32 {
        self.pyramid.min_sample_value as f32
    }

    /// Highest sample value of the image's native range.
    pub fn max_value(&self) -> f32 {
        self.pyramid.max_sample_value as f32
    }

    /// Embedded ICC profile, if any.
    pub fn icc_profile(&self) -> Option<&Bytes> {
        self.pyramid.icc_profile.as_ref()
    }

    /// Byte order 16-bit samples are stored in.
    pub fn byte_order(&self) -> ByteOrder {
        self.pyramid.byte_order
    }

    /// Compression of stored tile data.
    pub fn stored_compression(&self) -> Compression {
        match self.pyramid.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Jpeg => Compression::Jpeg,
        }
    }

    /// Whether the image can participate in a blend.
    ///
    /// The TIFF parser already enforces single-sample grayscale at 8 or 16
    /// bits, so this only re-checks the bit depth contract.
    pub fn is_blendable(&self) -> bool {
        matches!(self.bits_per_channel(), 8 | 16)
    }

    /// Map a request resolution (0 = smallest) to the pyramid array index
    /// (0 = largest).
    pub fn level_index(&self, resolution: u32) -> Option<usize> {
        let n = self.num_resolutions();
        if (resolution as usize) < n {
            Some(n - 1 - resolution as usize)
        } else {
            None
        }
    }

    /// Level geometry at a request resolution.
    pub fn level_at(&self, resolution: u32) -> Option<&PyramidLevel> {
        self.pyramid.level(self.level_index(resolution)?)
    }

    /// Level geometry by pyramid array index (0 = largest).
    pub fn level_by_index(&self, index: usize) -> Option<&PyramidLevel> {
        self.pyramid.level(index)
    }

    /// Image width at a request resolution.
    pub fn width_at(&self, resolution: u32) -> Option<u32> {
        self.level_at(resolution).map(|l| l.width)
    }

    /// Image height at a request resolution.
    pub fn height_at(&self, resolution: u32) -> Option<u32> {
        self.level_at(resolution).map(|l| l.height)
    }

    /// Read the stored bytes of one tile at a request resolution.
    pub async fn read_tile_data(
        &self,
        resolution: u32,
        tile_index: u32,
    ) -> Result<Bytes, FormatError> {
        let level_index = self.level_index(resolution).ok_or(FormatError::EmptyPyramid)?;
        self.pyramid
            .read_tile_data(self.reader.as_ref(), level_index, tile_index)
            .await
    }

    /// The memoized histogram; empty until [`Self::set_histogram`] is called.
    pub async fn histogram(&self) -> Arc<Vec<u32>> {
        self.histogram.read().await.clone()
    }

    /// Memoize a computed histogram on this image.
    pub async fn set_histogram(&self, histogram: Vec<u32>) {
        *self.histogram.write().await = Arc::new(histogram);
    }
}
