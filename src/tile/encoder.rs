//! JPEG encoding of blended tiles and decoding of stored JPEG tiles.
//!
//! The blender produces interleaved RGB8 buffers; this module turns them
//! into JPEG streams at a configurable quality and can splice an ICC
//! profile into the output as APP2 segments. It also decodes stored JPEG
//! tiles back to grayscale samples when the pipeline needs raw pixels.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ImageReader;
use std::io::Cursor;

use crate::error::BlendError;

use super::raw::{Compression, RawTile};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Maximum ICC payload bytes per APP2 segment.
///
/// A JPEG marker segment length field is 16 bits and covers the length
/// itself, the "ICC_PROFILE\0" tag and two sequence bytes.
const ICC_SEGMENT_PAYLOAD: usize = 65535 - 2 - 12 - 2;

// =============================================================================
// JPEG Encoder
// =============================================================================

/// JPEG encoder for blended and grayscale tiles.
///
/// An optional ICC profile can be installed per request; when set it is
/// embedded into every stream produced until cleared.
#[derive(Debug, Clone, Default)]
pub struct JpegTileEncoder {
    icc_profile: Option<Bytes>,
}

impl JpegTileEncoder {
    /// Create a new JPEG tile encoder.
    pub fn new() -> Self {
        Self { icc_profile: None }
    }

    /// Install an ICC profile to embed in subsequent streams.
    pub fn set_icc_profile(&mut self, icc: Bytes) {
        self.icc_profile = Some(icc);
    }

    /// Whether an ICC profile is currently installed.
    pub fn has_icc_profile(&self) -> bool {
        self.icc_profile.is_some()
    }

    /// Encode an uncompressed 8-bit tile (1 or 3 channels) to JPEG.
    pub fn encode(&self, tile: &RawTile, quality: u8) -> Result<Bytes, BlendError> {
        if tile.compression != Compression::Uncompressed || tile.bits_per_channel != 8 {
            return Err(BlendError::Encode(format!(
                "encoder needs uncompressed 8-bit input, got {:?} at {} bits",
                tile.compression, tile.bits_per_channel
            )));
        }

        let color_type = match tile.channels {
            1 => image::ExtendedColorType::L8,
            3 => image::ExtendedColorType::Rgb8,
            n => {
                return Err(BlendError::Encode(format!(
                    "cannot encode {n}-channel tile"
                )))
            }
        };

        let quality = quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY);
        let mut output = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
        encoder
            .encode(&tile.data, tile.width, tile.height, color_type)
            .map_err(|e| BlendError::Encode(e.to_string()))?;

        if let Some(ref icc) = self.icc_profile {
            output = embed_icc_profile(output, icc);
        }

        Ok(Bytes::from(output))
    }

    /// Decode a stored JPEG tile to grayscale 8-bit samples.
    ///
    /// Returns `(width, height, samples)`.
    pub fn decode_gray(&self, stream: &[u8]) -> Result<(u32, u32, Vec<u8>), BlendError> {
        let cursor = Cursor::new(stream);
        let reader = ImageReader::with_format(cursor, image::ImageFormat::Jpeg);

        let img = reader
            .decode()
            .map_err(|e| BlendError::Decode(e.to_string()))?;

        let gray = img.to_luma8();
        let (width, height) = (gray.width(), gray.height());
        Ok((width, height, gray.into_raw()))
    }
}

// =============================================================================
// ICC embedding
// =============================================================================

/// Splice an ICC profile into a JPEG stream as APP2 segments after SOI.
///
/// Large profiles are chunked; each segment carries the standard
/// `ICC_PROFILE\0` tag plus sequence-number/segment-count bytes.
fn embed_icc_profile(stream: Vec<u8>, icc: &[u8]) -> Vec<u8> {
    if stream.len() < 2 || stream[0] != 0xFF || stream[1] != 0xD8 {
        return stream;
    }

    let chunks: Vec<&[u8]> = icc.chunks(ICC_SEGMENT_PAYLOAD).collect();
    let count = chunks.len() as u8;

    let mut out = Vec::with_capacity(stream.len() + icc.len() + 32 * chunks.len());
    out.extend_from_slice(&stream[..2]);

    for (i, chunk) in chunks.iter().enumerate() {
        let seg_len = (2 + 12 + 2 + chunk.len()) as u16;
        out.extend_from_slice(&[0xFF, 0xE2]);
        out.extend_from_slice(&seg_len.to_be_bytes());
        out.extend_from_slice(b"ICC_PROFILE\0");
        out.push((i + 1) as u8);
        out.push(count);
        out.extend_from_slice(chunk);
    }

    out.extend_from_slice(&stream[2..]);
    out
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_tile(width: u32, height: u32, value: u8) -> RawTile {
        RawTile {
            width,
            height,
            channels: 1,
            bits_per_channel: 8,
            resolution: 0,
            h_sequence: 0,
            v_sequence: 0,
            compression: Compression::Uncompressed,
            data: vec![value; (width * height) as usize],
        }
    }

    fn rgb_tile(width: u32, height: u32) -> RawTile {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push((x * 8) as u8);
                data.push((y * 8) as u8);
                data.push(128);
            }
        }
        RawTile {
            width,
            height,
            channels: 3,
            bits_per_channel: 8,
            resolution: 0,
            h_sequence: 0,
            v_sequence: 0,
            compression: Compression::Uncompressed,
            data,
        }
    }

    #[test]
    fn test_encode_rgb_tile() {
        let encoder = JpegTileEncoder::new();
        let output = encoder.encode(&rgb_tile(32, 32), 80).unwrap();

        // Valid JPEG: SOI at start, EOI at end
        assert_eq!(&output[..2], &[0xFF, 0xD8]);
        assert_eq!(&output[output.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_encode_gray_tile() {
        let encoder = JpegTileEncoder::new();
        let output = encoder.encode(&gray_tile(16, 16, 200), 90).unwrap();
        assert_eq!(&output[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_encode_rejects_sixteen_bit() {
        let encoder = JpegTileEncoder::new();
        let mut tile = gray_tile(8, 8, 0);
        tile.bits_per_channel = 16;
        tile.data = vec![0; 128];
        assert!(encoder.encode(&tile, 80).is_err());
    }

    #[test]
    fn test_encode_rejects_compressed_input() {
        let encoder = JpegTileEncoder::new();
        let mut tile = gray_tile(8, 8, 0);
        tile.compression = Compression::Jpeg;
        assert!(encoder.encode(&tile, 80).is_err());
    }

    #[test]
    fn test_roundtrip_gray() {
        let encoder = JpegTileEncoder::new();
        let source = gray_tile(16, 16, 180);
        let stream = encoder.encode(&source, 95).unwrap();

        let (width, height, pixels) = encoder.decode_gray(&stream).unwrap();
        assert_eq!((width, height), (16, 16));
        assert_eq!(pixels.len(), 256);
        // Flat tiles survive JPEG nearly exactly
        assert!(pixels.iter().all(|&p| (i16::from(p) - 180).abs() <= 2));
    }

    #[test]
    fn test_decode_invalid_stream() {
        let encoder = JpegTileEncoder::new();
        assert!(encoder.decode_gray(&[0x00, 0x01, 0x02]).is_err());
        assert!(encoder.decode_gray(&[]).is_err());
    }

    #[test]
    fn test_icc_embedding() {
        let mut encoder = JpegTileEncoder::new();
        let icc = Bytes::from(vec![0xAB; 100]);
        encoder.set_icc_profile(icc);
        assert!(encoder.has_icc_profile());

        let output = encoder.encode(&gray_tile(8, 8, 50), 80).unwrap();

        // APP2 ICC segment right after SOI
        assert_eq!(&output[..2], &[0xFF, 0xD8]);
        assert_eq!(&output[2..4], &[0xFF, 0xE2]);
        assert_eq!(&output[6..18], b"ICC_PROFILE\0");
        assert_eq!(output[18], 1); // sequence number
        assert_eq!(output[19], 1); // segment count

        // Stream still decodes
        assert!(encoder.decode_gray(&output).is_ok());
    }

    #[test]
    fn test_icc_chunking() {
        let icc = vec![0x42; ICC_SEGMENT_PAYLOAD + 100];
        let stream = vec![0xFF, 0xD8, 0xFF, 0xD9];
        let out = embed_icc_profile(stream, &icc);

        // Two APP2 segments
        assert_eq!(&out[2..4], &[0xFF, 0xE2]);
        let first_len = u16::from_be_bytes([out[4], out[5]]) as usize;
        let second_start = 4 + first_len;
        assert_eq!(&out[second_start..second_start + 2], &[0xFF, 0xE2]);
        assert_eq!(out[second_start + 16], 2); // sequence number of second chunk
    }

    #[test]
    fn test_is_valid_quality() {
        assert!(!is_valid_quality(0));
        assert!(is_valid_quality(1));
        assert!(is_valid_quality(100));
        assert!(!is_valid_quality(101));
    }

    #[test]
    fn test_clamp_quality() {
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(50), 50);
        assert_eq!(clamp_quality(255), 100);
    }
}
