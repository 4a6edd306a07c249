//! Format parsing for channel image files.
//!
//! Channel images are grayscale tiled-TIFF pyramids; [`tiff`] holds the
//! directory parser and per-level tile access. [`is_tiff_signature`] is a
//! cheap pre-check used before attempting a full parse.

pub mod tiff;

pub use tiff::{ByteOrder, PyramidLevel, TiffCompression, TiffHeader, TiffPyramid};

/// Check whether a byte slice starts with a TIFF signature (II*\0 or MM\0*).
pub fn is_tiff_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    matches!(
        (bytes[0], bytes[1], bytes[2], bytes[3]),
        (0x49, 0x49, 0x2A, 0x00) | (0x4D, 0x4D, 0x00, 0x2A)
    )
}
