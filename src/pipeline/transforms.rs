//! Pixel transforms used by the per-channel preprocessing pipeline.
//!
//! The float pipeline normalizes native samples into `[0.0, 1.0]`, applies
//! the requested adjustments and clip-converts back to 8 bits. The integer
//! transforms (equalization, binarization, flip, rotation) operate on the
//! 8-bit buffers that come out of it.

use crate::error::BlendError;
use crate::protocol::{Flip, Rotation};
use crate::tile::{Compression, RawTile};

// =============================================================================
// Float pipeline
// =============================================================================

/// Normalize a tile's samples linearly from `[min, max]` to `[0.0, 1.0]`.
///
/// Works on 8- and 16-bit uncompressed single-channel tiles; values outside
/// the range clamp to the interval ends.
pub fn normalize(tile: &RawTile, min: f32, max: f32) -> Result<Vec<f32>, BlendError> {
    if tile.compression != Compression::Uncompressed {
        return Err(BlendError::Decode(
            "normalize requires uncompressed samples".into(),
        ));
    }

    let range = max - min;
    let scale = if range > 0.0 { 1.0 / range } else { 1.0 };

    let values = match tile.bits_per_channel {
        8 => tile
            .data
            .iter()
            .map(|&v| ((f32::from(v) - min) * scale).clamp(0.0, 1.0))
            .collect(),
        16 => tile
            .samples16()
            .map(|v| ((f32::from(v) - min) * scale).clamp(0.0, 1.0))
            .collect(),
        bits => {
            return Err(BlendError::Decode(format!(
                "normalize cannot handle {bits}-bit samples"
            )))
        }
    };

    Ok(values)
}

/// Apply gamma as a direct exponent on normalized values.
pub fn gamma(values: &mut [f32], g: f32) {
    if g == 1.0 {
        return;
    }
    for v in values.iter_mut() {
        *v = v.max(0.0).powf(g);
    }
}

/// Invert normalized values.
pub fn invert(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = 1.0 - *v;
    }
}

/// Apply a contrast scale and clip-convert normalized values to an 8-bit tile.
///
/// The contrast passed here must already be a concrete scale factor; the
/// auto-stretch sentinel is resolved by the caller before the float pipeline
/// runs.
pub fn contrast_to_8bit(values: &[f32], template: &RawTile, contrast: f32) -> RawTile {
    let data = values
        .iter()
        .map(|&v| (v * contrast * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    RawTile {
        width: template.width,
        height: template.height,
        channels: 1,
        bits_per_channel: 8,
        resolution: template.resolution,
        h_sequence: template.h_sequence,
        v_sequence: template.v_sequence,
        compression: Compression::Uncompressed,
        data,
    }
}

// =============================================================================
// Histogram
// =============================================================================

/// Compute a 256-bin histogram of a tile's samples, normalized by the
/// image's `[min, max]` value range.
pub fn histogram(tile: &RawTile, min: f32, max: f32) -> Result<Vec<u32>, BlendError> {
    let normalized = normalize(tile, min, max)?;
    let mut bins = vec![0u32; 256];
    for v in normalized {
        let bin = (v * 255.0).round().clamp(0.0, 255.0) as usize;
        bins[bin] += 1;
    }
    Ok(bins)
}

/// Resolve auto-stretch bounds from the first and last non-empty histogram
/// bins, scaled up to the native bit depth.
///
/// Returns `None` for an empty histogram.
pub fn auto_stretch_bounds(hist: &[u32], bits_per_channel: u8) -> Option<(f32, f32)> {
    let first = hist.iter().position(|&c| c > 0)?;
    let last = hist.iter().rposition(|&c| c > 0)?;

    let shift = bits_per_channel.saturating_sub(8);
    let min = (first as u32) << shift;
    let max = (last as u32) << shift;
    if max <= min {
        return None;
    }
    Some((min as f32, max as f32))
}

/// Derive a binarization threshold from a histogram using Otsu's method.
pub fn threshold(hist: &[u32]) -> u8 {
    let total: u64 = hist.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return 128;
    }

    let sum_all: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * f64::from(c))
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0u64;
    let mut best_variance = -1.0;
    let mut best_threshold = 0u8;

    for (i, &count) in hist.iter().enumerate() {
        weight_background += u64::from(count);
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += i as f64 * f64::from(count);
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_all - sum_background) / weight_foreground as f64;

        let diff = mean_background - mean_foreground;
        let variance = weight_background as f64 * weight_foreground as f64 * diff * diff;

        if variance > best_variance {
            best_variance = variance;
            best_threshold = i as u8;
        }
    }

    best_threshold
}

/// Binarize an 8-bit tile in place: values above the threshold become 255.
pub fn binarize(tile: &mut RawTile, threshold: u8) {
    for v in tile.data.iter_mut() {
        *v = if *v > threshold { 255 } else { 0 };
    }
}

/// Apply histogram equalization to an 8-bit tile in place.
pub fn equalize(tile: &mut RawTile, hist: &[u32]) {
    let total: u64 = hist.iter().map(|&c| u64::from(c)).sum();
    if total == 0 || hist.len() < 256 {
        return;
    }

    // Map each level through the normalized cumulative distribution
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for (i, &count) in hist.iter().take(256).enumerate() {
        cumulative += u64::from(count);
        lut[i] = ((cumulative as f64 / total as f64) * 255.0).round() as u8;
    }

    for v in tile.data.iter_mut() {
        *v = lut[*v as usize];
    }
}

// =============================================================================
// Band reduction and colourspace
// =============================================================================

/// Flatten a 2-channel (gray+alpha) or >3-channel tile to 1 or 3 bands,
/// dropping the extra channels.
pub fn flatten(tile: &mut RawTile, bands: u8) {
    let src_channels = tile.channels as usize;
    let dst_channels = bands as usize;
    if src_channels <= dst_channels {
        return;
    }

    let pixels = tile.pixel_count();
    let mut data = Vec::with_capacity(pixels * dst_channels);
    for p in 0..pixels {
        let base = p * src_channels;
        data.extend_from_slice(&tile.data[base..base + dst_channels]);
    }

    tile.channels = bands;
    tile.data = data;
}

/// Convert a 3-channel 8-bit tile to grayscale in place (Rec. 601 weights).
pub fn greyscale(tile: &mut RawTile) {
    if tile.channels != 3 {
        return;
    }

    let data: Vec<u8> = tile
        .data
        .chunks_exact(3)
        .map(|px| {
            let y = 0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            y.round().clamp(0.0, 255.0) as u8
        })
        .collect();

    tile.channels = 1;
    tile.data = data;
}

// =============================================================================
// Flip and rotation
// =============================================================================

/// Mirror a tile in place.
pub fn flip(tile: &mut RawTile, direction: Flip) {
    let channels = tile.channels as usize;
    let width = tile.width as usize;
    let height = tile.height as usize;
    let row_len = width * channels;

    match direction {
        Flip::None => {}
        Flip::Horizontal => {
            for row in tile.data.chunks_exact_mut(row_len) {
                for x in 0..width / 2 {
                    for c in 0..channels {
                        row.swap(x * channels + c, (width - 1 - x) * channels + c);
                    }
                }
            }
        }
        Flip::Vertical => {
            for y in 0..height / 2 {
                let (top, rest) = tile.data.split_at_mut((height - 1 - y) * row_len);
                top[y * row_len..(y + 1) * row_len].swap_with_slice(&mut rest[..row_len]);
            }
        }
    }
}

/// Rotate a tile by a quarter turn multiple, clockwise.
pub fn rotate(tile: &mut RawTile, rotation: Rotation) {
    if rotation == Rotation::None {
        return;
    }

    let channels = tile.channels as usize;
    let width = tile.width as usize;
    let height = tile.height as usize;

    let mut data = vec![0u8; tile.data.len()];
    for y in 0..height {
        for x in 0..width {
            let src = (y * width + x) * channels;
            let (dx, dy, dw) = match rotation {
                Rotation::Quarter => (height - 1 - y, x, height),
                Rotation::Half => (width - 1 - x, height - 1 - y, width),
                Rotation::ThreeQuarter => (y, width - 1 - x, height),
                Rotation::None => unreachable!(),
            };
            let dst = (dy * dw + dx) * channels;
            data[dst..dst + channels].copy_from_slice(&tile.data[src..src + channels]);
        }
    }

    if rotation != Rotation::Half {
        std::mem::swap(&mut tile.width, &mut tile.height);
    }
    tile.data = data;
}
