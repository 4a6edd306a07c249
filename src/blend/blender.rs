//! Folding preprocessed channel tiles into one RGB tile.
//!
//! Every input tile is 1-channel 8-bit uncompressed with identical
//! dimensions; the blender walks the channels in settings order and
//! accumulates each channel's tinted contribution into a zero-initialized
//! RGB tile, clipping to `0..=255` after every addition. The clip order is
//! observable: contributions beyond saturation are discarded per channel,
//! so the channel order from the blend specification must be preserved.

use tracing::trace;

use crate::error::BlendError;
use crate::tile::{Compression, RawTile};

use super::settings::BlendSetting;

/// Blend preprocessed channel tiles into a 3-channel 8-bit tile.
///
/// # Errors
///
/// Fails if the tile and settings lists diverge in length, or if any input
/// is not an uncompressed 1-channel 8-bit tile matching the first tile's
/// dimensions.
pub fn blend_tiles(tiles: &[RawTile], settings: &[BlendSetting]) -> Result<RawTile, BlendError> {
    if tiles.len() != settings.len() {
        return Err(BlendError::ChannelCountMismatch {
            settings: settings.len(),
            channels: tiles.len(),
        });
    }
    let first = tiles.first().ok_or(BlendError::ChannelCountMismatch {
        settings: settings.len(),
        channels: 0,
    })?;

    let mut blended = RawTile::zeroed(
        first.width,
        first.height,
        3,
        8,
        first.resolution,
        first.h_sequence,
        first.v_sequence,
    );

    for (tile, setting) in tiles.iter().zip(settings) {
        if tile.compression != Compression::Uncompressed {
            return Err(BlendError::UnexpectedCompression {
                channel: setting.channel_index,
            });
        }
        if tile.channels != 1
            || tile.bits_per_channel != 8
            || tile.width != first.width
            || tile.height != first.height
        {
            return Err(BlendError::ChannelCountMismatch {
                settings: settings.len(),
                channels: tiles.len(),
            });
        }

        trace!(
            channel = setting.channel_index,
            tint = %setting.tint.to_hex(),
            "accumulating channel"
        );
        accumulate(&mut blended, tile, setting);
    }

    Ok(blended)
}

/// Add one tinted channel into the output, saturating per pixel.
fn accumulate(out: &mut RawTile, tile: &RawTile, setting: &BlendSetting) {
    let tint = setting.tint;
    let (r, g, b) = (f32::from(tint.r), f32::from(tint.g), f32::from(tint.b));

    for (dst, &gray) in out.data.chunks_exact_mut(3).zip(&tile.data) {
        let weight = f32::from(gray) / 255.0;
        dst[0] = clip_add(dst[0], r * weight);
        dst[1] = clip_add(dst[1], g * weight);
        dst[2] = clip_add(dst[2], b * weight);
    }
}

/// `clip_to_u8(current + addition)` with round-to-nearest.
#[inline]
fn clip_add(current: u8, addition: f32) -> u8 {
    (f32::from(current) + addition).round().clamp(0.0, 255.0) as u8
}
