//! Per-channel tile and region preprocessing.
//!
//! Runs once per channel and delivers a 1-channel 8-bit uncompressed tile
//! to the blender. The stages, each skipped when it is a no-op:
//!
//! 1. Histogram prefetch (only when a downstream stage needs it)
//! 2. Tile or region fetch; the fetcher always delivers raw samples,
//!    decoding stored JPEG tiles on the way in
//! 3. ICC profile installation on the JPEG encoder
//! 4. Float pipeline: normalize from the channel's `[min, max]`, gamma,
//!    inversion, contrast scale and clip-conversion to 8 bits
//! 5. Band flattening (2 or >3 channels down to 1 or 3); the region path
//!    resizes to the requested output size around this stage
//! 6. Colourspace adjustment (bitonal threshold from the histogram)
//! 7. Histogram equalization
//! 8. Flip, then rotation last

use tracing::{debug, trace};

use crate::blend::BlendSetting;
use crate::channel::ChannelImage;
use crate::error::BlendError;
use crate::io::RangeReader;
use crate::protocol::{Flip, OutputColour, Rotation};
use crate::tile::{JpegTileEncoder, RawTile, TileFetcher};

use super::resample::{resize, Interpolation};
use super::transforms;
use super::view::ViewSpec;

/// Processing knobs from the server configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Interpolation for region resizing
    pub interpolation: Interpolation,

    /// Embed channel ICC profiles into JPEG output
    pub embed_icc: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interpolation: Interpolation::Bilinear,
            embed_icc: false,
        }
    }
}

/// Preprocess one channel's tile for blending.
#[allow(clippy::too_many_arguments)]
pub async fn preprocess_tile<R: RangeReader + 'static>(
    fetcher: &TileFetcher,
    image: &ChannelImage<R>,
    setting: &BlendSetting,
    view: &ViewSpec,
    resolution: u32,
    tile_index: u32,
    encoder: &mut JpegTileEncoder,
    config: &PipelineConfig,
) -> Result<RawTile, BlendError> {
    check_blendable(image)?;
    prefetch_histogram(fetcher, image, view).await?;
    install_icc(image, encoder, config);

    let fetched = fetcher.fetch_tile(image, resolution, tile_index).await?;

    // The cache owns the fetched buffer; all mutation below happens on a copy
    let tile = (*fetched).clone();
    let tile = float_pipeline(tile, image, setting, view).await?;
    finish_tile(tile, image, view).await
}

/// Preprocess one channel's region for blending.
///
/// `left`, `top`, `width`, `height` locate the region in pixels at the
/// requested resolution; `out_width`/`out_height` is the resampled output
/// size.
#[allow(clippy::too_many_arguments)]
pub async fn preprocess_region<R: RangeReader + 'static>(
    fetcher: &TileFetcher,
    image: &ChannelImage<R>,
    setting: &BlendSetting,
    view: &ViewSpec,
    resolution: u32,
    region: (u32, u32, u32, u32),
    out_size: (u32, u32),
    encoder: &mut JpegTileEncoder,
    config: &PipelineConfig,
) -> Result<RawTile, BlendError> {
    check_blendable(image)?;
    prefetch_histogram(fetcher, image, view).await?;
    install_icc(image, encoder, config);

    let (left, top, width, height) = region;
    let fetched = fetcher
        .fetch_region(image, resolution, left, top, width, height)
        .await?;

    let tile = float_pipeline(fetched, image, setting, view).await?;

    // Resample to the requested output size
    let (out_width, out_height) = out_size;
    let tile = if out_width != tile.width || out_height != tile.height {
        trace!(
            from_width = tile.width,
            from_height = tile.height,
            out_width,
            out_height,
            "resampling region"
        );
        resize(&tile, out_width, out_height, config.interpolation)
    } else {
        tile
    };

    finish_tile(tile, image, view).await
}

/// Reject images the blender cannot consume.
fn check_blendable<R: RangeReader + 'static>(image: &ChannelImage<R>) -> Result<(), BlendError> {
    if !image.is_blendable() {
        return Err(BlendError::UnsupportedImage {
            path: image.path().to_string(),
        });
    }
    Ok(())
}

/// Compute and memoize the channel histogram if a downstream stage needs it.
///
/// The histogram is computed from the smallest pyramid tile, which is
/// enough for thresholding and equalization, and shared through the image
/// cache with every other request for the same channel.
async fn prefetch_histogram<R: RangeReader + 'static>(
    fetcher: &TileFetcher,
    image: &ChannelImage<R>,
    view: &ViewSpec,
) -> Result<(), BlendError> {
    if !view.require_histogram() || !image.histogram().await.is_empty() {
        return Ok(());
    }

    debug!(path = image.path(), "computing channel histogram");
    let thumbnail = fetcher.fetch_tile(image, 0, 0).await?;
    let histogram = transforms::histogram(&thumbnail, image.min_value(), image.max_value())?;
    image.set_histogram(histogram).await;
    Ok(())
}

/// Install the channel's ICC profile on the JPEG encoder when configured.
fn install_icc<R: RangeReader + 'static>(
    image: &ChannelImage<R>,
    encoder: &mut JpegTileEncoder,
    config: &PipelineConfig,
) {
    if config.embed_icc {
        if let Some(icc) = image.icc_profile() {
            debug!(
                path = image.path(),
                bytes = icc.len(),
                "embedding ICC profile"
            );
            encoder.set_icc_profile(icc.clone());
        }
    }
}

/// Normalize, adjust and clip-convert to 8 bits.
async fn float_pipeline<R: RangeReader + 'static>(
    tile: RawTile,
    image: &ChannelImage<R>,
    setting: &BlendSetting,
    view: &ViewSpec,
) -> Result<RawTile, BlendError> {
    if tile.bits_per_channel < 8 && !view.float_processing() {
        return Ok(tile);
    }

    // Auto-stretch resolves the bounds from the histogram; the contrast
    // entering the pipeline is always a concrete scale factor
    let (min, max, contrast) = if view.contrast == -1.0 {
        let hist = image.histogram().await;
        match transforms::auto_stretch_bounds(&hist, image.bits_per_channel()) {
            Some((min, max)) => (min, max, 1.0),
            None => (setting.min as f32, setting.max as f32, 1.0),
        }
    } else {
        (setting.min as f32, setting.max as f32, view.contrast)
    };

    trace!(min, max, contrast, "normalizing channel tile");
    let mut values = transforms::normalize(&tile, min, max)?;

    if view.gamma != 1.0 {
        transforms::gamma(&mut values, view.gamma);
    }
    if view.inverted {
        transforms::invert(&mut values);
    }

    Ok(transforms::contrast_to_8bit(&values, &tile, contrast))
}

/// Band reduction, colourspace adjustment, equalization, flip and rotation.
async fn finish_tile<R: RangeReader + 'static>(
    mut tile: RawTile,
    image: &ChannelImage<R>,
    view: &ViewSpec,
) -> Result<RawTile, BlendError> {
    // Reduce to 1 or 3 bands if an alpha channel or extra bands survived;
    // in blending mode only 1-channel tiles reach this point
    if tile.channels == 2 || tile.channels > 3 {
        let bands = if tile.channels == 2 { 1 } else { 3 };
        transforms::flatten(&mut tile, bands);
    }

    // Grayscale conversion applies only to tiles that are still RGB
    if tile.channels == 3 && view.colourspace == OutputColour::Grey {
        transforms::greyscale(&mut tile);
    }

    if view.colourspace == OutputColour::Binary {
        let hist = image.histogram().await;
        let threshold = transforms::threshold(&hist);
        trace!(threshold, "binarizing channel tile");
        transforms::binarize(&mut tile, threshold);
    }

    if view.equalization {
        let hist = image.histogram().await;
        transforms::equalize(&mut tile, &hist);
    }

    if view.flip != Flip::None {
        transforms::flip(&mut tile, view.flip);
    }

    // Rotation comes last, after all value adjustments
    if view.rotation != Rotation::None {
        transforms::rotate(&mut tile, view.rotation);
    }

    Ok(tile)
}
