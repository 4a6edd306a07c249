//! Resampling for the region path.
//!
//! When a requested output size differs from the extracted region size, the
//! region is resized with nearest-neighbour or bilinear interpolation as
//! configured; bilinear is the default.

use crate::tile::{Compression, RawTile};

/// Interpolation method for region resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

impl Interpolation {
    /// Parse a configuration token.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nearest" => Some(Interpolation::Nearest),
            "bilinear" => Some(Interpolation::Bilinear),
            _ => None,
        }
    }
}

/// Resize an uncompressed 8-bit tile to the given dimensions.
pub fn resize(tile: &RawTile, width: u32, height: u32, method: Interpolation) -> RawTile {
    if width == tile.width && height == tile.height {
        return tile.clone();
    }
    match method {
        Interpolation::Nearest => resize_nearest(tile, width, height),
        Interpolation::Bilinear => resize_bilinear(tile, width, height),
    }
}

/// Nearest-neighbour resize.
fn resize_nearest(tile: &RawTile, width: u32, height: u32) -> RawTile {
    let channels = tile.channels as usize;
    let x_ratio = tile.width as f32 / width as f32;
    let y_ratio = tile.height as f32 / height as f32;

    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        let sy = ((y as f32 * y_ratio) as u32).min(tile.height - 1) as usize;
        for x in 0..width {
            let sx = ((x as f32 * x_ratio) as u32).min(tile.width - 1) as usize;
            let src = (sy * tile.width as usize + sx) * channels;
            data.extend_from_slice(&tile.data[src..src + channels]);
        }
    }

    resized(tile, width, height, data)
}

/// Bilinear resize.
fn resize_bilinear(tile: &RawTile, width: u32, height: u32) -> RawTile {
    let channels = tile.channels as usize;
    let src_w = tile.width as usize;
    let src_h = tile.height as usize;

    // Sample positions map output pixel centers into the source grid
    let x_ratio = if width > 1 {
        (src_w - 1) as f32 / (width - 1) as f32
    } else {
        0.0
    };
    let y_ratio = if height > 1 {
        (src_h - 1) as f32 / (height - 1) as f32
    } else {
        0.0
    };

    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        let fy = y as f32 * y_ratio;
        let y0 = fy.floor() as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let dy = fy - y0 as f32;

        for x in 0..width {
            let fx = x as f32 * x_ratio;
            let x0 = fx.floor() as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let dx = fx - x0 as f32;

            for c in 0..channels {
                let p00 = f32::from(tile.data[(y0 * src_w + x0) * channels + c]);
                let p10 = f32::from(tile.data[(y0 * src_w + x1) * channels + c]);
                let p01 = f32::from(tile.data[(y1 * src_w + x0) * channels + c]);
                let p11 = f32::from(tile.data[(y1 * src_w + x1) * channels + c]);

                let top = p00 + (p10 - p00) * dx;
                let bottom = p01 + (p11 - p01) * dx;
                let value = top + (bottom - top) * dy;
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
    }

    resized(tile, width, height, data)
}

fn resized(tile: &RawTile, width: u32, height: u32, data: Vec<u8>) -> RawTile {
    RawTile {
        width,
        height,
        channels: tile.channels,
        bits_per_channel: 8,
        resolution: tile.resolution,
        h_sequence: tile.h_sequence,
        v_sequence: tile.v_sequence,
        compression: Compression::Uncompressed,
        data,
    }
}
