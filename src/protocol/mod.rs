//! Request parsing for the two supported URL dialects.
//!
//! Both dialects end with either a metadata-document name or a tile/image
//! specification, followed by `&` and the JSON blend specification. The
//! shared model here covers everything the pipeline needs to know about a
//! request; [`zoomify`] and [`iiif`] turn the raw argument strings into it.

pub mod iiif;
pub mod url;
pub mod zoomify;

pub use iiif::{parse_iiif, IiifKind, IiifRequest, ImageParams, Region, SizeParam};
pub use zoomify::{parse_zoomify, ZoomifyKind, ZoomifyRequest};

use crate::error::BlendSpecError;

/// Rotation of the output, restricted to quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    /// Rotation angle in degrees.
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }

    /// Parse an angle in degrees; 360 canonicalizes to no rotation.
    pub fn from_degrees(angle: u32) -> Option<Self> {
        match angle {
            0 | 360 => Some(Rotation::None),
            90 => Some(Rotation::Quarter),
            180 => Some(Rotation::Half),
            270 => Some(Rotation::ThreeQuarter),
            _ => None,
        }
    }
}

/// Mirroring of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flip {
    #[default]
    None,
    Horizontal,
    Vertical,
}

/// Requested output colourspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputColour {
    /// Full colour (native/color/default quality)
    #[default]
    Color,
    /// Grayscale conversion requested
    Grey,
    /// Bi-level output with a histogram-derived threshold
    Binary,
}

/// Split a request argument into the protocol parameters and the blend JSON.
///
/// The blend specification is everything after the first `&`. A missing
/// separator is the "no blend specification" wire error.
pub fn split_blend_argument(argument: &str) -> Result<(&str, &str), BlendSpecError> {
    match argument.split_once('&') {
        Some((params, json)) => Ok((params, json)),
        None => Err(BlendSpecError::Missing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_blend_argument() {
        let (params, json) = split_blend_argument("/img.tif/full/max/0/native.jpg&{\"0\":{}}").unwrap();
        assert_eq!(params, "/img.tif/full/max/0/native.jpg");
        assert_eq!(json, "{\"0\":{}}");
    }

    #[test]
    fn test_split_uses_first_ampersand() {
        let (params, json) = split_blend_argument("a&b&c").unwrap();
        assert_eq!(params, "a");
        assert_eq!(json, "b&c");
    }

    #[test]
    fn test_split_missing_separator() {
        let err = split_blend_argument("/img.tif/info.json").unwrap_err();
        assert_eq!(err.code(), "2 0");
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(360), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Quarter));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Half));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::ThreeQuarter));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::Half.degrees(), 180);
        assert_eq!(Rotation::None.degrees(), 0);
    }
}
