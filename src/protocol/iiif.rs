//! IIIF-style request parsing.
//!
//! The parameter string (everything before the blend JSON) has the shape
//!
//! ```text
//! <identifier>/<region>/<size>/<rotation>/<quality>.<format>
//! <identifier>/info.json
//! ```
//!
//! e.g. `/data/img.tif/full/max/0/native.jpg`. The identifier must be a
//! path ending in `.tif`; the stem before `.tif` derives the per-channel
//! filenames.

use crate::error::ProtocolError;

use super::{Flip, OutputColour, Rotation};

/// A parsed IIIF-style request.
#[derive(Debug, Clone, PartialEq)]
pub struct IiifRequest {
    /// Full identifier path, including the `.tif` extension
    pub identifier: String,

    /// Identifier stem before `.tif`, base of the per-channel filenames
    pub base_path: String,

    /// What the request asks for
    pub kind: IiifKind,
}

/// The two phases of an IIIF client.
#[derive(Debug, Clone, PartialEq)]
pub enum IiifKind {
    /// `info.json` initialization request
    Info,

    /// An image request with the four IIIF parameters
    Image(ImageParams),
}

/// The four parsed IIIF image parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams {
    pub region: Region,
    pub size: SizeParam,
    pub rotation: Rotation,
    pub flip: Flip,
    pub quality: OutputColour,
}

/// IIIF region parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// The whole image
    Full,
    /// Centered square crop
    Square,
    /// Rectangle in image pixels
    Pixels { x: f32, y: f32, w: f32, h: f32 },
    /// Rectangle in percent of the image
    Percent { x: f32, y: f32, w: f32, h: f32 },
}

/// IIIF size parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SizeParam {
    /// `full` or `max`: the region at its native size
    Max,
    /// `pct:n`: scale the region by n percent
    Percent(f32),
    /// `w,`: width, height follows the aspect
    Width(u32),
    /// `,h`: height, width follows the aspect
    Height(u32),
    /// `w,h`: exact size, aspect broken
    Exact { w: u32, h: u32 },
    /// `!w,h`: fit within, aspect kept
    FitWithin { w: u32, h: u32 },
}

/// Parse the IIIF parameter string.
///
/// The caller handles the no-slash redirect case before calling; a string
/// without enough parameters fails here.
pub fn parse_iiif(params: &str) -> Result<IiifRequest, ProtocolError> {
    let segments: Vec<&str> = params.split('/').collect();
    let last = *segments.last().unwrap_or(&"");

    // info.json: the identifier is everything before the last segment
    if last.starts_with("info") {
        let identifier = params
            .strip_suffix(last)
            .unwrap_or(params)
            .trim_end_matches('/')
            .to_string();
        let base_path = identifier_base(&identifier)?;
        return Ok(IiifRequest {
            identifier,
            base_path,
            kind: IiifKind::Info,
        });
    }

    // Image request: the last four segments are the IIIF parameters
    if segments.len() < 5 {
        return Err(ProtocolError::TooFewParameters);
    }
    let identifier = segments[..segments.len() - 4].join("/");
    if !identifier.ends_with(".tif") {
        // A .tif deeper in the path means extra parameters after it
        if identifier.contains(".tif/") {
            return Err(ProtocolError::TooManyParameters);
        }
        return Err(ProtocolError::InvalidIdentifier(identifier));
    }
    let base_path = identifier_base(&identifier)?;

    let region = parse_region(segments[segments.len() - 4])?;
    let size = parse_size(segments[segments.len() - 3])?;
    let (rotation, flip) = parse_rotation(segments[segments.len() - 2])?;
    let quality = parse_quality_format(segments[segments.len() - 1])?;

    Ok(IiifRequest {
        identifier,
        base_path,
        kind: IiifKind::Image(ImageParams {
            region,
            size,
            rotation,
            flip,
            quality,
        }),
    })
}

/// Strip the mandatory `.tif` extension off the identifier.
fn identifier_base(identifier: &str) -> Result<String, ProtocolError> {
    identifier
        .strip_suffix(".tif")
        .map(str::to_string)
        .ok_or_else(|| ProtocolError::InvalidIdentifier(identifier.to_string()))
}

/// Region parameter: `full`, `square`, `x,y,w,h` or `pct:x,y,w,h`.
fn parse_region(token: &str) -> Result<Region, ProtocolError> {
    let lower = token.to_ascii_lowercase();

    if lower == "full" {
        return Ok(Region::Full);
    }
    if lower == "square" {
        return Ok(Region::Square);
    }

    let (is_pct, rect) = match lower.strip_prefix("pct:") {
        Some(rest) => (true, rest),
        None => (false, lower.as_str()),
    };

    let values: Vec<f32> = rect
        .split(',')
        .map(|t| t.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| ProtocolError::InvalidRegion(token.to_string()))?;

    if values.len() != 4 {
        return Err(ProtocolError::InvalidRegion(token.to_string()));
    }
    let (x, y, w, h) = (values[0], values[1], values[2], values[3]);
    if w <= 0.0 || h <= 0.0 {
        return Err(ProtocolError::InvalidRegion(token.to_string()));
    }

    Ok(if is_pct {
        Region::Percent { x, y, w, h }
    } else {
        Region::Pixels { x, y, w, h }
    })
}

/// Size parameter: `full|max`, `w,`, `,h`, `w,h`, `!w,h` or `pct:n`.
fn parse_size(token: &str) -> Result<SizeParam, ProtocolError> {
    let lower = token.to_ascii_lowercase();

    if lower == "full" || lower == "max" {
        return Ok(SizeParam::Max);
    }

    if let Some(pct) = lower.strip_prefix("pct:") {
        let scale: f32 = pct
            .parse()
            .map_err(|_| ProtocolError::InvalidSize(token.to_string()))?;
        return Ok(SizeParam::Percent(scale));
    }

    let (fit_within, dims) = match lower.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, lower.as_str()),
    };

    let Some(comma) = dims.find(',') else {
        return Err(ProtocolError::InvalidSize(format!("{token}: no comma found")));
    };
    let w_str = &dims[..comma];
    let h_str = &dims[comma + 1..];

    let parse_dim = |s: &str| -> Result<u32, ProtocolError> {
        s.parse()
            .map_err(|_| ProtocolError::InvalidSize(token.to_string()))
    };

    match (w_str.is_empty(), h_str.is_empty()) {
        (true, true) => Err(ProtocolError::InvalidSize(token.to_string())),
        (true, false) => Ok(SizeParam::Height(parse_dim(h_str)?)),
        (false, true) => Ok(SizeParam::Width(parse_dim(w_str)?)),
        (false, false) => {
            let w = parse_dim(w_str)?;
            let h = parse_dim(h_str)?;
            Ok(if fit_within {
                SizeParam::FitWithin { w, h }
            } else {
                SizeParam::Exact { w, h }
            })
        }
    }
}

/// Rotation parameter: `0|90|180|270|360`, optionally `!`-prefixed for a
/// horizontal flip. `!180` folds into a vertical flip; `360` is a full turn.
fn parse_rotation(token: &str) -> Result<(Rotation, Flip), ProtocolError> {
    let (mirrored, angle_str) = match token.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let angle: f32 = angle_str
        .parse()
        .map_err(|_| ProtocolError::InvalidRotation(token.to_string()))?;
    if angle.fract() != 0.0 || angle < 0.0 {
        return Err(ProtocolError::InvalidRotation(token.to_string()));
    }

    let rotation = Rotation::from_degrees(angle as u32)
        .ok_or_else(|| ProtocolError::InvalidRotation(token.to_string()))?;

    // A mirrored half turn is the same as a vertical flip
    if mirrored && rotation == Rotation::Half {
        return Ok((Rotation::None, Flip::Vertical));
    }
    let flip = if mirrored { Flip::Horizontal } else { Flip::None };
    Ok((rotation, flip))
}

/// Quality and format: `<quality>[.<format>]`; only JPEG output exists.
fn parse_quality_format(token: &str) -> Result<OutputColour, ProtocolError> {
    let lower = token.to_ascii_lowercase();

    let (quality, format) = match lower.rsplit_once('.') {
        Some((q, f)) => (q, f),
        None => (lower.as_str(), "jpg"),
    };

    if format != "jpg" {
        return Err(ProtocolError::UnsupportedOutputFormat(format.to_string()));
    }

    match quality {
        "native" | "color" | "default" => Ok(OutputColour::Color),
        "grey" | "gray" => Ok(OutputColour::Grey),
        "bitonal" => Ok(OutputColour::Binary),
        other => Err(ProtocolError::UnsupportedQuality(other.to_string())),
    }
}
