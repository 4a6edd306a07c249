//! Zoomify-style request parsing.
//!
//! The parameter string (everything before the blend JSON) has the shape
//!
//! ```text
//! <base_path>[.<ext>]/TileGroup<g>/<r>-<x>-<y>.jpg
//! <base_path>[.<ext>]/ImageProperties.xml
//! ```
//!
//! The base path is everything before `/TileGroup`; a trailing extension is
//! split off and reused for the per-channel filenames. The tile group
//! number is ignored: it is recomputable from the coordinates.

use crate::error::ProtocolError;

/// A parsed Zoomify-style request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomifyRequest {
    /// Filename stem before the channel suffix, e.g. `/foo/bar`
    pub base_path: String,

    /// File extension stripped from the base path, e.g. `tif`
    pub ext: Option<String>,

    /// What the request asks for
    pub kind: ZoomifyKind,
}

/// The two phases of a Zoomify client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoomifyKind {
    /// `ImageProperties.xml` initialization request
    Properties,

    /// A tile request at `<r>-<x>-<y>.jpg`
    Tile { resolution: u32, x: u32, y: u32 },
}

/// Parse the Zoomify parameter string.
pub fn parse_zoomify(params: &str) -> Result<ZoomifyRequest, ProtocolError> {
    let suffix = params.rsplit('/').next().unwrap_or(params);

    if suffix == "ImageProperties.xml" {
        let base = params
            .strip_suffix("/ImageProperties.xml")
            .unwrap_or("")
            .to_string();
        let (base_path, ext) = split_extension(&base);
        return Ok(ZoomifyRequest {
            base_path,
            ext,
            kind: ZoomifyKind::Properties,
        });
    }

    // Tile request: the base path is everything before "/TileGroup"
    let group_pos = params
        .find("/TileGroup")
        .ok_or_else(|| ProtocolError::InvalidTile(format!("no TileGroup in \"{params}\"")))?;
    let (base_path, ext) = split_extension(&params[..group_pos]);

    let (resolution, x, y) = parse_tile_suffix(suffix)?;

    Ok(ZoomifyRequest {
        base_path,
        ext,
        kind: ZoomifyKind::Tile { resolution, x, y },
    })
}

/// Split a trailing `.<ext>` off a path, if present.
fn split_extension(path: &str) -> (String, Option<String>) {
    match path.rsplit_once('.') {
        // A dot inside the last path segment marks an extension
        Some((stem, ext)) if !ext.contains('/') && !stem.is_empty() => {
            (stem.to_string(), Some(ext.to_string()))
        }
        _ => (path.to_string(), None),
    }
}

/// Parse `<r>-<x>-<y>.jpg` by `-` tokenization.
fn parse_tile_suffix(suffix: &str) -> Result<(u32, u32, u32), ProtocolError> {
    let name = suffix.strip_suffix(".jpg").unwrap_or(suffix);
    let mut tokens = name.split('-');

    let mut next = |what: &str| -> Result<u32, ProtocolError> {
        tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ProtocolError::InvalidTile(format!("bad {what} in \"{suffix}\"")))
    };

    let resolution = next("resolution")?;
    let x = next("x")?;
    let y = next("y")?;
    Ok((resolution, x, y))
}
