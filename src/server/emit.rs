//! Response emission: informational documents and tile response framing.
//!
//! Builds the IIIF `info.json` and Zoomify `ImageProperties.xml` documents
//! and frames JPEG tile responses with the headers the viewers expect
//! (`Server`, `X-Powered-By`, `Last-Modified`, cache control, CORS).

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use bytes::Bytes;

// IIIF Image API 2 identifiers
const IIIF_CONTEXT: &str = "http://iiif.io/api/image/2/context.json";
const IIIF_PROTOCOL: &str = "http://iiif.io/api/image";
const IIIF_PROFILE: &str = "http://iiif.io/api/image/2/level1.json";

/// Server identification for the `Server` header.
fn server_header() -> String {
    format!("blend-streamer/{}", env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// Informational documents
// =============================================================================

/// Geometry of the reference channel, flattened for document emission.
#[derive(Debug, Clone)]
pub struct ImageGeometry {
    /// Full-resolution width
    pub width: u32,

    /// Full-resolution height
    pub height: u32,

    /// Tile width
    pub tile_width: u32,

    /// Tile height
    pub tile_height: u32,

    /// Per-level dimensions, largest first (pyramid order)
    pub level_dims: Vec<(u32, u32)>,
}

impl ImageGeometry {
    /// Number of pyramid resolutions.
    pub fn num_resolutions(&self) -> usize {
        self.level_dims.len()
    }
}

/// Build the Zoomify `ImageProperties.xml` one-liner.
///
/// `NUMTILES` counts tiles at the full resolution.
pub fn image_properties_xml(geometry: &ImageGeometry) -> String {
    let ntiles = geometry.width.div_ceil(geometry.tile_width)
        * geometry.height.div_ceil(geometry.tile_width);
    format!(
        "<IMAGE_PROPERTIES WIDTH=\"{}\" HEIGHT=\"{}\" NUMTILES=\"{}\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"{}\" />",
        geometry.width, geometry.height, ntiles, geometry.tile_width
    )
}

/// Build the IIIF `info.json` document.
///
/// `sizes` advertises the smallest pyramid level plus every intermediate
/// level below `max_size` (0 = unrestricted); the full resolution is
/// implied by `width`/`height`. `scaleFactors` double per level.
pub fn info_json(id: &str, geometry: &ImageGeometry, max_size: u32) -> String {
    let n = geometry.num_resolutions();

    let mut sizes = Vec::new();
    if let Some(&(w, h)) = geometry.level_dims.last() {
        sizes.push(serde_json::json!({ "width": w, "height": h }));
    }
    // Intermediate levels, ascending, excluding smallest and full
    for i in (1..n.saturating_sub(1)).rev() {
        let (w, h) = geometry.level_dims[i];
        if max_size == 0 || (w < max_size && h < max_size) {
            sizes.push(serde_json::json!({ "width": w, "height": h }));
        }
    }

    let scale_factors: Vec<u32> = (0..n as u32).map(|i| 1 << i).collect();

    let document = serde_json::json!({
        "@context": IIIF_CONTEXT,
        "@id": id,
        "protocol": IIIF_PROTOCOL,
        "width": geometry.width,
        "height": geometry.height,
        "sizes": sizes,
        "tiles": [
            {
                "width": geometry.tile_width,
                "height": geometry.tile_height,
                "scaleFactors": scale_factors,
            }
        ],
        "profile": [
            IIIF_PROFILE,
            {
                "formats": ["jpg"],
                "qualities": ["native", "color", "gray", "bitonal"],
                "supports": [
                    "regionByPct", "regionSquare", "sizeByForcedWh", "sizeByWh",
                    "sizeAboveFull", "rotationBy90s", "mirroring"
                ],
                "maxWidth": max_size,
                "maxHeight": max_size,
            }
        ],
    });

    serde_json::to_string_pretty(&document).unwrap_or_else(|_| "{}".to_string())
}

// =============================================================================
// Response framing
// =============================================================================

/// Frame a JPEG tile response.
pub fn jpeg_response(
    data: Bytes,
    last_modified: &str,
    cache_max_age: u32,
    cors_origin: Option<&str>,
) -> Response<Body> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::SERVER, server_header())
        .header("X-Powered-By", "IIPImage")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::LAST_MODIFIED, last_modified)
        .header(
            header::CACHE_CONTROL,
            format!("max-age={cache_max_age}, public"),
        );
    if let Some(origin) = cors_origin {
        builder = builder.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    builder.body(Body::from(data)).unwrap()
}

/// Frame an informational document response.
pub fn document_response(
    body: String,
    content_type: &str,
    last_modified: &str,
    cache_max_age: u32,
    cors_origin: Option<&str>,
) -> Response<Body> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::SERVER, server_header())
        .header(header::CONTENT_TYPE, content_type)
        .header(header::LAST_MODIFIED, last_modified)
        .header(
            header::CACHE_CONTROL,
            format!("max-age={cache_max_age}, public"),
        );
    if let Some(origin) = cors_origin {
        builder = builder.header(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Frame a 303 See Other redirect to `location`.
pub fn see_other(location: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header(header::LOCATION, location)
        .header(header::SERVER, server_header())
        .body(Body::empty())
        .unwrap()
}
