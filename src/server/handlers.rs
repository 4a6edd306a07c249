//! HTTP request handlers for the two blend routes.
//!
//! # Endpoints
//!
//! - `GET /zoomify/<base>[.<ext>]/TileGroup<g>/<r>-<x>-<y>.jpg&<json>`
//! - `GET /zoomify/<base>[.<ext>]/ImageProperties.xml&<json>`
//! - `GET /iiif/<id>.tif/<region>/<size>/<rotation>/<quality>.<format>&<json>`
//! - `GET /iiif/<id>.tif/info.json&<json>`
//! - `GET /health`
//!
//! The argument after the route prefix is percent-decoded once and split at
//! the first `&` into protocol parameters and the JSON blend specification.
//! Parse and load errors abort before any body bytes are written; the
//! blend-spec failures carry their two-digit wire codes in the error body.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Response, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::blend::{parse_blend_settings, BlendService, BlendSetting};
use crate::channel::{ChannelImage, ChannelSource};
use crate::error::{BlendError, BlendSpecError, FormatError, IoError};
use crate::io::RangeReader;
use crate::pipeline::ViewSpec;
use crate::protocol::{
    parse_iiif, parse_zoomify, split_blend_argument, url, IiifKind, ZoomifyKind,
};

use super::emit::{
    document_response, image_properties_xml, info_json, jpeg_response, see_other, ImageGeometry,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state handed to every handler.
pub struct AppState<S: ChannelSource> {
    /// The blending service
    pub service: Arc<BlendService<S>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// CORS origin for the Access-Control-Allow-Origin header, if any
    pub cors_origin: Option<String>,

    /// Maximum output dimension (0 = unrestricted)
    pub max_size: u32,

    /// Allow scaling beyond the native resolution
    pub allow_upscaling: bool,

    /// Auto contrast-stretch from the channel histogram
    pub auto_contrast: bool,
}

impl<S: ChannelSource> AppState<S> {
    /// Create state around a service with default policies.
    pub fn new(service: BlendService<S>) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age: 3600,
            cors_origin: None,
            max_size: 0,
            allow_upscaling: false,
            auto_contrast: false,
        }
    }

    /// A view preloaded with the server-side policies.
    fn base_view<R: RangeReader + 'static>(&self, reference: &ChannelImage<R>) -> ViewSpec {
        let mut view = ViewSpec::new(reference.width(), reference.height());
        view.max_size = self.max_size;
        view.allow_upscaling = self.allow_upscaling;
        if self.auto_contrast {
            view.contrast = -1.0;
        }
        view
    }
}

impl<S: ChannelSource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            cache_max_age: self.cache_max_age,
            cors_origin: self.cors_origin.clone(),
            max_size: self.max_size,
            allow_upscaling: self.allow_upscaling,
            auto_contrast: self.auto_contrast,
        }
    }
}

// =============================================================================
// Error mapping
// =============================================================================

/// JSON error body for all failure responses.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,

    /// Two-digit wire code for blend-specification failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Human-readable message
    pub message: String,
}

/// Wrapper turning pipeline errors into HTTP responses.
pub struct BlendHandlerError(pub BlendError);

impl From<BlendError> for BlendHandlerError {
    fn from(err: BlendError) -> Self {
        Self(err)
    }
}

impl From<BlendSpecError> for BlendHandlerError {
    fn from(err: BlendSpecError) -> Self {
        Self(BlendError::Spec(err))
    }
}

impl IntoResponse for BlendHandlerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, code) = match &self.0 {
            BlendError::Spec(spec) => (
                StatusCode::BAD_REQUEST,
                "invalid_blend_spec",
                Some(spec.code().to_string()),
            ),
            BlendError::Protocol(_) => (StatusCode::BAD_REQUEST, "invalid_request", None),
            BlendError::Format(FormatError::Io(IoError::NotFound(_)))
            | BlendError::Io(IoError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not_found", None)
            }
            BlendError::Format(_) | BlendError::UnsupportedImage { .. } => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                None,
            ),
            BlendError::InvalidResolution { .. } | BlendError::TileOutOfRange { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_tile", None)
            }
            BlendError::UnsupportedRegion => {
                (StatusCode::NOT_IMPLEMENTED, "unsupported_region", None)
            }
            // The production handlers report a settings/channels mismatch
            // as a blend-specification failure
            BlendError::ChannelCountMismatch { .. } => (
                StatusCode::BAD_REQUEST,
                "invalid_blend_spec",
                Some("2 1".to_string()),
            ),
            BlendError::Io(_)
            | BlendError::UnexpectedCompression { .. }
            | BlendError::Encode(_)
            | BlendError::Decode(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let message = self.0.to_string();
        if status.is_server_error() {
            error!(error_type, status = status.as_u16(), "server error: {message}");
        } else if status == StatusCode::NOT_FOUND {
            debug!(error_type, status = status.as_u16(), "not found: {message}");
        } else {
            warn!(error_type, status = status.as_u16(), "client error: {message}");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            code,
            message,
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Zoomify route
// =============================================================================

/// Handle a Zoomify-style blend request.
pub async fn zoomify_blend_handler<S: ChannelSource + 'static>(
    State(state): State<AppState<S>>,
    uri: Uri,
) -> Result<Response<Body>, BlendHandlerError> {
    let argument = route_argument(&uri, "/zoomify");
    debug!(%argument, "zoomify blend request");

    let (params, json) = split_blend_argument(&argument)?;
    let settings = parse_settings(json)?;
    let request = parse_zoomify(params).map_err(BlendError::from)?;

    let channels = state
        .service
        .open_channels(&request.base_path, request.ext.as_deref(), &settings)
        .await?;
    let reference = &channels[0];
    let geometry = geometry_of(reference);

    match request.kind {
        ZoomifyKind::Properties => Ok(document_response(
            image_properties_xml(&geometry),
            "application/xml",
            reference.timestamp(),
            state.cache_max_age,
            state.cors_origin.as_deref(),
        )),
        ZoomifyKind::Tile { resolution, x, y } => {
            // Zoomify discards pyramid levels smaller than one tile: the
            // lowest level must be the largest that fits a single tile
            let resolution = resolution + zoomify_discard(&geometry);

            let level = reference
                .level_at(resolution)
                .ok_or(BlendError::InvalidResolution {
                    resolution,
                    num_resolutions: reference.num_resolutions(),
                })?;
            let ntlx = level.width.div_ceil(level.tile_width);
            let tile_index = y * ntlx + x;

            let view = state.base_view(reference);
            let encoded = state
                .service
                .blend_tile(&channels, &settings, &view, resolution, tile_index)
                .await?;

            Ok(jpeg_response(
                encoded.data,
                &encoded.last_modified,
                state.cache_max_age,
                state.cors_origin.as_deref(),
            ))
        }
    }
}

/// Count the resolutions Zoomify cannot address.
fn zoomify_discard(geometry: &ImageGeometry) -> u32 {
    let discard = geometry
        .level_dims
        .iter()
        .filter(|&&(w, h)| w < geometry.tile_width && h < geometry.tile_width)
        .count() as u32;
    discard.saturating_sub(1)
}

// =============================================================================
// IIIF route
// =============================================================================

/// Handle an IIIF-style blend request.
pub async fn iiif_blend_handler<S: ChannelSource + 'static>(
    State(state): State<AppState<S>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response<Body>, BlendHandlerError> {
    let argument = route_argument(&uri, "/iiif");
    debug!(%argument, "iiif blend request");

    // A bare identifier with no parameters redirects to its info document
    if !argument.trim_start_matches('/').contains('/') {
        let identifier = argument.split('&').next().unwrap_or(&argument);
        let location = format!("{}{}/info.json", base_url(&headers, "/iiif"), identifier);
        debug!(%location, "redirecting parameterless request");
        return Ok(see_other(&location));
    }

    let (params, json) = split_blend_argument(&argument)?;
    let settings = parse_settings(json)?;
    let request = parse_iiif(params).map_err(BlendError::from)?;

    let channels = state
        .service
        .open_channels(&request.base_path, Some("tif"), &settings)
        .await?;
    let reference = &channels[0];
    let geometry = geometry_of(reference);

    match request.kind {
        IiifKind::Info => {
            let id = url::escape(&format!(
                "{}{}",
                base_url(&headers, "/iiif"),
                request.identifier
            ));
            Ok(document_response(
                info_json(&id, &geometry, state.max_size),
                "application/ld+json",
                reference.timestamp(),
                state.cache_max_age,
                state.cors_origin.as_deref(),
            ))
        }
        IiifKind::Image(image_params) => {
            let mut view = state.base_view(reference);
            view.apply_region(&image_params.region)
                .map_err(BlendError::from)?;
            view.apply_size(&image_params.size)
                .map_err(BlendError::from)?;
            view.rotation = image_params.rotation;
            view.flip = image_params.flip;
            view.colourspace = image_params.quality;

            let level_dims: Vec<(u32, u32)> = (0..reference.num_resolutions() as u32)
                .map(|r| {
                    (
                        reference.width_at(r).unwrap_or(0),
                        reference.height_at(r).unwrap_or(0),
                    )
                })
                .collect();
            let resolution = view.best_resolution(&level_dims);
            let (level_width, level_height) = level_dims[resolution as usize];

            let (view_left, view_top, view_width, view_height) = if view.viewport_set() {
                view.viewport_pixels(level_width, level_height)
            } else {
                (0, 0, level_width, level_height)
            };

            let tile_width = geometry.tile_width;
            let tile_height = geometry.tile_height;

            // The fast path serves one pyramid-native tile: the request
            // must be tile-sized, tile-aligned and strictly inside the
            // level, or be the whole image at the smallest resolution
            let tile_aligned = view.maintain_aspect
                && resolution > 0
                && view.request_width() == tile_width
                && view.request_height() == tile_height
                && view_left % tile_width == 0
                && view_top % tile_height == 0
                && view_width % tile_width == 0
                && view_height % tile_height == 0
                && view_width < level_width
                && view_height < level_height;
            let full_at_smallest = view.maintain_aspect
                && resolution == 0
                && view.request_width() == level_width
                && view.request_height() == level_height;

            if !(tile_aligned || full_at_smallest) {
                // Arbitrary regions would go through the resampling path,
                // which this route does not offer for blending
                return Err(BlendError::UnsupportedRegion.into());
            }

            let ntlx = level_width.div_ceil(tile_width);
            let tile_index = (view_top / tile_height) * ntlx + view_left / tile_width;

            let encoded = state
                .service
                .blend_tile(&channels, &settings, &view, resolution, tile_index)
                .await?;

            Ok(jpeg_response(
                encoded.data,
                &encoded.last_modified,
                state.cache_max_age,
                state.cors_origin.as_deref(),
            ))
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Percent-decode the request path after the route prefix.
fn route_argument(uri: &Uri, prefix: &str) -> String {
    let path = uri.path();
    let rest = path.strip_prefix(prefix).unwrap_or(path);
    url::decode(rest)
}

/// Parse blend settings and apply the empty-specification policy.
fn parse_settings(json: &str) -> Result<Vec<BlendSetting>, BlendHandlerError> {
    let settings = parse_blend_settings(json)?;
    if settings.is_empty() {
        return Err(BlendSpecError::Empty.into());
    }
    for setting in &settings {
        debug!(
            channel = setting.channel_index,
            tint = %setting.tint.to_hex(),
            min = setting.min,
            max = setting.max,
            "blend setting"
        );
    }
    Ok(settings)
}

/// Reconstruct the request base URL from the host headers.
fn base_url(headers: &HeaderMap, route: &str) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}{route}")
}

/// Flatten a channel's pyramid geometry for document emission.
fn geometry_of<R: RangeReader + 'static>(image: &ChannelImage<R>) -> ImageGeometry {
    let level_dims = (0..image.num_resolutions())
        .filter_map(|i| image.level_by_index(i).map(|l| (l.width, l.height)))
        .collect();
    ImageGeometry {
        width: image.width(),
        height: image.height(),
        tile_width: image.tile_width(),
        tile_height: image.tile_height(),
        level_dims,
    }
}
