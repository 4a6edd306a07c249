//! HTTP server layer for the blend routes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          HTTP Layer                             │
//! │   GET /zoomify/<base>/TileGroup<g>/<r>-<x>-<y>.jpg&<json>       │
//! │   GET /iiif/<id>.tif/<region>/<size>/<rot>/<quality>.jpg&<json> │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  handlers   │  │     emit     │  │         routes         │  │
//! │  │ (dispatch)  │  │ (documents,  │  │    (router config)     │  │
//! │  │             │  │  framing)    │  │                        │  │
//! │  └─────────────┘  └──────────────┘  └────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod emit;
pub mod handlers;
pub mod routes;

pub use emit::{document_response, image_properties_xml, info_json, jpeg_response, ImageGeometry};
pub use handlers::{
    health_handler, iiif_blend_handler, zoomify_blend_handler, AppState, BlendHandlerError,
    ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig};
