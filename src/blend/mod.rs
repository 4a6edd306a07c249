//! The multi-channel blending engine.
//!
//! Parses the JSON blend specification, preprocesses one tile or region per
//! channel, folds the tinted contributions into a single RGB tile and JPEG
//! encodes the result. [`BlendService`] is the orchestrator the HTTP
//! handlers drive.

mod blender;
mod service;
mod settings;
mod tint;

pub use blender::blend_tiles;
pub use service::{BlendService, EncodedTile};
pub use settings::{parse_blend_settings, BlendSetting};
pub use tint::Tint;
