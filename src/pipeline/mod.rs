//! Per-channel preprocessing pipeline.
//!
//! [`ViewSpec`] carries the request geometry and processing knobs,
//! [`transforms`] and [`resample`] hold the pixel operations, and
//! [`preprocess_tile`]/[`preprocess_region`] run the ordered stages that
//! turn a stored tile into the 1-channel 8-bit buffer the blender expects.

mod preprocess;
pub mod resample;
pub mod transforms;
mod view;

pub use preprocess::{preprocess_region, preprocess_tile, PipelineConfig};
pub use resample::Interpolation;
pub use view::ViewSpec;
