//! Channel images and their process-wide registry.
//!
//! A "channel" is one single-channel grayscale pyramid participating in a
//! blend, addressed by integer index through the file naming scheme
//! `<base>_<index>[.<ext>]`. The registry caches opened images by path and
//! coordinates concurrent opens; the loader turns an ordered settings list
//! into the per-request channel list.

mod image;
mod loader;
mod registry;
mod source;

pub use image::ChannelImage;
pub use loader::{channel_filename, load_channels};
pub use registry::{ChannelRegistry, DEFAULT_IMAGE_CACHE_CAPACITY};
pub use source::{format_http_date, ChannelSource, FileChannelSource};
