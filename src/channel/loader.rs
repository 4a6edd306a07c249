//! Channel loading for blend requests.
//!
//! Each blend setting selects a per-channel file derived from the request's
//! base path: `<base>_<channel_index>[.<ext>]`. Channels are opened through
//! the registry in settings order, which fixes the accumulation order.

use std::sync::Arc;

use tracing::debug;

use crate::blend::BlendSetting;
use crate::error::BlendError;

use super::image::ChannelImage;
use super::registry::ChannelRegistry;
use super::source::ChannelSource;

/// Derive the per-channel filename from the base path.
pub fn channel_filename(base_path: &str, channel_index: u32, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{base_path}_{channel_index}.{ext}"),
        None => format!("{base_path}_{channel_index}"),
    }
}

/// Open every channel named by the settings, in order.
///
/// Fails with the unsupported-image error if any opened channel is not an
/// 8/16-bit single-channel grayscale pyramid.
pub async fn load_channels<S: ChannelSource>(
    registry: &ChannelRegistry<S>,
    base_path: &str,
    ext: Option<&str>,
    settings: &[BlendSetting],
) -> Result<Vec<Arc<ChannelImage<S::Reader>>>, BlendError> {
    let mut channels = Vec::with_capacity(settings.len());

    for setting in settings {
        let path = channel_filename(base_path, setting.channel_index, ext);
        debug!(%path, channel = setting.channel_index, "loading channel");

        let image = registry.get_image(&path).await?;
        if !image.is_blendable() {
            return Err(BlendError::UnsupportedImage { path });
        }
        channels.push(image);
    }

    Ok(channels)
}
