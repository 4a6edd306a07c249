//! Sources that open channel image files.
//!
//! The registry is generic over a [`ChannelSource`], keeping the storage
//! backend out of the blending pipeline. Production deployments serve local
//! pyramids through [`FileChannelSource`]; tests plug in an in-memory source.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IoError;
use crate::io::{FileRangeReader, RangeReader};

/// Trait for creating range readers from channel image paths.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// The type of range reader this source creates.
    type Reader: RangeReader + 'static;

    /// Open the image at `path`.
    ///
    /// Returns the reader plus the image's modification timestamp already
    /// formatted for the `Last-Modified` header (RFC 1123).
    async fn open(&self, path: &str) -> Result<(Self::Reader, String), IoError>;
}

// =============================================================================
// Filesystem source
// =============================================================================

/// Channel source over a local directory tree.
///
/// Request paths are resolved relative to the configured root; absolute
/// request paths are re-rooted so that clients cannot escape it.
pub struct FileChannelSource {
    root: PathBuf,
}

impl FileChannelSource {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a request path against the root directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, IoError> {
        let trimmed = path.trim_start_matches('/');
        if trimmed.split('/').any(|seg| seg == "..") {
            return Err(IoError::NotFound(path.to_string()));
        }
        Ok(self.root.join(trimmed))
    }
}

#[async_trait]
impl ChannelSource for FileChannelSource {
    type Reader = FileRangeReader;

    async fn open(&self, path: &str) -> Result<(Self::Reader, String), IoError> {
        let full_path = self.resolve(path)?;

        let metadata = tokio::fs::metadata(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IoError::NotFound(path.to_string())
            } else {
                IoError::Read(e.to_string())
            }
        })?;

        let timestamp = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t))
            .unwrap_or_else(|_| Utc::now());

        let reader = FileRangeReader::open(&full_path).await?;
        Ok((reader, format_http_date(&timestamp)))
    }
}

/// Format a timestamp as an RFC 1123 HTTP date.
pub fn format_http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
