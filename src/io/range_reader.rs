//! Byte-range access to channel image files.
//!
//! The TIFF parser and tile fetcher never load a whole pyramid into memory;
//! they read headers, directories and individual tiles through the
//! [`RangeReader`] trait. The production implementation is backed by a local
//! file and performs positioned reads on a blocking thread.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Trait for reading byte ranges from a channel image.
///
/// Implementations must be thread-safe; a single reader is shared by all
/// requests touching the same image.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Get a unique identifier for this resource (for logging and cache keys).
    fn identifier(&self) -> &str;
}

// =============================================================================
// File-backed reader
// =============================================================================

/// A [`RangeReader`] over a local file, using positioned reads so that
/// concurrent tile fetches never contend on a shared cursor.
#[derive(Debug)]
pub struct FileRangeReader {
    file: Arc<std::fs::File>,
    size: u64,
    identifier: String,
}

impl FileRangeReader {
    /// Open a file for range reading.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, IoError> {
        let path: PathBuf = path.into();
        let identifier = path.display().to_string();
        let ident = identifier.clone();

        let (file, size) = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => IoError::NotFound(path.display().to_string()),
                _ => IoError::Read(e.to_string()),
            })?;
            let size = file
                .metadata()
                .map_err(|e| IoError::Read(e.to_string()))?
                .len();
            Ok::<_, IoError>((file, size))
        })
        .await
        .map_err(|e| IoError::Read(format!("blocking task failed: {e}")))??;

        Ok(Self {
            file: Arc::new(file),
            size,
            identifier: ident,
        })
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if offset + len as u64 > self.size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.size,
            });
        }

        let file = Arc::clone(&self.file);
        let buf = tokio::task::spawn_blocking(move || {
            use std::os::unix::fs::FileExt;
            let mut buf = vec![0u8; len];
            file.read_exact_at(&mut buf, offset)
                .map_err(|e| IoError::Read(e.to_string()))?;
            Ok::<_, IoError>(buf)
        })
        .await
        .map_err(|e| IoError::Read(format!("blocking task failed: {e}")))??;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF files can be either little-endian or big-endian, determined by the
// magic bytes at the start of the file.

/// Read a little-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Read a big-endian u16 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 2 bytes.
#[inline]
pub fn read_u16_be(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Read a little-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a big-endian u32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
