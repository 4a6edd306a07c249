//! Grayscale tiled-TIFF pyramid parsing.
//!
//! Channel images are single-channel grayscale pyramids stored as classic
//! TIFF files: one IFD per resolution level, largest first, each level
//! organized as fixed-size tiles. This module parses the directory chain,
//! validates that the file is something the blender can consume (tiled,
//! 1 sample per pixel, 8 or 16 bits, uncompressed or JPEG tiles) and
//! exposes per-level geometry plus raw tile reads.
//!
//! # TIFF Header Structure (classic, 8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD
//! ```
//!
//! BigTIFF (version 43) is rejected: the single-channel pyramids this server
//! composes are well under the 4 GiB classic limit.

use bytes::Bytes;

use crate::error::FormatError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, RangeReader};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one classic IFD entry: 2 tag + 2 type + 4 count + 4 value/offset
const IFD_ENTRY_SIZE: usize = 12;

// Tag numbers this reader cares about
const TAG_IMAGE_WIDTH: u16 = 256;
const TAG_IMAGE_LENGTH: u16 = 257;
const TAG_BITS_PER_SAMPLE: u16 = 258;
const TAG_COMPRESSION: u16 = 259;
const TAG_PHOTOMETRIC: u16 = 262;
const TAG_SAMPLES_PER_PIXEL: u16 = 277;
const TAG_MIN_SAMPLE_VALUE: u16 = 280;
const TAG_MAX_SAMPLE_VALUE: u16 = 281;
const TAG_TILE_WIDTH: u16 = 322;
const TAG_TILE_LENGTH: u16 = 323;
const TAG_TILE_OFFSETS: u16 = 324;
const TAG_TILE_BYTE_COUNTS: u16 = 325;
const TAG_ICC_PROFILE: u16 = 34675;

// Field types
const TYPE_BYTE: u16 = 1;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// All multi-byte values in the file must be read respecting this order,
/// including 16-bit pixel data in uncompressed tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed classic TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 (BigTIFF is rejected here)
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, FormatError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(FormatError::InvalidTagValue {
                tag: "header",
                message: format!("file too small for TIFF header ({} bytes)", bytes.len()),
            });
        }

        // Checking for a specific byte pattern, so endianness of the read is moot
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(FormatError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        if version != VERSION_TIFF {
            return Err(FormatError::InvalidVersion(version));
        }

        let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;
        if first_ifd_offset >= file_size {
            return Err(FormatError::InvalidTagValue {
                tag: "header",
                message: format!("first IFD offset {first_ifd_offset} outside file"),
            });
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }
}

// =============================================================================
// IFD entries
// =============================================================================

/// One raw 12-byte IFD entry.
#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Inline value bytes or offset, interpretation depends on size
    value_or_offset: u32,
    /// Raw value/offset field bytes, needed for inline SHORT arrays
    raw_value: [u8; 4],
}

impl IfdEntry {
    fn parse(byte_order: ByteOrder, bytes: &[u8]) -> Self {
        Self {
            tag: byte_order.read_u16(&bytes[0..2]),
            field_type: byte_order.read_u16(&bytes[2..4]),
            count: byte_order.read_u32(&bytes[4..8]),
            value_or_offset: byte_order.read_u32(&bytes[8..12]),
            raw_value: [bytes[8], bytes[9], bytes[10], bytes[11]],
        }
    }

    /// Byte width of one element of this entry's field type.
    fn element_size(&self) -> Option<usize> {
        match self.field_type {
            TYPE_BYTE => Some(1),
            TYPE_SHORT => Some(2),
            TYPE_LONG => Some(4),
            _ => None,
        }
    }
}

/// One parsed image file directory, i.e. one pyramid level before validation.
#[derive(Debug, Clone)]
struct ParsedIfd {
    width: u32,
    height: u32,
    bits_per_sample: u16,
    samples_per_pixel: u16,
    compression: u16,
    photometric: u16,
    tile_width: Option<u32>,
    tile_height: Option<u32>,
    tile_offsets: Option<Vec<u64>>,
    tile_byte_counts: Option<Vec<u64>>,
    min_sample_value: Option<u32>,
    max_sample_value: Option<u32>,
    icc_profile: Option<Bytes>,
}

// =============================================================================
// Compression
// =============================================================================

/// Compression scheme of stored tile data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// Compression tag 1: raw pixel data
    None,
    /// Compression tag 7: complete JPEG streams per tile
    Jpeg,
}

impl TiffCompression {
    fn from_tag(value: u16) -> Result<Self, FormatError> {
        match value {
            1 => Ok(TiffCompression::None),
            7 => Ok(TiffCompression::Jpeg),
            other => Err(FormatError::UnsupportedCompression(other)),
        }
    }
}

// =============================================================================
// Pyramid
// =============================================================================

/// Geometry of one pyramid level.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Width of this level in pixels
    pub width: u32,

    /// Height of this level in pixels
    pub height: u32,

    /// Width of each tile in pixels
    pub tile_width: u32,

    /// Height of each tile in pixels
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    /// Byte offset of each tile's data, row-major tile order
    tile_offsets: Vec<u64>,

    /// Byte length of each tile's data
    tile_byte_counts: Vec<u64>,
}

impl PyramidLevel {
    /// Total number of tiles at this level.
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }
}

/// A parsed grayscale tiled-TIFF pyramid.
///
/// Levels are ordered largest-first: index 0 is the full-resolution image.
/// External request resolutions count from the smallest level; the channel
/// layer performs that conversion.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    /// Byte order of the file (16-bit tile data is stored in this order)
    pub byte_order: ByteOrder,

    /// Bits per sample: 8 or 16
    pub bits_per_sample: u16,

    /// Compression of stored tiles, uniform across levels
    pub compression: TiffCompression,

    /// Lowest sample value in the image's native range
    pub min_sample_value: u32,

    /// Highest sample value in the image's native range
    pub max_sample_value: u32,

    /// Embedded ICC profile, if any
    pub icc_profile: Option<Bytes>,

    /// Pyramid levels, largest first
    levels: Vec<PyramidLevel>,
}

impl TiffPyramid {
    /// Open and validate a pyramid through a range reader.
    ///
    /// Walks the IFD chain, validates each directory against the blending
    /// constraints and orders levels largest-first.
    pub async fn open<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, FormatError> {
        let header_bytes = reader.read_exact_at(0, TIFF_HEADER_SIZE).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let mut ifds = Vec::new();
        let mut next_offset = header.first_ifd_offset;
        // IFD chains in the wild are short; the bound guards against cycles
        while next_offset != 0 && ifds.len() < 64 {
            let (ifd, next) = parse_ifd(reader, header.byte_order, next_offset).await?;
            ifds.push(ifd);
            next_offset = next;
        }

        if ifds.is_empty() {
            return Err(FormatError::EmptyPyramid);
        }

        // Validate the base directory and derive image-wide properties
        let base = &ifds[0];
        if base.samples_per_pixel != 1 || base.photometric > 1 {
            return Err(FormatError::NotGrayscale {
                samples: base.samples_per_pixel,
                photometric: base.photometric,
            });
        }
        if base.bits_per_sample != 8 && base.bits_per_sample != 16 {
            return Err(FormatError::UnsupportedBitDepth(base.bits_per_sample));
        }
        let compression = TiffCompression::from_tag(base.compression)?;

        let bits = base.bits_per_sample;
        let min_sample_value = base.min_sample_value.unwrap_or(0);
        let max_sample_value = base
            .max_sample_value
            .unwrap_or((1u32 << bits.min(31)) - 1);
        let icc_profile = base.icc_profile.clone();

        let mut levels = Vec::with_capacity(ifds.len());
        for ifd in &ifds {
            if ifd.bits_per_sample != bits || ifd.compression != base.compression {
                return Err(FormatError::InvalidTagValue {
                    tag: "BitsPerSample",
                    message: "pyramid levels disagree on bit depth or compression".into(),
                });
            }
            levels.push(validate_level(ifd)?);
        }

        // Largest level first; well-formed pyramids are already in this order
        levels.sort_by(|a, b| b.width.cmp(&a.width));

        Ok(TiffPyramid {
            byte_order: header.byte_order,
            bits_per_sample: bits,
            compression,
            min_sample_value,
            max_sample_value,
            icc_profile,
            levels,
        })
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Level geometry by array index (0 = largest).
    pub fn level(&self, index: usize) -> Option<&PyramidLevel> {
        self.levels.get(index)
    }

    /// Full-resolution dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.levels[0].width, self.levels[0].height)
    }

    /// Read the stored bytes of one tile.
    ///
    /// `tile_index` is the row-major index `ty * tiles_x + tx`.
    pub async fn read_tile_data<R: RangeReader + ?Sized>(
        &self,
        reader: &R,
        level_index: usize,
        tile_index: u32,
    ) -> Result<Bytes, FormatError> {
        let level = self
            .levels
            .get(level_index)
            .ok_or(FormatError::EmptyPyramid)?;

        let idx = tile_index as usize;
        if idx >= level.tile_offsets.len() {
            return Err(FormatError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "tile index {tile_index} out of range ({} tiles)",
                    level.tile_offsets.len()
                ),
            });
        }

        let offset = level.tile_offsets[idx];
        let len = level.tile_byte_counts[idx] as usize;
        Ok(reader.read_exact_at(offset, len).await?)
    }
}

/// Validate one IFD against the tiled-pyramid constraints.
fn validate_level(ifd: &ParsedIfd) -> Result<PyramidLevel, FormatError> {
    let tile_width = ifd.tile_width.ok_or(FormatError::NotTiled)?;
    let tile_height = ifd.tile_height.ok_or(FormatError::NotTiled)?;
    let tile_offsets = ifd.tile_offsets.clone().ok_or(FormatError::NotTiled)?;
    let tile_byte_counts = ifd
        .tile_byte_counts
        .clone()
        .ok_or(FormatError::MissingTag("TileByteCounts"))?;

    if tile_width == 0 || tile_height == 0 || ifd.width == 0 || ifd.height == 0 {
        return Err(FormatError::InvalidTagValue {
            tag: "TileWidth",
            message: "zero image or tile dimension".into(),
        });
    }

    let tiles_x = ifd.width.div_ceil(tile_width);
    let tiles_y = ifd.height.div_ceil(tile_height);
    let expected = (tiles_x * tiles_y) as usize;

    if tile_offsets.len() != expected || tile_byte_counts.len() != expected {
        return Err(FormatError::InvalidTagValue {
            tag: "TileOffsets",
            message: format!(
                "expected {expected} tiles, found {} offsets / {} byte counts",
                tile_offsets.len(),
                tile_byte_counts.len()
            ),
        });
    }

    Ok(PyramidLevel {
        width: ifd.width,
        height: ifd.height,
        tile_width,
        tile_height,
        tiles_x,
        tiles_y,
        tile_offsets,
        tile_byte_counts,
    })
}

/// Parse one IFD at `offset`, returning the directory and the next-IFD offset.
async fn parse_ifd<R: RangeReader + ?Sized>(
    reader: &R,
    byte_order: ByteOrder,
    offset: u64,
) -> Result<(ParsedIfd, u64), FormatError> {
    let count_bytes = reader.read_exact_at(offset, 2).await?;
    let entry_count = byte_order.read_u16(&count_bytes) as usize;

    // Entries plus the trailing next-IFD offset in one read
    let body_len = entry_count * IFD_ENTRY_SIZE + 4;
    let body = reader.read_exact_at(offset + 2, body_len).await?;

    let mut ifd = ParsedIfd {
        width: 0,
        height: 0,
        bits_per_sample: 1,
        samples_per_pixel: 1,
        compression: 1,
        photometric: 1,
        tile_width: None,
        tile_height: None,
        tile_offsets: None,
        tile_byte_counts: None,
        min_sample_value: None,
        max_sample_value: None,
        icc_profile: None,
    };

    for i in 0..entry_count {
        let entry = IfdEntry::parse(byte_order, &body[i * IFD_ENTRY_SIZE..]);
        match entry.tag {
            TAG_IMAGE_WIDTH => ifd.width = read_scalar(byte_order, &entry)?,
            TAG_IMAGE_LENGTH => ifd.height = read_scalar(byte_order, &entry)?,
            TAG_BITS_PER_SAMPLE => ifd.bits_per_sample = read_scalar(byte_order, &entry)? as u16,
            TAG_COMPRESSION => ifd.compression = read_scalar(byte_order, &entry)? as u16,
            TAG_PHOTOMETRIC => ifd.photometric = read_scalar(byte_order, &entry)? as u16,
            TAG_SAMPLES_PER_PIXEL => ifd.samples_per_pixel = read_scalar(byte_order, &entry)? as u16,
            TAG_MIN_SAMPLE_VALUE => ifd.min_sample_value = Some(read_scalar(byte_order, &entry)?),
            TAG_MAX_SAMPLE_VALUE => ifd.max_sample_value = Some(read_scalar(byte_order, &entry)?),
            TAG_TILE_WIDTH => ifd.tile_width = Some(read_scalar(byte_order, &entry)?),
            TAG_TILE_LENGTH => ifd.tile_height = Some(read_scalar(byte_order, &entry)?),
            TAG_TILE_OFFSETS => {
                ifd.tile_offsets = Some(read_array(reader, byte_order, &entry).await?)
            }
            TAG_TILE_BYTE_COUNTS => {
                ifd.tile_byte_counts = Some(read_array(reader, byte_order, &entry).await?)
            }
            TAG_ICC_PROFILE => {
                let data = reader
                    .read_exact_at(entry.value_or_offset as u64, entry.count as usize)
                    .await?;
                ifd.icc_profile = Some(data);
            }
            _ => {} // other tags are irrelevant here
        }
    }

    let next = byte_order.read_u32(&body[entry_count * IFD_ENTRY_SIZE..]) as u64;
    Ok((ifd, next))
}

/// Read a single SHORT or LONG value from an entry.
fn read_scalar(byte_order: ByteOrder, entry: &IfdEntry) -> Result<u32, FormatError> {
    if entry.count != 1 {
        // BitsPerSample may legally repeat the value per sample; take the first
        if entry.tag != TAG_BITS_PER_SAMPLE
            && entry.tag != TAG_MIN_SAMPLE_VALUE
            && entry.tag != TAG_MAX_SAMPLE_VALUE
        {
            return Err(FormatError::InvalidTagValue {
                tag: "scalar",
                message: format!("tag {} has count {}", entry.tag, entry.count),
            });
        }
    }
    match entry.field_type {
        // SHORT values sit in the first two bytes of the value field,
        // in the file byte order
        TYPE_SHORT => Ok(byte_order.read_u16(&entry.raw_value[0..2]) as u32),
        TYPE_LONG => Ok(entry.value_or_offset),
        other => Err(FormatError::InvalidTagValue {
            tag: "scalar",
            message: format!("unexpected field type {other} for tag {}", entry.tag),
        }),
    }
}

/// Read a SHORT or LONG array, inline when it fits in the value field.
async fn read_array<R: RangeReader + ?Sized>(
    reader: &R,
    byte_order: ByteOrder,
    entry: &IfdEntry,
) -> Result<Vec<u64>, FormatError> {
    let elem = entry
        .element_size()
        .ok_or_else(|| FormatError::InvalidTagValue {
            tag: "array",
            message: format!("unexpected field type {} for tag {}", entry.field_type, entry.tag),
        })?;
    let count = entry.count as usize;
    let total = elem * count;

    let data: Bytes = if total <= 4 {
        Bytes::copy_from_slice(&entry.raw_value[..total])
    } else {
        reader
            .read_exact_at(entry.value_or_offset as u64, total)
            .await?
    };

    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let v = match elem {
            2 => byte_order.read_u16(&data[i * 2..]) as u64,
            4 => byte_order.read_u32(&data[i * 4..]) as u64,
            _ => data[i] as u64,
        };
        values.push(v);
    }
    Ok(values)
}

// =============================================================================
// Test fixtures
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
