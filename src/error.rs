use thiserror::Error;

/// I/O errors that can occur when reading channel image files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Channel image file not found
    #[error("image not found: {0}")]
    NotFound(String),

    /// Requested range exceeds resource bounds
    #[error("range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Underlying filesystem error
    #[error("read error: {0}")]
    Read(String),
}

/// Errors from parsing a pyramidal channel image
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// The file does not start with a TIFF signature
    #[error("invalid TIFF magic: 0x{0:04X}")]
    InvalidMagic(u16),

    /// TIFF version is not 42 (classic); BigTIFF is not accepted
    #[error("unsupported TIFF version: {0}")]
    InvalidVersion(u16),

    /// A tag required for pyramid access is absent
    #[error("missing required TIFF tag: {0}")]
    MissingTag(&'static str),

    /// A tag carries a value the reader cannot use
    #[error("invalid value for tag {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// The image is strip-organized; only tiled pyramids are served
    #[error("image is not tiled")]
    NotTiled,

    /// Channel images must be single-sample grayscale
    #[error("image is not single-channel grayscale ({samples} samples, photometric {photometric})")]
    NotGrayscale { samples: u16, photometric: u16 },

    /// Channel images must be 8- or 16-bit
    #[error("unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    /// Tile data uses a compression scheme the reader cannot decode
    #[error("unsupported compression scheme: {0}")]
    UnsupportedCompression(u16),

    /// The file parsed but contains no usable pyramid levels
    #[error("no pyramid levels found")]
    EmptyPyramid,

    #[error(transparent)]
    Io(#[from] IoError),
}

/// Errors from parsing the JSON blend specification.
///
/// Each variant maps to a two-digit wire error code carried in the
/// error response, matching the protocol the viewers expect.
#[derive(Debug, Clone, Error)]
pub enum BlendSpecError {
    /// The URL carried no `&`-separated blend JSON at all
    #[error("request carries no blend specification")]
    Missing,

    /// Malformed JSON, missing keys, bad tint, or max <= min
    #[error("invalid blend specification: {0}")]
    Invalid(String),

    /// The specification parsed but defines zero channels
    #[error("blend specification is empty")]
    Empty,
}

impl BlendSpecError {
    /// Two-digit wire code for the error response body.
    pub fn code(&self) -> &'static str {
        match self {
            BlendSpecError::Missing => "2 0",
            BlendSpecError::Invalid(_) => "2 1",
            BlendSpecError::Empty => "2 3",
        }
    }
}

/// Errors from parsing the Zoomify or IIIF request URL
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    /// IIIF image request with more than four path parameters
    #[error("query has too many parameters; syntax is {{identifier}}/{{region}}/{{size}}/{{rotation}}/{{quality}}.{{format}}")]
    TooManyParameters,

    /// IIIF image request with fewer than four path parameters
    #[error("query has too few parameters; syntax is {{identifier}}/{{region}}/{{size}}/{{rotation}}/{{quality}}.{{format}}")]
    TooFewParameters,

    /// Rotation other than 0, 90, 180, 270 or 360
    #[error("invalid rotation \"{0}\": supported angles are 0, 90, 180 and 270 degrees")]
    InvalidRotation(String),

    /// Size parameter unparseable or yielding a zero dimension
    #[error("invalid size: {0}")]
    InvalidSize(String),

    /// Region parameter unparseable or yielding a zero dimension
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// Quality token other than native/color/default/gray/grey/bitonal
    #[error("unsupported quality \"{0}\": must be one of native, color, gray or bitonal")]
    UnsupportedQuality(String),

    /// Output format other than jpg
    #[error("unsupported output format \"{0}\": only JPEG output is supported")]
    UnsupportedOutputFormat(String),

    /// Tile coordinates or resolution unparseable
    #[error("invalid tile specification: {0}")]
    InvalidTile(String),

    /// IIIF identifier does not name a .tif path
    #[error("invalid identifier \"{0}\": must be a path ending in .tif")]
    InvalidIdentifier(String),
}

/// Errors from the blending pipeline itself
#[derive(Debug, Error)]
pub enum BlendError {
    #[error(transparent)]
    Spec(#[from] BlendSpecError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] IoError),

    /// Channel image is not 1-channel grayscale 8/16-bit
    #[error("unsupported channel image {path}: only 8/16-bit single-channel grayscale pyramids can be blended")]
    UnsupportedImage { path: String },

    /// A tile reached the blender still compressed where raw pixels are required
    #[error("channel {channel} tile was delivered compressed; uncompressed pixel data is required")]
    UnexpectedCompression { channel: u32 },

    /// Requested resolution is outside the pyramid
    #[error("invalid resolution {resolution}: image has {num_resolutions} resolutions")]
    InvalidResolution {
        resolution: u32,
        num_resolutions: usize,
    },

    /// Tile index is outside the requested resolution
    #[error("tile index {tile} out of range at resolution {resolution} ({total} tiles)")]
    TileOutOfRange {
        tile: u32,
        resolution: u32,
        total: u32,
    },

    /// Arbitrary-region requests are not supported by the IIIF blend route
    #[error("region requests that do not coincide with tile boundaries are not supported for blending")]
    UnsupportedRegion,

    /// Channel list and settings list diverged (internal invariant)
    #[error("number of blending settings ({settings}) differs from the number of loaded channels ({channels})")]
    ChannelCountMismatch { settings: usize, channels: usize },

    /// JPEG encoding of the blended tile failed
    #[error("failed to encode blended tile: {0}")]
    Encode(String),

    /// JPEG decoding of a stored tile failed
    #[error("failed to decode stored tile: {0}")]
    Decode(String),
}
