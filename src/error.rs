use std::io;

use thiserror::Error;

/// Errors raised while decoding a single spectrum file.
///
/// Format mismatches never show up here: a sniffer that declines a file
/// simply returns `false`. Everything in this enum means the file *claimed*
/// to be a format and then broke one of its invariants.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Underlying read failed, including short reads on multi-byte scalars
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A field or block extends past the end of the buffer
    #[error("Truncated data: need {needed} bytes at offset {offset}, only {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// An offset or length invariant of a fixed layout does not hold
    #[error("Structural corruption at offset {offset} ({field}): expected {expected}, found {found}")]
    Structural {
        offset: u64,
        field: &'static str,
        expected: String,
        found: String,
    },

    /// Magic bytes did not match
    #[error("Invalid magic bytes: expected {expected}, found {found}")]
    InvalidMagic { expected: String, found: String },

    /// A required value could not be interpreted
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// TIFF container error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Embedded raster could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(String),

    /// CSV reader/writer error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Property bag invariant violated while populating a spectrum
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

impl DecodeError {
    /// Shorthand for a structural error with formatted expected/found values.
    pub fn structural(
        offset: u64,
        field: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        DecodeError::Structural {
            offset,
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::Image(err.to_string())
    }
}

impl From<csv::Error> for DecodeError {
    fn from(err: csv::Error) -> Self {
        DecodeError::Csv(err.to_string())
    }
}

/// Errors that can occur when parsing TIFF containers
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42, got {0}")]
    InvalidVersion(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Directory chain revisits a directory or exceeds what the file can hold
    #[error("Directory chain does not terminate (stopped after {0} directories)")]
    ChainLoop(usize),

    /// Value of an entry lies outside the file
    #[error("Tag {tag} value at offset {offset} with {len} bytes lies outside the file")]
    ValueOutOfBounds { tag: u16, offset: u64, len: u64 },

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only uncompressed rasters are supported)")]
    UnsupportedCompression(u16),

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors returned by the format registry
#[derive(Debug, Error)]
pub enum FormatError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No registered sniffer accepted the data
    #[error("Unrecognized format (tried {}; leading bytes {prefix})", tried.join(", "))]
    Unrecognized {
        tried: Vec<&'static str>,
        prefix: String,
    },

    /// A sniffer accepted the data but decoding failed
    #[error("Failed to decode {format}: {source}")]
    Decode {
        format: &'static str,
        #[source]
        source: DecodeError,
    },
}

/// Errors related to ripple cube files
#[derive(Debug, Error)]
pub enum CubeError {
    /// I/O error on the header or raw file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Required header key is absent
    #[error("Missing header key: {0}")]
    MissingKey(&'static str),

    /// Header value could not be parsed or is out of range
    #[error("Invalid value for header key {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    /// Element size and data type do not form a supported combination
    #[error("Unsupported combination: {data_type} data with {byte_depth}-byte elements")]
    UnsupportedCombination {
        data_type: &'static str,
        byte_depth: usize,
    },

    /// Recognised record order that the codec does not read
    #[error("Unsupported record order: {0}")]
    UnsupportedRecordOrder(String),

    /// Header and raw file disagree about the payload size
    #[error("Raw file size mismatch: header implies {expected} bytes, file has {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Seek target outside the cube geometry
    #[error("Position ({row}, {col}, {depth}) is outside the cube")]
    OutOfBounds { row: usize, col: usize, depth: usize },

    /// Value type does not match the cube's data type
    #[error("Type mismatch: cannot {operation} on a {data_type} cube")]
    TypeMismatch {
        operation: &'static str,
        data_type: &'static str,
    },

    /// Integer does not fit the cube's element type
    #[error("Value {value} does not fit in a {byte_depth}-byte {data_type} element")]
    ValueOutOfRange {
        value: i64,
        byte_depth: usize,
        data_type: &'static str,
    },

    /// Cursor is already at the structural end of the cube
    #[error("Read past the end of the cube")]
    EndOfCube,

    /// Write attempted on a cube opened for reading
    #[error("Cube was opened read-only")]
    ReadOnly,

    /// Extracted spectrum could not be populated
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

/// Invariant violations in the spectrum model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// Fractions in a composition must be finite and non-negative
    #[error("Invalid fraction {fraction} for {element}")]
    InvalidFraction { element: &'static str, fraction: f64 },

    /// Element symbol or atomic number not recognized
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    /// Numeric properties never store NaN
    #[error("Property {0} cannot hold a non-finite number")]
    NonFinite(&'static str),

    /// Value kind does not match the property's declared kind
    #[error("Property {property} holds {expected} values, not {found}")]
    KindMismatch {
        property: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}
