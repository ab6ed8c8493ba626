//! TIFF tag and field type definitions.
//!
//! Only classic TIFF is handled. Spectrum files are small, so BigTIFF's
//! 64-bit offsets never appear in practice and are rejected by the header
//! parser.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Spectrum counts may be stored as any integer or floating type, so unlike
/// an image-only reader the full TIFF 6.0 type set is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Opaque byte data
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLongs: numerator, denominator
    SRational = 10,
    /// IEEE single
    Float = 11,
    /// IEEE double
    Double = 12,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational | FieldType::SRational | FieldType::Double => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values (including BigTIFF's Long8).
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            _ => None,
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Bytes available for an inline value in a classic TIFF entry.
    pub const INLINE_THRESHOLD: usize = 4;

    /// Check if `count` values of this type fit in the entry's value field.
    #[inline]
    pub fn fits_inline(self, count: u64) -> bool {
        (self.size_in_bytes() as u64).saturating_mul(count) <= Self::INLINE_THRESHOLD as u64
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs used by the spectrum container.
///
/// Tags not listed here are ignored during parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Basic Image Structure
    // -------------------------------------------------------------------------
    /// Image width in pixels
    ImageWidth = 256,

    /// Image height (length) in pixels
    ImageLength = 257,

    /// Bits per sample
    BitsPerSample = 258,

    /// Compression scheme used
    Compression = 259,

    /// Photometric interpretation
    PhotometricInterpretation = 262,

    /// Free-text description
    ImageDescription = 270,

    /// Byte offsets of strips
    StripOffsets = 273,

    /// Number of components per pixel
    SamplesPerPixel = 277,

    /// Row count per strip
    RowsPerStrip = 278,

    /// Byte counts of strips
    StripByteCounts = 279,

    /// Chunky vs planar
    PlanarConfiguration = 284,

    /// Producing software
    Software = 305,

    // -------------------------------------------------------------------------
    // Private spectrum tags
    // -------------------------------------------------------------------------
    /// Channel counts (SHORT, LONG, FLOAT or DOUBLE array)
    SpectrumCounts = 50000,

    /// EMSA-style keyword block describing the counts (ASCII)
    SpectrumHeader = 50001,
}

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Unknown tags are not an error; they are simply ignored.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            258 => Some(TiffTag::BitsPerSample),
            259 => Some(TiffTag::Compression),
            262 => Some(TiffTag::PhotometricInterpretation),
            270 => Some(TiffTag::ImageDescription),
            273 => Some(TiffTag::StripOffsets),
            277 => Some(TiffTag::SamplesPerPixel),
            278 => Some(TiffTag::RowsPerStrip),
            279 => Some(TiffTag::StripByteCounts),
            284 => Some(TiffTag::PlanarConfiguration),
            305 => Some(TiffTag::Software),
            50000 => Some(TiffTag::SpectrumCounts),
            50001 => Some(TiffTag::SpectrumHeader),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::RowsPerStrip => "RowsPerStrip",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::PlanarConfiguration => "PlanarConfiguration",
            TiffTag::Software => "Software",
            TiffTag::SpectrumCounts => "SpectrumCounts",
            TiffTag::SpectrumHeader => "SpectrumHeader",
        }
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// TIFF compression scheme identifiers.
///
/// Only uncompressed rasters are decoded; anything else leaves the
/// micro-image unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    None = 1,
    Lzw = 5,
    Jpeg = 7,
    Deflate = 8,
    PackBits = 32773,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32773 => Some(Compression::PackBits),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::None)
    }
}

// =============================================================================
// Tests
// =============================================================================
