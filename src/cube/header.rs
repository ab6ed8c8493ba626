//! Ripple header parsing and validation.
//!
//! ```text
//! key            value
//! width          4
//! height         3
//! depth          2
//! offset         0
//! data-length    2
//! data-type      unsigned
//! byte-order     little-endian
//! record-by      vector
//! ```
//!
//! Keys and values are case-insensitive and separated by tabs or spaces.

use std::fmt;

use crate::error::CubeError;
use crate::io::ByteOrder;

// =============================================================================
// Header fields
// =============================================================================

/// Element interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Signed,
    Unsigned,
    Float,
}

impl DataType {
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Signed => "signed",
            DataType::Unsigned => "unsigned",
            DataType::Float => "float",
        }
    }

    /// Element sizes this type can be stored in.
    pub const fn byte_depths(self) -> &'static [usize] {
        match self {
            DataType::Signed => &[1, 2, 4, 8],
            DataType::Unsigned => &[1, 2, 4],
            DataType::Float => &[4, 8],
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, DataType::Float)
    }
}

/// Byte order as declared in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeByteOrder {
    BigEndian,
    LittleEndian,
    /// Only meaningful for 1-byte elements
    DontCare,
}

impl CubeByteOrder {
    pub const fn name(self) -> &'static str {
        match self {
            CubeByteOrder::BigEndian => "big-endian",
            CubeByteOrder::LittleEndian => "little-endian",
            CubeByteOrder::DontCare => "dont-care",
        }
    }
}

/// Storage order of the raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordBy {
    /// All depth values of a pixel are contiguous
    Vector,
    DontCare,
}

impl RecordBy {
    pub const fn name(self) -> &'static str {
        match self {
            RecordBy::Vector => "vector",
            RecordBy::DontCare => "dont-care",
        }
    }
}

// =============================================================================
// CubeHeader
// =============================================================================

/// Geometry and element layout of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CubeHeader {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    /// Bytes before the first element in the raw file
    pub offset: u64,
    pub byte_depth: usize,
    pub data_type: DataType,
    pub byte_order: CubeByteOrder,
    pub record_by: RecordBy,
}

fn parse_dimension(key: &'static str, value: &str) -> Result<usize, CubeError> {
    value
        .parse::<usize>()
        .map_err(|_| CubeError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

impl CubeHeader {
    /// Little-endian vector-major header.
    pub fn new(
        width: usize,
        height: usize,
        depth: usize,
        byte_depth: usize,
        data_type: DataType,
    ) -> Self {
        Self {
            width,
            height,
            depth,
            offset: 0,
            byte_depth,
            data_type,
            byte_order: CubeByteOrder::LittleEndian,
            record_by: RecordBy::Vector,
        }
    }

    /// Parse and validate header text.
    pub fn parse(text: &str) -> Result<Self, CubeError> {
        let mut width = None;
        let mut height = None;
        let mut depth = None;
        let mut offset = None;
        let mut byte_depth = None;
        let mut data_type = None;
        let mut byte_order = None;
        let mut record_by = None;

        for line in text.lines() {
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let key = key.to_ascii_lowercase();
            let value = value.to_ascii_lowercase();
            match key.as_str() {
                // Column title line
                "key" => {}
                "width" => width = Some(parse_dimension("width", &value)?),
                "height" => height = Some(parse_dimension("height", &value)?),
                "depth" => depth = Some(parse_dimension("depth", &value)?),
                "offset" => {
                    offset = Some(value.parse::<u64>().map_err(|_| CubeError::InvalidValue {
                        key: "offset",
                        value: value.clone(),
                    })?)
                }
                "data-length" => byte_depth = Some(parse_dimension("data-length", &value)?),
                "data-type" => {
                    data_type = Some(match value.as_str() {
                        "signed" => DataType::Signed,
                        "unsigned" => DataType::Unsigned,
                        "float" => DataType::Float,
                        _ => {
                            return Err(CubeError::InvalidValue {
                                key: "data-type",
                                value: value.clone(),
                            })
                        }
                    })
                }
                "byte-order" => {
                    byte_order = Some(match value.as_str() {
                        "big-endian" => CubeByteOrder::BigEndian,
                        "little-endian" => CubeByteOrder::LittleEndian,
                        "dont-care" => CubeByteOrder::DontCare,
                        _ => {
                            return Err(CubeError::InvalidValue {
                                key: "byte-order",
                                value: value.clone(),
                            })
                        }
                    })
                }
                "record-by" => {
                    record_by = Some(match value.as_str() {
                        "vector" => RecordBy::Vector,
                        "dont-care" => RecordBy::DontCare,
                        "image" => return Err(CubeError::UnsupportedRecordOrder(value.clone())),
                        _ => {
                            return Err(CubeError::InvalidValue {
                                key: "record-by",
                                value: value.clone(),
                            })
                        }
                    })
                }
                other => tracing::debug!(key = other, "ignoring unknown cube header key"),
            }
        }

        let byte_depth = byte_depth.ok_or(CubeError::MissingKey("data-length"))?;
        let byte_order = match byte_order {
            Some(order) => order,
            None if byte_depth == 1 => CubeByteOrder::DontCare,
            None => return Err(CubeError::MissingKey("byte-order")),
        };
        let header = CubeHeader {
            width: width.ok_or(CubeError::MissingKey("width"))?,
            height: height.ok_or(CubeError::MissingKey("height"))?,
            depth: depth.ok_or(CubeError::MissingKey("depth"))?,
            offset: offset.unwrap_or(0),
            byte_depth,
            data_type: data_type.ok_or(CubeError::MissingKey("data-type"))?,
            byte_order,
            record_by: record_by.unwrap_or(RecordBy::Vector),
        };
        header.validate()?;
        Ok(header)
    }

    /// Check geometry and the element type combination.
    pub fn validate(&self) -> Result<(), CubeError> {
        for (key, value) in [
            ("width", self.width),
            ("height", self.height),
            ("depth", self.depth),
        ] {
            if value == 0 {
                return Err(CubeError::InvalidValue {
                    key,
                    value: "0".to_string(),
                });
            }
        }
        if !self.data_type.byte_depths().contains(&self.byte_depth) {
            return Err(CubeError::UnsupportedCombination {
                data_type: self.data_type.name(),
                byte_depth: self.byte_depth,
            });
        }
        if self.byte_order == CubeByteOrder::DontCare && self.byte_depth != 1 {
            return Err(CubeError::InvalidValue {
                key: "byte-order",
                value: format!("dont-care with {}-byte elements", self.byte_depth),
            });
        }
        if self.payload_len().is_none() {
            return Err(CubeError::InvalidValue {
                key: "width",
                value: "geometry overflows the addressable size".to_string(),
            });
        }
        Ok(())
    }

    /// Number of elements in the cube.
    pub fn element_count(&self) -> Option<u64> {
        (self.width as u64)
            .checked_mul(self.height as u64)?
            .checked_mul(self.depth as u64)
    }

    /// Bytes of element data.
    pub fn payload_len(&self) -> Option<u64> {
        self.element_count()?.checked_mul(self.byte_depth as u64)
    }

    /// Expected size of the raw file.
    pub fn raw_len(&self) -> Option<u64> {
        self.payload_len()?.checked_add(self.offset)
    }

    /// Byte order used to encode elements; 1-byte data has none.
    pub fn effective_byte_order(&self) -> ByteOrder {
        match self.byte_order {
            CubeByteOrder::BigEndian => ByteOrder::BigEndian,
            CubeByteOrder::LittleEndian | CubeByteOrder::DontCare => ByteOrder::LittleEndian,
        }
    }

    /// Header text in the tab-separated form [`CubeHeader::parse`] reads.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CubeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "key\tvalue")?;
        writeln!(f, "width\t{}", self.width)?;
        writeln!(f, "height\t{}", self.height)?;
        writeln!(f, "depth\t{}", self.depth)?;
        writeln!(f, "offset\t{}", self.offset)?;
        writeln!(f, "data-length\t{}", self.byte_depth)?;
        writeln!(f, "data-type\t{}", self.data_type.name())?;
        writeln!(f, "byte-order\t{}", self.byte_order.name())?;
        writeln!(f, "record-by\t{}", self.record_by.name())
    }
}

// =============================================================================
// Tests
// =============================================================================
