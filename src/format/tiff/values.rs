//! TIFF tag value reading.
//!
//! Values are stored inline in the IFD entry when they fit in four bytes and
//! at an offset in the file otherwise. Every out-of-line read is bounds
//! checked against the buffer before slicing.

use crate::error::TiffError;
use crate::io::ByteOrder;

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from an in-memory TIFF file.
pub struct ValueReader<'a> {
    bytes: &'a [u8],
    header: &'a TiffHeader,
}

impl<'a> ValueReader<'a> {
    pub fn new(bytes: &'a [u8], header: &'a TiffHeader) -> Self {
        Self { bytes, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// The whole file, for strip data addressed by offset arrays.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Raw bytes of an entry's value, inline or at its offset.
    pub fn read_bytes<'e>(&self, entry: &'e IfdEntry) -> Result<&'e [u8], TiffError>
    where
        'a: 'e,
    {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline() {
            return Ok(&entry.value_offset_bytes[..size as usize]);
        }

        let offset = entry.value_offset(self.header.byte_order);
        let out_of_bounds = TiffError::ValueOutOfBounds {
            tag: entry.tag,
            offset,
            len: size,
        };
        let end = offset.checked_add(size).ok_or(out_of_bounds.clone())?;
        if end > self.bytes.len() as u64 {
            return Err(out_of_bounds);
        }
        Ok(&self.bytes[offset as usize..end as usize])
    }

    /// Read a single SHORT or LONG value.
    pub fn read_u32(&self, entry: &IfdEntry) -> Result<u32, TiffError> {
        if let Some(value) = entry.inline_u32(self.header.byte_order) {
            return Ok(value);
        }
        let values = self.read_u32_array(entry)?;
        match values.as_slice() {
            [v] => Ok(*v),
            _ => Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            }),
        }
    }

    /// Read an array of BYTE, SHORT or LONG values.
    pub fn read_u32_array(&self, entry: &IfdEntry) -> Result<Vec<u32>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let bytes = self.read_bytes(entry)?;
        let order = self.header.byte_order;

        let values = match field_type {
            FieldType::Byte => bytes.iter().map(|&b| b as u32).collect(),
            FieldType::Short => bytes
                .chunks_exact(2)
                .map(|c| order.read_u16(c) as u32)
                .collect(),
            FieldType::Long => bytes.chunks_exact(4).map(|c| order.read_u32(c)).collect(),
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag: tag_name(entry),
                    message: format!("expected Byte, Short or Long, got {:?}", other),
                })
            }
        };
        Ok(values)
    }

    /// Read any numeric array widened to `f64`.
    ///
    /// Spectrum counts are written by different vendors as SHORT, LONG,
    /// FLOAT or DOUBLE; signed and rational types are accepted as well.
    pub fn read_f64_array(&self, entry: &IfdEntry) -> Result<Vec<f64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let bytes = self.read_bytes(entry)?;
        let order = self.header.byte_order;

        let values = match field_type {
            FieldType::Byte => bytes.iter().map(|&b| b as f64).collect(),
            FieldType::SByte => bytes.iter().map(|&b| b as i8 as f64).collect(),
            FieldType::Short => bytes
                .chunks_exact(2)
                .map(|c| order.read_u16(c) as f64)
                .collect(),
            FieldType::SShort => bytes
                .chunks_exact(2)
                .map(|c| order.read_u16(c) as i16 as f64)
                .collect(),
            FieldType::Long => bytes
                .chunks_exact(4)
                .map(|c| order.read_u32(c) as f64)
                .collect(),
            FieldType::SLong => bytes
                .chunks_exact(4)
                .map(|c| order.read_u32(c) as i32 as f64)
                .collect(),
            FieldType::Float => bytes
                .chunks_exact(4)
                .map(|c| order.read_f32(c) as f64)
                .collect(),
            FieldType::Double => bytes.chunks_exact(8).map(|c| order.read_f64(c)).collect(),
            FieldType::Rational => bytes
                .chunks_exact(8)
                .map(|c| ratio(order.read_u32(&c[..4]) as f64, order.read_u32(&c[4..]) as f64))
                .collect(),
            FieldType::SRational => bytes
                .chunks_exact(8)
                .map(|c| {
                    ratio(
                        order.read_u32(&c[..4]) as i32 as f64,
                        order.read_u32(&c[4..]) as i32 as f64,
                    )
                })
                .collect(),
            FieldType::Ascii | FieldType::Undefined => {
                return Err(TiffError::InvalidTagValue {
                    tag: tag_name(entry),
                    message: format!("expected a numeric type, got {:?}", field_type),
                })
            }
        };
        Ok(values)
    }

    /// Read an ASCII value. The NUL terminator and anything after it are
    /// dropped; bytes are interpreted as Latin-1.
    pub fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if !matches!(field_type, FieldType::Ascii | FieldType::Undefined) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }
        let bytes = self.read_bytes(entry)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(bytes[..end].iter().map(|&b| b as char).collect())
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

fn tag_name(entry: &IfdEntry) -> &'static str {
    super::tags::TiffTag::from_u16(entry.tag)
        .map(|t| t.name())
        .unwrap_or("unknown")
}

// =============================================================================
// Tests
// =============================================================================
