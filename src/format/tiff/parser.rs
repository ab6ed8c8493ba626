//! TIFF header and directory parsing.
//!
//! # Classic TIFF header (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD
//! ```
//!
//! # IFD layout
//! ```text
//! u16              entry count N
//! N x 12 bytes     entries (tag u16, type u16, count u32, value/offset u32)
//! u32              offset of next IFD (0 terminates the chain)
//! ```

use std::collections::HashSet;

use crate::error::TiffError;
use crate::io::ByteOrder;

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF (recognised only to reject it)
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of one directory entry
pub const IFD_ENTRY_SIZE: usize = 12;

/// Smallest directory that can carry a tag: count, one entry, next offset.
pub const MIN_IFD_SIZE: usize = 2 + IFD_ENTRY_SIZE + 4;

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
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
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 (BigTIFF included)
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Read as little-endian because we're checking for specific byte patterns
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);
        if version != VERSION_TIFF {
            if version == VERSION_BIGTIFF {
                tracing::debug!("BigTIFF containers are not used for spectra");
            }
            return Err(TiffError::InvalidVersion(version));
        }

        let first_ifd_offset = byte_order.read_u32(&bytes[4..8]) as u64;
        if first_ifd_offset < TIFF_HEADER_SIZE as u64 || first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            first_ifd_offset,
        })
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One 12-byte directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Raw tag number
    pub tag: u16,

    /// Decoded field type, `None` for types this parser does not know
    pub field_type: Option<FieldType>,

    /// Raw field type number
    pub field_type_raw: u16,

    /// Number of values
    pub count: u32,

    /// The 4-byte value/offset field exactly as stored
    pub value_offset_bytes: [u8; 4],
}

impl IfdEntry {
    fn parse(bytes: &[u8], byte_order: ByteOrder) -> Self {
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let mut value_offset_bytes = [0u8; 4];
        value_offset_bytes.copy_from_slice(&bytes[8..12]);
        IfdEntry {
            tag: byte_order.read_u16(&bytes[0..2]),
            field_type: FieldType::from_u16(field_type_raw),
            field_type_raw,
            count: byte_order.read_u32(&bytes[4..8]),
            value_offset_bytes,
        }
    }

    /// Total byte size of the value, `None` for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|ft| ft.size_in_bytes() as u64 * self.count as u64)
    }

    /// Whether the value lives in the entry itself.
    pub fn is_inline(&self) -> bool {
        self.field_type
            .map(|ft| ft.fits_inline(self.count as u64))
            .unwrap_or(false)
    }

    /// Offset of an out-of-line value.
    #[inline]
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        byte_order.read_u32(&self.value_offset_bytes) as u64
    }

    /// Single SHORT or LONG stored inline.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// Offset the directory was read from
    pub offset: u64,

    /// Entries in file order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next directory, 0 at the end of the chain
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Parse the directory at `offset`.
    pub fn parse(bytes: &[u8], offset: u64, byte_order: ByteOrder) -> Result<Self, TiffError> {
        let start = usize::try_from(offset).map_err(|_| TiffError::InvalidIfdOffset(offset))?;
        let count = byte_order
            .u16_at(bytes, start)
            .ok_or(TiffError::InvalidIfdOffset(offset))? as usize;

        let entries_start = start + 2;
        let entries_end = entries_start + count * IFD_ENTRY_SIZE;
        let table = bytes
            .get(entries_start..entries_end)
            .ok_or(TiffError::FileTooSmall {
                required: entries_end as u64 + 4,
                actual: bytes.len() as u64,
            })?;
        let next_ifd_offset = byte_order
            .u32_at(bytes, entries_end)
            .ok_or(TiffError::FileTooSmall {
                required: entries_end as u64 + 4,
                actual: bytes.len() as u64,
            })? as u64;

        let entries = table
            .chunks_exact(IFD_ENTRY_SIZE)
            .map(|raw| IfdEntry::parse(raw, byte_order))
            .collect();

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
        })
    }

    /// Find the entry for a known tag.
    pub fn get(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag.as_u16())
    }

    pub fn has(&self, tag: TiffTag) -> bool {
        self.get(tag).is_some()
    }
}

/// Walk the directory chain starting at the header's first IFD.
///
/// The walk stops at a zero next-offset. A revisited offset, an offset
/// outside the file, or more directories than `file_len / MIN_IFD_SIZE`
/// could physically hold is an error.
pub fn read_ifd_chain(bytes: &[u8], header: &TiffHeader) -> Result<Vec<Ifd>, TiffError> {
    let file_len = bytes.len() as u64;
    let max_ifds = (bytes.len() / MIN_IFD_SIZE).max(1);
    let mut visited = HashSet::new();
    let mut ifds = Vec::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if offset >= file_len {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        if !visited.insert(offset) || ifds.len() >= max_ifds {
            return Err(TiffError::ChainLoop(ifds.len()));
        }
        let ifd = Ifd::parse(bytes, offset, header.byte_order)?;
        tracing::debug!(
            offset,
            entries = ifd.entries.len(),
            next = ifd.next_ifd_offset,
            "read TIFF directory"
        );
        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}

// =============================================================================
// Tests
// =============================================================================
