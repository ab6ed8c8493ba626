//! Byte order handling for slice-based field access.
//!
//! Vendor formats disagree about endianness: TIFF declares it in its header,
//! the SPC and EDSX layouts are little-endian, and the record bundle format
//! inherited big-endian fields from its 68k origins. Every multi-byte value
//! in the crate goes through [`ByteOrder`] so the choice is made exactly once
//! per file.

use byteorder::{BigEndian, ByteOrder as _, LittleEndian};

/// Byte order (endianness) of a binary field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first ("II" = Intel)
    LittleEndian,
    /// Most significant byte first ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Byte order of the machine running this code.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LittleEndian
        } else {
            ByteOrder::BigEndian
        }
    }

    /// Read a u16 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 2 bytes.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u16(bytes),
            ByteOrder::BigEndian => BigEndian::read_u16(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 4 bytes.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u32(bytes),
            ByteOrder::BigEndian => BigEndian::read_u32(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    ///
    /// # Panics
    /// Panics if the slice has fewer than 8 bytes.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => LittleEndian::read_u64(bytes),
            ByteOrder::BigEndian => BigEndian::read_u64(bytes),
        }
    }

    /// Read an IEEE-754 single from a byte slice.
    #[inline]
    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    /// Read an IEEE-754 double from a byte slice.
    #[inline]
    pub fn read_f64(self, bytes: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(bytes))
    }

    /// Checked u16 read at `offset`; `None` when the slice is too short.
    ///
    /// Sniffers use the checked variants so a malformed prefix can never panic.
    #[inline]
    pub fn u16_at(self, bytes: &[u8], offset: usize) -> Option<u16> {
        bytes.get(offset..offset.checked_add(2)?).map(|b| self.read_u16(b))
    }

    /// Checked u32 read at `offset`.
    #[inline]
    pub fn u32_at(self, bytes: &[u8], offset: usize) -> Option<u32> {
        bytes.get(offset..offset.checked_add(4)?).map(|b| self.read_u32(b))
    }

    /// Checked i32 read at `offset`.
    #[inline]
    pub fn i32_at(self, bytes: &[u8], offset: usize) -> Option<i32> {
        self.u32_at(bytes, offset).map(|v| v as i32)
    }

    /// Checked f32 read at `offset`.
    #[inline]
    pub fn f32_at(self, bytes: &[u8], offset: usize) -> Option<f32> {
        self.u32_at(bytes, offset).map(f32::from_bits)
    }

    /// Encode a u16 in this byte order.
    #[inline]
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Encode a u32 in this byte order.
    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}
