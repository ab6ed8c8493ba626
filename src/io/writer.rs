//! Scalar writer with a selectable byte order, the inverse of
//! [`BinaryReader`](super::BinaryReader).

use std::io::{self, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use super::endian::ByteOrder;

/// Writes scalars in a fixed byte order and tracks the bytes written.
pub struct BinaryWriter<W> {
    inner: W,
    order: ByteOrder,
    position: u64,
}

macro_rules! scalar_write {
    ($name:ident, $ty:ty, $size:expr) => {
        pub fn $name(&mut self, value: $ty) -> io::Result<()> {
            match self.order {
                ByteOrder::LittleEndian => self.inner.$name::<LittleEndian>(value)?,
                ByteOrder::BigEndian => self.inner.$name::<BigEndian>(value)?,
            }
            self.position += $size;
            Ok(())
        }
    };
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W, order: ByteOrder) -> Self {
        Self {
            inner,
            order,
            position: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    scalar_write!(write_u16, u16, 2);
    scalar_write!(write_i16, i16, 2);
    scalar_write!(write_u32, u32, 4);
    scalar_write!(write_i32, i32, 4);
    scalar_write!(write_u64, u64, 8);
    scalar_write!(write_i64, i64, 8);
    scalar_write!(write_f32, f32, 4);
    scalar_write!(write_f64, f64, 8);

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write `n` zero bytes.
    pub fn pad(&mut self, n: usize) -> io::Result<()> {
        const ZEROS: [u8; 64] = [0; 64];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(ZEROS.len());
            self.write_bytes(&ZEROS[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }

    /// Pad with zeros up to an absolute offset.
    pub fn pad_to(&mut self, offset: u64) -> io::Result<()> {
        if offset < self.position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("already at {}, cannot pad back to {}", self.position, offset),
            ));
        }
        self.pad((offset - self.position) as usize)
    }

    /// Write a string as a fixed-width, NUL-padded Latin-1 field.
    ///
    /// Characters outside Latin-1 become `?`; the field is truncated to `n`.
    pub fn write_fixed_string(&mut self, s: &str, n: usize) -> io::Result<()> {
        let mut raw: Vec<u8> = s
            .chars()
            .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
            .take(n)
            .collect();
        raw.resize(n, 0);
        self.write_bytes(&raw)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
