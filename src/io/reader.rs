//! Scalar readers over byte sources.
//!
//! Two flavours, matching how the formats are laid out on disk:
//!
//! - [`LeStreamReader`] walks a little-endian stream front to back. It only
//!   needs [`Read`], which makes it suitable for length-prefixed section
//!   formats that never jump backwards.
//! - [`BinaryReader`] is random access with a byte order chosen at
//!   construction. Fixed-offset layouts use it to `seek_to` literal offsets
//!   and `skip` over reserved regions.
//!
//! A short read on any multi-byte scalar is an `UnexpectedEof` I/O error.
//! There is no partial-value recovery.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

use super::endian::ByteOrder;

fn eof(needed: u64, available: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("need {} bytes, {} available", needed, available),
    )
}

// =============================================================================
// LeStreamReader
// =============================================================================

/// Little-endian streaming reader.
pub struct LeStreamReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> LeStreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        let v = self.inner.read_u8()?;
        self.position += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        let v = self.inner.read_u16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> io::Result<i16> {
        let v = self.inner.read_i16::<LittleEndian>()?;
        self.position += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        let v = self.inner.read_u32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> io::Result<i32> {
        let v = self.inner.read_i32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> io::Result<i64> {
        let v = self.inner.read_i64::<LittleEndian>()?;
        self.position += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> io::Result<f32> {
        let v = self.inner.read_f32::<LittleEndian>()?;
        self.position += 4;
        Ok(v)
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        let v = self.inner.read_f64::<LittleEndian>()?;
        self.position += 8;
        Ok(v)
    }

    /// Read a fixed-size tag such as a four-character section id.
    pub fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        self.position += N as u64;
        Ok(buf)
    }

    /// Read exactly `n` bytes.
    pub fn read_fully(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let got = (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        self.position += got as u64;
        if got < n {
            return Err(eof(n as u64, got as u64));
        }
        Ok(buf)
    }

    /// Discard `n` bytes.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.inner).take(n), &mut io::sink())?;
        self.position += skipped;
        if skipped < n {
            return Err(eof(n, skipped));
        }
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

// =============================================================================
// BinaryReader
// =============================================================================

/// Random-access reader with a selectable byte order.
pub struct BinaryReader<R> {
    inner: R,
    order: ByteOrder,
    position: u64,
    len: u64,
}

macro_rules! scalar_read {
    ($name:ident, $ty:ty, $size:expr) => {
        pub fn $name(&mut self) -> io::Result<$ty> {
            self.ensure($size)?;
            let v = match self.order {
                ByteOrder::LittleEndian => self.inner.$name::<LittleEndian>()?,
                ByteOrder::BigEndian => self.inner.$name::<BigEndian>()?,
            };
            self.position += $size;
            Ok(v)
        }
    };
}

impl<R: Read + Seek> BinaryReader<R> {
    /// Wrap a seekable source. The source is rewound to offset 0.
    pub fn new(mut inner: R, order: ByteOrder) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            order,
            position: 0,
            len,
        })
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Switch byte order mid-stream (TIFF declares it after two bytes).
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.position)
    }

    fn ensure(&self, needed: u64) -> io::Result<()> {
        if needed > self.remaining() {
            return Err(eof(needed, self.remaining()));
        }
        Ok(())
    }

    /// Move to an absolute offset. Seeking past the end is an error.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.len {
            return Err(eof(offset, self.len));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        self.position = offset;
        Ok(())
    }

    /// Skip `n` bytes of an unused region.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        let target = self
            .position
            .checked_add(n)
            .ok_or_else(|| eof(n, self.remaining()))?;
        self.seek_to(target)
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.ensure(1)?;
        let v = self.inner.read_u8()?;
        self.position += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> io::Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    scalar_read!(read_u16, u16, 2);
    scalar_read!(read_i16, i16, 2);
    scalar_read!(read_u32, u32, 4);
    scalar_read!(read_i32, i32, 4);
    scalar_read!(read_u64, u64, 8);
    scalar_read!(read_i64, i64, 8);
    scalar_read!(read_f32, f32, 4);
    scalar_read!(read_f64, f64, 8);

    /// Read exactly `n` bytes; fails before allocating if they are not there.
    pub fn read_fully(&mut self, n: usize) -> io::Result<Vec<u8>> {
        self.ensure(n as u64)?;
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        self.position += n as u64;
        Ok(buf)
    }

    /// Read a fixed-width, NUL-padded Latin-1 string field.
    pub fn read_fixed_string(&mut self, n: usize) -> io::Result<String> {
        let raw = self.read_fully(n)?;
        Ok(latin1_until_nul(&raw))
    }
}

/// Decode Latin-1 bytes up to the first NUL, trimming trailing blanks.
pub fn latin1_until_nul(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    raw[..end]
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_end()
        .to_string()
}
