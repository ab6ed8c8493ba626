//! Random-access cube file handle.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::CubeError;
use crate::io::ByteOrder;
use crate::spectrum::{Calibration, ObjectValue, PropertyId, PropertyValue, Spectrum};

use super::header::{CubeHeader, DataType};

/// One element as stored, before any widening.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scalar {
    Int(i64),
    Float(f64),
}

/// The depth values of one pixel.
#[derive(Debug, Clone, PartialEq)]
pub enum CubeItem {
    Ints(Vec<i64>),
    Floats(Vec<f64>),
}

impl CubeItem {
    pub fn len(&self) -> usize {
        match self {
            CubeItem::Ints(v) => v.len(),
            CubeItem::Floats(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            CubeItem::Ints(v) => v.iter().map(|&i| i as f64).collect(),
            CubeItem::Floats(v) => v.clone(),
        }
    }
}

// =============================================================================
// CubeFile
// =============================================================================

/// An open cube with a single `(row, col, depth)` cursor.
///
/// The cursor moves depth first, then column, then row. It reaches the
/// structural end `(height, 0, 0)` after the last element, regardless of
/// any trailing bytes in the raw file.
pub struct CubeFile {
    header: CubeHeader,
    raw: File,
    raw_path: PathBuf,
    writable: bool,
    /// Elements before the cursor
    cursor: u64,
    total: u64,
}

impl CubeFile {
    /// Open an existing cube read-only. The raw file must be exactly the
    /// size the header implies.
    pub fn open(header_path: impl AsRef<Path>, raw_path: impl AsRef<Path>) -> Result<Self, CubeError> {
        let text = fs::read_to_string(header_path.as_ref())?;
        let header = CubeHeader::parse(&text)?;
        let raw = File::open(raw_path.as_ref())?;
        let actual = raw.metadata()?.len();
        let expected = header.raw_len().unwrap_or(u64::MAX);
        if actual != expected {
            return Err(CubeError::SizeMismatch { expected, actual });
        }
        tracing::debug!(
            width = header.width,
            height = header.height,
            depth = header.depth,
            "opened cube"
        );
        Self::with_handle(header, raw, raw_path.as_ref(), false)
    }

    /// Write `header` and create a zero-filled raw file sized to match.
    pub fn create(
        header_path: impl AsRef<Path>,
        raw_path: impl AsRef<Path>,
        header: CubeHeader,
    ) -> Result<Self, CubeError> {
        header.validate()?;
        fs::write(header_path.as_ref(), header.to_text())?;
        let raw = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(raw_path.as_ref())?;
        raw.set_len(header.raw_len().unwrap_or(0))?;
        Self::with_handle(header, raw, raw_path.as_ref(), true)
    }

    fn with_handle(
        header: CubeHeader,
        raw: File,
        raw_path: &Path,
        writable: bool,
    ) -> Result<Self, CubeError> {
        let mut cube = Self {
            total: header.element_count().unwrap_or(0),
            header,
            raw,
            raw_path: raw_path.to_path_buf(),
            writable,
            cursor: 0,
        };
        cube.sync_stream()?;
        Ok(cube)
    }

    pub fn header(&self) -> &CubeHeader {
        &self.header
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    // -------------------------------------------------------------------------
    // Cursor
    // -------------------------------------------------------------------------

    /// Current `(row, col, depth)`.
    pub fn position(&self) -> (usize, usize, usize) {
        if self.cursor >= self.total {
            return (self.header.height, 0, 0);
        }
        let depth = self.header.depth as u64;
        let row_len = self.header.width as u64 * depth;
        let row = self.cursor / row_len;
        let rem = self.cursor % row_len;
        (row as usize, (rem / depth) as usize, (rem % depth) as usize)
    }

    /// Move to `(row, col, depth)`. `(height, 0, 0)` is the end position.
    pub fn seek(&mut self, row: usize, col: usize, depth: usize) -> Result<(), CubeError> {
        let h = &self.header;
        let at_end = (row, col, depth) == (h.height, 0, 0);
        if !at_end && (row >= h.height || col >= h.width || depth >= h.depth) {
            return Err(CubeError::OutOfBounds { row, col, depth });
        }
        self.cursor = if at_end {
            self.total
        } else {
            (row as u64 * h.width as u64 + col as u64) * h.depth as u64 + depth as u64
        };
        self.sync_stream()
    }

    /// Advance by `n` elements, carrying depth into column and column into
    /// row. Stops at the end position.
    pub fn increment(&mut self, n: u64) -> Result<(), CubeError> {
        self.cursor = self.cursor.saturating_add(n).min(self.total);
        self.sync_stream()
    }

    /// Cursor is at `(height, 0, 0)`.
    pub fn is_eof(&self) -> bool {
        self.cursor >= self.total
    }

    fn sync_stream(&mut self) -> Result<(), CubeError> {
        let at = self.header.offset + self.cursor * self.header.byte_depth as u64;
        self.raw.seek(SeekFrom::Start(at))?;
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.total - self.cursor.min(self.total)
    }

    // -------------------------------------------------------------------------
    // Element codec
    // -------------------------------------------------------------------------

    fn decode(&self, raw: &[u8]) -> Result<Scalar, CubeError> {
        let order = self.header.effective_byte_order();
        let value = match (self.header.data_type, self.header.byte_depth) {
            (DataType::Signed, 1) => Scalar::Int(raw[0] as i8 as i64),
            (DataType::Unsigned, 1) => Scalar::Int(raw[0] as i64),
            (DataType::Signed, 2) => Scalar::Int(order.read_u16(raw) as i16 as i64),
            (DataType::Unsigned, 2) => Scalar::Int(order.read_u16(raw) as i64),
            (DataType::Signed, 4) => Scalar::Int(order.read_u32(raw) as i32 as i64),
            (DataType::Unsigned, 4) => Scalar::Int(order.read_u32(raw) as i64),
            (DataType::Signed, 8) => Scalar::Int(order.read_u64(raw) as i64),
            (DataType::Float, 4) => Scalar::Float(order.read_f32(raw) as f64),
            (DataType::Float, 8) => Scalar::Float(order.read_f64(raw)),
            (data_type, byte_depth) => {
                return Err(CubeError::UnsupportedCombination {
                    data_type: data_type.name(),
                    byte_depth,
                })
            }
        };
        Ok(value)
    }

    fn encode(&self, value: Scalar, out: &mut Vec<u8>) -> Result<(), CubeError> {
        macro_rules! put {
            ($v:expr) => {
                match self.header.effective_byte_order() {
                    ByteOrder::LittleEndian => out.extend_from_slice(&$v.to_le_bytes()),
                    ByteOrder::BigEndian => out.extend_from_slice(&$v.to_be_bytes()),
                }
            };
        }
        let h = &self.header;
        match (value, h.data_type, h.byte_depth) {
            (Scalar::Int(_), DataType::Float, _) => {
                return Err(CubeError::TypeMismatch {
                    operation: "write an integer",
                    data_type: h.data_type.name(),
                });
            }
            (Scalar::Float(_), DataType::Signed | DataType::Unsigned, _) => {
                return Err(CubeError::TypeMismatch {
                    operation: "write a float",
                    data_type: h.data_type.name(),
                });
            }
            (Scalar::Int(v), data_type, byte_depth) => {
                if !fits(v, data_type, byte_depth) {
                    return Err(CubeError::ValueOutOfRange {
                        value: v,
                        byte_depth,
                        data_type: data_type.name(),
                    });
                }
                match byte_depth {
                    1 => out.push(v as u8),
                    2 => put!(v as u16),
                    4 => put!(v as u32),
                    _ => put!(v),
                }
            }
            (Scalar::Float(v), _, 4) => put!(v as f32),
            (Scalar::Float(v), _, _) => put!(v),
        }
        Ok(())
    }

    fn read_scalars(&mut self, n: usize) -> Result<Vec<Scalar>, CubeError> {
        if n as u64 > self.remaining() {
            return Err(CubeError::EndOfCube);
        }
        let size = self.header.byte_depth;
        let mut buf = vec![0u8; n * size];
        self.raw.read_exact(&mut buf)?;
        self.cursor += n as u64;
        buf.chunks_exact(size).map(|raw| self.decode(raw)).collect()
    }

    fn write_scalars(&mut self, values: impl IntoIterator<Item = Scalar>) -> Result<(), CubeError> {
        if !self.writable {
            return Err(CubeError::ReadOnly);
        }
        let mut buf = Vec::new();
        let mut n = 0u64;
        for value in values {
            self.encode(value, &mut buf)?;
            n += 1;
        }
        if n > self.remaining() {
            return Err(CubeError::EndOfCube);
        }
        self.raw.write_all(&buf)?;
        self.cursor += n;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Read one integer element. Float cubes refuse.
    pub fn read_int(&mut self) -> Result<i64, CubeError> {
        Ok(self.read_ints(1)?[0])
    }

    /// Read one element, widening integers.
    pub fn read_float(&mut self) -> Result<f64, CubeError> {
        Ok(self.read_floats(1)?[0])
    }

    pub fn read_ints(&mut self, n: usize) -> Result<Vec<i64>, CubeError> {
        if self.header.data_type.is_float() {
            return Err(CubeError::TypeMismatch {
                operation: "read integers",
                data_type: self.header.data_type.name(),
            });
        }
        self.read_scalars(n)?
            .into_iter()
            .map(|s| match s {
                Scalar::Int(v) => Ok(v),
                Scalar::Float(_) => Err(CubeError::TypeMismatch {
                    operation: "read integers",
                    data_type: DataType::Float.name(),
                }),
            })
            .collect()
    }

    pub fn read_floats(&mut self, n: usize) -> Result<Vec<f64>, CubeError> {
        Ok(self
            .read_scalars(n)?
            .into_iter()
            .map(|s| match s {
                Scalar::Int(v) => v as f64,
                Scalar::Float(v) => v,
            })
            .collect())
    }

    /// All depth values at `(row, col)`, in the cube's own type.
    pub fn read_item(&mut self, row: usize, col: usize) -> Result<CubeItem, CubeError> {
        self.seek(row, col, 0)?;
        let depth = self.header.depth;
        if self.header.data_type.is_float() {
            Ok(CubeItem::Floats(self.read_floats(depth)?))
        } else {
            Ok(CubeItem::Ints(self.read_ints(depth)?))
        }
    }

    // -------------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------------

    pub fn write_int(&mut self, value: i64) -> Result<(), CubeError> {
        self.write_ints(&[value])
    }

    pub fn write_float(&mut self, value: f64) -> Result<(), CubeError> {
        self.write_floats(&[value])
    }

    pub fn write_ints(&mut self, values: &[i64]) -> Result<(), CubeError> {
        self.write_scalars(values.iter().map(|&v| Scalar::Int(v)))
    }

    pub fn write_floats(&mut self, values: &[f64]) -> Result<(), CubeError> {
        self.write_scalars(values.iter().map(|&v| Scalar::Float(v)))
    }

    /// Write all depth values at `(row, col)`.
    pub fn write_item(&mut self, row: usize, col: usize, item: &CubeItem) -> Result<(), CubeError> {
        if item.len() != self.header.depth {
            return Err(CubeError::InvalidValue {
                key: "depth",
                value: format!("item holds {} values", item.len()),
            });
        }
        self.seek(row, col, 0)?;
        match item {
            CubeItem::Ints(v) => self.write_ints(v),
            CubeItem::Floats(v) => self.write_floats(v),
        }
    }

    /// Flush pending writes and release the handle.
    pub fn close(mut self) -> Result<(), CubeError> {
        if self.writable {
            self.raw.flush()?;
            self.raw.sync_all()?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Spectra
    // -------------------------------------------------------------------------

    /// The pixel at `(row, col)` as a spectrum.
    pub fn spectrum_at(
        &mut self,
        row: usize,
        col: usize,
        calibration: Calibration,
    ) -> Result<Spectrum, CubeError> {
        let counts = self.read_item(row, col)?.to_f64();
        let mut spectrum = Spectrum::new(counts, calibration);
        let props = spectrum.properties_mut();
        props.set_text(PropertyId::SourceFile, self.raw_path.display().to_string())?;
        props.set(
            PropertyId::PixelPosition,
            PropertyValue::Object(ObjectValue::Pixel { row, col }),
        )?;
        Ok(spectrum)
    }

    /// Sum of every pixel. Leaves the cursor at the end.
    pub fn sum_spectrum(&mut self, calibration: Calibration) -> Result<Spectrum, CubeError> {
        let depth = self.header.depth;
        let mut sums = vec![0.0; depth];
        self.seek(0, 0, 0)?;
        for _ in 0..self.header.height {
            let row = self.read_floats(self.header.width * depth)?;
            for pixel in row.chunks_exact(depth) {
                for (sum, v) in sums.iter_mut().zip(pixel) {
                    *sum += v;
                }
            }
        }
        let mut spectrum = Spectrum::new(sums, calibration);
        spectrum
            .properties_mut()
            .set_text(PropertyId::SourceFile, self.raw_path.display().to_string())?;
        Ok(spectrum)
    }
}

/// Whether `value` is representable in the element type.
fn fits(value: i64, data_type: DataType, byte_depth: usize) -> bool {
    let bits = 8 * byte_depth as u32;
    match data_type {
        DataType::Signed if bits >= 64 => true,
        DataType::Signed => {
            let half = 1i64 << (bits - 1);
            (-half..half).contains(&value)
        }
        DataType::Unsigned => value >= 0 && (value as u64) < (1u64 << bits.min(63)),
        DataType::Float => false,
    }
}

// =============================================================================
// Tests
// =============================================================================
