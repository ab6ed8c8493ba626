//! Headerless binary dump: little-endian `i32` per channel.
//!
//! The file carries no calibration or metadata, so nothing can sniff it and
//! the reader takes the calibration from the caller.

use std::io::{self, Cursor, Write};

use crate::error::DecodeError;
use crate::io::{BinaryReader, BinaryWriter, ByteOrder};
use crate::spectrum::{Calibration, Spectrum};

/// Write rounded counts. Counts beyond `i32::MAX` are an error.
pub fn write<W: Write>(spectrum: &Spectrum, out: W) -> Result<(), DecodeError> {
    let mut w = BinaryWriter::new(out, ByteOrder::LittleEndian);
    for (i, value) in spectrum.channels().iter().enumerate() {
        let rounded = value.round();
        if rounded > i32::MAX as f64 {
            return Err(DecodeError::InvalidValue {
                field: "channel count",
                value: format!("channel {} holds {}", i, value),
            });
        }
        w.write_i32(rounded as i32)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read(bytes: &[u8], calibration: Calibration) -> Result<Spectrum, DecodeError> {
    if bytes.len() % 4 != 0 {
        return Err(DecodeError::structural(
            (bytes.len() - bytes.len() % 4) as u64,
            "dump length",
            "multiple of 4",
            bytes.len(),
        ));
    }
    let mut reader = BinaryReader::new(Cursor::new(bytes), ByteOrder::LittleEndian)?;
    let channels = (0..bytes.len() / 4)
        .map(|_| reader.read_i32().map(f64::from))
        .collect::<io::Result<Vec<f64>>>()?;
    Ok(Spectrum::new(channels, calibration))
}
