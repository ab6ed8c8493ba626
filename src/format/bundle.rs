//! Record bundle files: many spectra of equal length in one big-endian file.
//!
//! ```text
//! header (64 bytes)
//!   0x00  "RBND"
//!   0x04  u16 version, u16 record count
//!   0x08  u32 channels per record
//!   0x0C  u32 record length (160 + 2 * channels)
//! record
//!   0x00  [32] name, NUL padded
//!   0x20  f64 beam keV, live s, real s, probe nA, eV/channel, zero offset eV
//!   0x50  u32 seconds since 1904-01-01 (0 = unknown)
//!   0x54  u16 composition count, then 12 x (u8 Z, f32 mass fraction)
//!   0x9C  f32 count scale (0 = 1.0)
//!   0xA0  u16 counts x channels
//! ```

use std::io::Cursor;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::io::{BinaryReader, BinaryWriter, ByteOrder};
use crate::spectrum::{
    Calibration, Composition, DecodeWarning, Decoded, Element, FractionKind, PropertyId, Spectrum,
    SpectrumProperties,
};

pub const MAGIC: &[u8; 4] = b"RBND";
pub const VERSION: u16 = 1;

pub mod offsets {
    pub const HEADER_LEN: u64 = 64;
    pub const RECORD_COUNT: u64 = 0x06;
    pub const RECORD_LENGTH: u64 = 0x0C;

    // Relative to the start of a record
    pub const NAME_LEN: usize = 32;
    pub const ACQUISITION: u64 = 0x20;
    pub const TIMESTAMP: u64 = 0x50;
    pub const COMPOSITION: u64 = 0x54;
    pub const COMPOSITION_SLOTS: usize = 12;
    pub const COUNT_SCALE: u64 = 0x9C;
    pub const CHANNELS: u64 = 0xA0;
}

/// Byte length of one record holding `channels` counts.
pub fn record_len(channels: u32) -> u64 {
    offsets::CHANNELS + 2 * channels as u64
}

fn epoch_1904() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1904, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

// =============================================================================
// Sniff
// =============================================================================

pub fn sniff(prefix: &[u8]) -> bool {
    prefix.get(..4) == Some(MAGIC.as_slice())
}

// =============================================================================
// Decode
// =============================================================================

pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let mut reader = BinaryReader::new(Cursor::new(bytes), ByteOrder::BigEndian)?;
    let magic = reader.read_fully(4)?;
    if magic != MAGIC.as_slice() {
        return Err(DecodeError::InvalidMagic {
            expected: "RBND".to_string(),
            found: hex::encode(&magic),
        });
    }
    let version = reader.read_u16()?;
    if version != VERSION {
        return Err(DecodeError::InvalidValue {
            field: "bundle version",
            value: version.to_string(),
        });
    }
    let declared = reader.read_u16()? as usize;
    let channels = reader.read_u32()?;
    let record_length = reader.read_u32()? as u64;
    debug_assert_eq!(reader.position(), offsets::RECORD_LENGTH + 4);

    if channels == 0 {
        return Err(DecodeError::InvalidValue {
            field: "channels per record",
            value: "0".to_string(),
        });
    }
    if record_length != record_len(channels) {
        return Err(DecodeError::structural(
            offsets::RECORD_LENGTH,
            "record length",
            record_len(channels),
            record_length,
        ));
    }

    let body = reader.len().saturating_sub(offsets::HEADER_LEN);
    let complete = ((body / record_length) as usize).min(declared);
    let mut warnings = Vec::new();
    if complete < declared {
        if config.strict || complete == 0 {
            let start = offsets::HEADER_LEN + complete as u64 * record_length;
            return Err(DecodeError::Truncated {
                offset: start,
                needed: record_length,
                available: reader.len().saturating_sub(start),
            });
        }
        Decoded::warn(
            &mut warnings,
            DecodeWarning::TruncatedRecords { declared, complete },
        );
    }

    let mut spectra = Vec::with_capacity(complete);
    for index in 0..complete {
        let start = offsets::HEADER_LEN + index as u64 * record_length;
        let spectrum = read_record(&mut reader, start, channels as usize, &mut warnings)?;
        spectra.push(spectrum);
    }
    tracing::debug!(records = spectra.len(), channels, "decoded record bundle");

    Ok(Decoded { spectra, warnings })
}

fn read_record(
    reader: &mut BinaryReader<Cursor<&[u8]>>,
    start: u64,
    channels: usize,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Spectrum, DecodeError> {
    reader.seek_to(start)?;
    let mut props = SpectrumProperties::new();

    let name = reader.read_fixed_string(offsets::NAME_LEN)?;
    if !name.is_empty() {
        props.set_text(PropertyId::Title, name)?;
    }
    debug_assert_eq!(reader.position(), start + offsets::ACQUISITION);

    let kev = reader.read_f64()?;
    let live = reader.read_f64()?;
    let real = reader.read_f64()?;
    let probe = reader.read_f64()?;
    let width = reader.read_f64()?;
    let offset = reader.read_f64()?;
    for (id, value) in [
        (PropertyId::BeamEnergy, kev),
        (PropertyId::LiveTime, live),
        (PropertyId::RealTime, real),
        (PropertyId::ProbeCurrent, probe),
    ] {
        if value.is_finite() && value > 0.0 {
            props.set_number(id, value)?;
        }
    }
    debug_assert_eq!(reader.position(), start + offsets::TIMESTAMP);

    let seconds = reader.read_u32()?;
    if seconds != 0 {
        if let Some(t) = TimeDelta::try_seconds(seconds as i64).map(|d| epoch_1904() + d) {
            props.set_timestamp(PropertyId::AcquisitionTime, t)?;
        }
    }
    debug_assert_eq!(reader.position(), start + offsets::COMPOSITION);

    let count = reader.read_u16()? as usize;
    if count > offsets::COMPOSITION_SLOTS {
        return Err(DecodeError::structural(
            start + offsets::COMPOSITION,
            "composition count",
            format!("<= {}", offsets::COMPOSITION_SLOTS),
            count,
        ));
    }
    let mut composition = Composition::new(FractionKind::Mass);
    let mut composition_ok = true;
    for slot in 0..offsets::COMPOSITION_SLOTS {
        let z = reader.read_u8()?;
        let fraction = reader.read_f32()? as f64;
        if slot >= count || z == 0 {
            continue;
        }
        let inserted = Element::from_atomic_number(z as u32)
            .map(|el| composition.insert(el, fraction).is_ok())
            .unwrap_or(false);
        if !inserted {
            composition_ok = false;
            Decoded::warn(
                warnings,
                DecodeWarning::Unparsable {
                    field: "composition".to_string(),
                    value: format!("Z={} fraction={}", z, fraction),
                },
            );
        }
    }
    if composition_ok && !composition.is_empty() {
        props.set_composition(PropertyId::StandardComposition, composition)?;
    }

    reader.seek_to(start + offsets::COUNT_SCALE)?;
    let scale = match reader.read_f32()? as f64 {
        s if s == 0.0 => 1.0,
        s => s,
    };
    debug_assert_eq!(reader.position(), start + offsets::CHANNELS);

    let mut counts = Vec::with_capacity(channels);
    for _ in 0..channels {
        counts.push(reader.read_u16()? as f64 * scale);
    }
    let clamped = Spectrum::clamped_count(&counts);
    if clamped > 0 {
        Decoded::warn(warnings, DecodeWarning::ClampedChannels(clamped));
    }

    let width = if width.is_finite() && width > 0.0 {
        width
    } else {
        Decoded::warn(
            warnings,
            DecodeWarning::OmittedValue {
                field: "eV per channel",
                value: width.to_string(),
            },
        );
        Calibration::default().width_ev
    };
    let offset = if offset.is_finite() { offset } else { 0.0 };

    Ok(Spectrum::new(counts, Calibration::new(offset, width)).with_properties(props))
}

// =============================================================================
// Encode
// =============================================================================

/// Encode spectra of equal length as a record bundle.
///
/// Counts above `u16::MAX` or with fractional parts are stored with a
/// per-record scale, so they come back approximately.
pub fn encode(spectra: &[Spectrum]) -> Result<Vec<u8>, DecodeError> {
    let channels = spectra.first().map(Spectrum::channel_count).unwrap_or(0);
    if channels == 0 || spectra.iter().any(|s| s.channel_count() != channels) {
        return Err(DecodeError::InvalidValue {
            field: "channels per record",
            value: "records must be non-empty and of equal length".to_string(),
        });
    }
    let count = u16::try_from(spectra.len()).map_err(|_| DecodeError::InvalidValue {
        field: "record count",
        value: spectra.len().to_string(),
    })?;
    let channels = u32::try_from(channels).map_err(|_| DecodeError::InvalidValue {
        field: "channels per record",
        value: channels.to_string(),
    })?;

    let mut w = BinaryWriter::new(Vec::new(), ByteOrder::BigEndian);
    w.write_bytes(MAGIC)?;
    w.write_u16(VERSION)?;
    w.write_u16(count)?;
    w.write_u32(channels)?;
    w.write_u32(record_len(channels) as u32)?;
    w.pad_to(offsets::HEADER_LEN)?;

    for (index, spectrum) in spectra.iter().enumerate() {
        let start = offsets::HEADER_LEN + index as u64 * record_len(channels);
        write_record(&mut w, start, spectrum)?;
    }
    Ok(w.into_inner())
}

fn write_record(
    w: &mut BinaryWriter<Vec<u8>>,
    start: u64,
    spectrum: &Spectrum,
) -> Result<(), DecodeError> {
    let props = spectrum.properties();
    let cal = spectrum.calibration();

    w.write_fixed_string(props.text(PropertyId::Title).unwrap_or(""), offsets::NAME_LEN)?;
    for id in [
        PropertyId::BeamEnergy,
        PropertyId::LiveTime,
        PropertyId::RealTime,
        PropertyId::ProbeCurrent,
    ] {
        w.write_f64(props.number(id).unwrap_or(0.0))?;
    }
    w.write_f64(cal.width_ev)?;
    w.write_f64(cal.offset_ev)?;

    let seconds = props
        .timestamp(PropertyId::AcquisitionTime)
        .map(|t| (t - epoch_1904()).num_seconds())
        .and_then(|s| u32::try_from(s).ok())
        .unwrap_or(0);
    w.write_u32(seconds)?;

    let slots: Vec<(Element, f64)> = props
        .composition(PropertyId::StandardComposition)
        .map(|c| c.iter().collect())
        .unwrap_or_default();
    if slots.len() > offsets::COMPOSITION_SLOTS {
        return Err(DecodeError::InvalidValue {
            field: "composition",
            value: format!(
                "{} elements, at most {} fit",
                slots.len(),
                offsets::COMPOSITION_SLOTS
            ),
        });
    }
    w.write_u16(slots.len() as u16)?;
    for slot in 0..offsets::COMPOSITION_SLOTS {
        let (z, fraction) = slots
            .get(slot)
            .map(|(el, f)| (el.atomic_number(), *f as f32))
            .unwrap_or((0, 0.0));
        w.write_u8(z)?;
        w.write_f32(fraction)?;
    }

    w.pad_to(start + offsets::COUNT_SCALE)?;
    let max = spectrum.channels().iter().copied().fold(0.0, f64::max);
    let scale = if spectrum.is_integral() && max <= u16::MAX as f64 {
        1.0
    } else {
        max / u16::MAX as f64
    };
    w.write_f32(scale as f32)?;
    for value in spectrum.channels() {
        let stored = (value / scale).round().clamp(0.0, u16::MAX as f64) as u16;
        w.write_u16(stored)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
