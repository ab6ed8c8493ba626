//! SPC single-spectrum files (little-endian, fixed layout).
//!
//! ```text
//! 0x000  f32   file version
//! 0x010  u16   year, then u8 day, month, minute, hour, hundredths, second
//! 0x018  i32   file size
//! 0x01C  i32   channel data start (0 means 0xF00)
//! 0x040  [256] label, NUL padded
//! 0x17C  f32   eV per channel
//! 0x1A2  u16   element count, then 48 x u16 atomic numbers
//! 0x3D0  f32   kV, tilt, take-off, elevation, azimuth, live, real, probe nA,
//!              stage X/Y/Z (µm), magnification, working distance (mm)
//! 0x404  i32   channel count
//! 0x408  f32   zero offset (eV)
//! 0x40C  i16   detector type, i16 window type, u16 reserved
//! 0x412  u16   stage validity bits (X, Y, Z, tilt, rotation)
//! 0x414  f32   stage rotation
//! data   i32 x channel count
//! ```

use std::io::Cursor;

use chrono::NaiveDate;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::io::{BinaryReader, ByteOrder};
use crate::spectrum::{
    Calibration, DecodeWarning, Decoded, Element, PropertyId, Spectrum, SpectrumProperties,
    StageAxis, StagePosition,
};

use super::detect::SNIFF_PREFIX_LEN;

pub mod offsets {
    pub const VERSION: u64 = 0x000;
    pub const DATE: u64 = 0x010;
    pub const FILE_SIZE: u64 = 0x018;
    pub const DATA_START: u64 = 0x01C;
    pub const LABEL: u64 = 0x040;
    pub const LABEL_LEN: usize = 256;
    pub const EV_PER_CHANNEL: u64 = 0x17C;
    pub const ELEMENT_COUNT: u64 = 0x1A2;
    pub const ELEMENTS: u64 = 0x1A4;
    pub const ELEMENT_SLOTS: usize = 48;
    pub const ACQUISITION: u64 = 0x3D0;
    pub const ELEVATION: u64 = 0x3DC;
    pub const AZIMUTH: u64 = 0x3E0;
    pub const CHANNEL_COUNT: u64 = 0x404;
    pub const DETECTOR: u64 = 0x40C;
    pub const STAGE_FLAGS: u64 = 0x412;
    pub const HEADER_END: u64 = 0x418;

    /// Data start written by firmware that leaves the field zero.
    pub const DEFAULT_DATA_START: u64 = 0xF00;
    /// Lowest data start that does not overlap the header.
    pub const MIN_DATA_START: u64 = 0x420;
}

/// Largest channel count any SPC writer produces.
pub const MAX_CHANNELS: usize = 16384;

const STAGE_X: u16 = 1 << 0;
const STAGE_Y: u16 = 1 << 1;
const STAGE_Z: u16 = 1 << 2;
const STAGE_TILT: u16 = 1 << 3;
const STAGE_ROTATION: u16 = 1 << 4;

fn detector_name(code: i16) -> Option<&'static str> {
    match code {
        1 => Some("SiLi"),
        2 => Some("Ge"),
        3 => Some("SDD"),
        _ => None,
    }
}

fn window_name(code: i16) -> Option<&'static str> {
    match code {
        1 => Some("Be"),
        2 => Some("Ultra-thin polymer"),
        3 => Some("Windowless"),
        _ => None,
    }
}

// =============================================================================
// Sniff
// =============================================================================

/// Header plausibility check.
///
/// A buffer of [`SNIFF_PREFIX_LEN`] or more bytes may be a prefix of a longer
/// file, so the data block is only required to fit in shorter buffers.
pub fn sniff(bytes: &[u8]) -> bool {
    let le = ByteOrder::LittleEndian;
    let field = |offset: u64| le.f32_at(bytes, offset as usize);
    let (Some(version), Some(data_start), Some(channels), Some(elevation), Some(azimuth)) = (
        field(offsets::VERSION),
        le.i32_at(bytes, offsets::DATA_START as usize),
        le.i32_at(bytes, offsets::CHANNEL_COUNT as usize),
        field(offsets::ELEVATION),
        field(offsets::AZIMUTH),
    ) else {
        return false;
    };

    let data_start = match data_start {
        0 => offsets::DEFAULT_DATA_START,
        n if n < 0 => return false,
        n => n as u64,
    };
    let maybe_prefix = bytes.len() >= SNIFF_PREFIX_LEN;
    let len = bytes.len() as u64;
    let block_end = data_start + 4 * channels.max(0) as u64;

    (0.1..=10.0).contains(&version)
        && data_start >= offsets::MIN_DATA_START
        && (data_start < len || maybe_prefix)
        && (1..=MAX_CHANNELS as i32).contains(&channels)
        && (-90.0..=90.0).contains(&elevation)
        && (-360.0..=360.0).contains(&azimuth)
        && (block_end <= len || maybe_prefix)
}

// =============================================================================
// Decode
// =============================================================================

struct Acquisition {
    kv: f32,
    tilt: f32,
    elevation: f32,
    azimuth: f32,
    live: f32,
    real: f32,
    probe_na: f32,
    stage_um: [f32; 3],
    magnification: f32,
    working_distance: f32,
}

pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let mut reader = BinaryReader::new(Cursor::new(bytes), ByteOrder::LittleEndian)?;
    let mut props = SpectrumProperties::new();
    let mut warnings = Vec::new();

    let version = reader.read_f32()?;
    reader.skip(offsets::DATE - 4)?;
    debug_assert_eq!(reader.position(), offsets::DATE);

    // Date and time
    let year = reader.read_u16()?;
    let day = reader.read_u8()?;
    let month = reader.read_u8()?;
    let minute = reader.read_u8()?;
    let hour = reader.read_u8()?;
    let hundredths = reader.read_u8()?;
    let second = reader.read_u8()?;
    debug_assert_eq!(reader.position(), offsets::FILE_SIZE);
    if year != 0 {
        let timestamp = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .and_then(|d| {
                d.and_hms_milli_opt(
                    hour as u32,
                    minute as u32,
                    second as u32,
                    hundredths as u32 * 10,
                )
            });
        match timestamp {
            Some(t) => props.set_timestamp(PropertyId::AcquisitionTime, t)?,
            None => Decoded::warn(
                &mut warnings,
                DecodeWarning::OmittedValue {
                    field: "acquisition date",
                    value: format!(
                        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                        year, month, day, hour, minute, second
                    ),
                },
            ),
        }
    }

    let file_size = reader.read_i32()?;
    if file_size > 0 && file_size as u64 != reader.len() {
        tracing::debug!(file_size, actual = reader.len(), "SPC file size field disagrees");
    }
    let data_start = match reader.read_i32()? {
        0 => offsets::DEFAULT_DATA_START,
        n if n > 0 && n as u64 >= offsets::MIN_DATA_START => n as u64,
        n => {
            return Err(DecodeError::structural(
                offsets::DATA_START,
                "data start",
                format!(">= {:#x}", offsets::MIN_DATA_START),
                n,
            ))
        }
    };
    debug_assert_eq!(reader.position(), offsets::DATA_START + 4);

    reader.seek_to(offsets::LABEL)?;
    let label = reader.read_fixed_string(offsets::LABEL_LEN)?;
    if !label.is_empty() {
        props.set_text(PropertyId::Title, label)?;
    }

    reader.seek_to(offsets::EV_PER_CHANNEL)?;
    let ev_per_channel = reader.read_f32()? as f64;

    // Element list
    reader.seek_to(offsets::ELEMENT_COUNT)?;
    let element_count = reader.read_u16()? as usize;
    let mut slots = [0u16; offsets::ELEMENT_SLOTS];
    for slot in slots.iter_mut() {
        *slot = reader.read_u16()?;
    }
    debug_assert_eq!(
        reader.position(),
        offsets::ELEMENTS + 2 * offsets::ELEMENT_SLOTS as u64
    );
    let mut elements = Vec::new();
    for &z in slots.iter().take(element_count.min(offsets::ELEMENT_SLOTS)) {
        if z == 0 {
            continue;
        }
        match Element::from_atomic_number(z as u32) {
            Some(el) if !elements.contains(&el) => elements.push(el),
            Some(_) => {}
            None => Decoded::warn(
                &mut warnings,
                DecodeWarning::Unparsable {
                    field: "element".to_string(),
                    value: z.to_string(),
                },
            ),
        }
    }
    if !elements.is_empty() {
        props.set_elements(elements)?;
    }

    // Acquisition block
    reader.seek_to(offsets::ACQUISITION)?;
    let kv = reader.read_f32()?;
    let tilt = reader.read_f32()?;
    let _take_off = reader.read_f32()?;
    let acq = Acquisition {
        kv,
        tilt,
        elevation: reader.read_f32()?,
        azimuth: reader.read_f32()?,
        live: reader.read_f32()?,
        real: reader.read_f32()?,
        probe_na: reader.read_f32()?,
        stage_um: [reader.read_f32()?, reader.read_f32()?, reader.read_f32()?],
        magnification: reader.read_f32()?,
        working_distance: reader.read_f32()?,
    };
    debug_assert_eq!(reader.position(), offsets::CHANNEL_COUNT);

    let channel_count = reader.read_i32()?;
    if !(1..=MAX_CHANNELS as i32).contains(&channel_count) {
        return Err(DecodeError::InvalidValue {
            field: "channel count",
            value: channel_count.to_string(),
        });
    }
    let channel_count = channel_count as usize;
    let zero_offset = reader.read_f32()? as f64;
    debug_assert_eq!(reader.position(), offsets::DETECTOR);

    let detector = reader.read_i16()?;
    let window = reader.read_i16()?;
    reader.skip(2)?;
    debug_assert_eq!(reader.position(), offsets::STAGE_FLAGS);
    let stage_flags = reader.read_u16()?;
    let rotation = reader.read_f32()?;
    debug_assert_eq!(reader.position(), offsets::HEADER_END);

    apply_acquisition(&mut props, &acq, config, &mut warnings)?;
    if let Some(name) = detector_name(detector) {
        props.set_text(PropertyId::DetectorType, name)?;
    }
    if let Some(name) = window_name(window) {
        props.set_text(PropertyId::WindowType, name)?;
    }

    let mut stage = StagePosition::new();
    let axes = [(STAGE_X, StageAxis::X), (STAGE_Y, StageAxis::Y), (STAGE_Z, StageAxis::Z)];
    for ((bit, axis), um) in axes.into_iter().zip(acq.stage_um) {
        if stage_flags & bit != 0 {
            stage.set(axis, um as f64 / 1000.0);
        }
    }
    if stage_flags & STAGE_TILT != 0 {
        stage.set(StageAxis::T, acq.tilt as f64);
    }
    if stage_flags & STAGE_ROTATION != 0 {
        stage.set(StageAxis::R, rotation as f64);
    }
    if !stage.is_empty() {
        props.set_stage(stage)?;
    }

    // Channel data
    let available = reader.len().saturating_sub(data_start) / 4;
    let needed = channel_count as u64;
    if available < needed {
        if config.strict || available == 0 {
            return Err(DecodeError::Truncated {
                offset: data_start,
                needed: needed * 4,
                available: reader.len().saturating_sub(data_start),
            });
        }
        Decoded::warn(
            &mut warnings,
            DecodeWarning::ChannelShortfall {
                declared: channel_count,
                found: available as usize,
            },
        );
    }
    reader.seek_to(data_start)?;
    let mut channels = vec![0.0; channel_count];
    for slot in channels.iter_mut().take(available.min(needed) as usize) {
        *slot = reader.read_i32()? as f64;
    }
    let clamped = Spectrum::clamped_count(&channels);
    if clamped > 0 {
        Decoded::warn(&mut warnings, DecodeWarning::ClampedChannels(clamped));
    }

    let width = if ev_per_channel > 0.0 {
        ev_per_channel
    } else {
        Decoded::warn(
            &mut warnings,
            DecodeWarning::OmittedValue {
                field: "eV per channel",
                value: ev_per_channel.to_string(),
            },
        );
        Calibration::default().width_ev
    };
    tracing::debug!(version, channel_count, width, "decoded SPC header");

    let spectrum =
        Spectrum::new(channels, Calibration::new(zero_offset, width)).with_properties(props);
    Ok(Decoded::single(spectrum, warnings))
}

fn apply_acquisition(
    props: &mut SpectrumProperties,
    acq: &Acquisition,
    config: &DecodeConfig,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<(), DecodeError> {
    let positive = [
        (PropertyId::BeamEnergy, acq.kv),
        (PropertyId::LiveTime, acq.live),
        (PropertyId::RealTime, acq.real),
        (PropertyId::ProbeCurrent, acq.probe_na),
        (PropertyId::Magnification, acq.magnification),
        (PropertyId::WorkingDistance, acq.working_distance),
    ];
    for (id, value) in positive {
        if value.is_finite() && value > 0.0 {
            props.set_number(id, value as f64)?;
        }
    }

    let elevation = acq.elevation as f64;
    if elevation.is_finite() && elevation != 0.0 {
        let elevation = match config.correct_elevation(elevation) {
            Some(replacement) => {
                Decoded::warn(
                    warnings,
                    DecodeWarning::CorrectedValue {
                        field: "elevation",
                        found: elevation,
                        replacement,
                    },
                );
                replacement
            }
            None => elevation,
        };
        props.set_number(PropertyId::Elevation, elevation)?;
    }
    if acq.azimuth.is_finite() && acq.azimuth != 0.0 {
        props.set_number(PropertyId::Azimuth, acq.azimuth as f64)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
