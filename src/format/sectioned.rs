//! EDSX sectioned spectrum files (little-endian, length-prefixed sections).
//!
//! ```text
//! "EDSX"  u16 version  u16 section count
//! section := [id; 4]  u32 payload length  payload
//!
//! CALB  f64 offset eV, f64 width eV
//! CHAN  u32 n, n x u32 counts
//! ACQU  f64 live s, f64 real s, f64 beam kV, f64 probe nA, i64 unix ms
//! STGE  u8 axis mask (bit i = X, Y, Z, R, T, B), 6 x f64
//! COMP  u16 n, n x (u8 Z, f64 mass fraction)
//! NAME  UTF-8 title
//! DESC  UTF-8 description
//! IMAG  PNG or JPEG bytes
//! END   (empty, id "END ")
//! ```
//!
//! Sections may appear in any order. Unknown ids are skipped by length.

use std::io::{self, Cursor};

use chrono::{DateTime, NaiveDateTime};
use image::ImageFormat;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::io::{BinaryWriter, ByteOrder, LeStreamReader};
use crate::spectrum::{
    Calibration, Composition, DecodeWarning, Decoded, Element, FractionKind, PropertyId, Spectrum,
    SpectrumProperties, StageAxis, StagePosition,
};

pub const MAGIC: &[u8; 4] = b"EDSX";
pub const VERSION: u16 = 1;

/// Magic plus version plus section count.
pub const HEADER_LEN: u64 = 8;

/// Four-character section ids.
pub mod ids {
    pub const CALIBRATION: [u8; 4] = *b"CALB";
    pub const CHANNELS: [u8; 4] = *b"CHAN";
    pub const ACQUISITION: [u8; 4] = *b"ACQU";
    pub const STAGE: [u8; 4] = *b"STGE";
    pub const COMPOSITION: [u8; 4] = *b"COMP";
    pub const NAME: [u8; 4] = *b"NAME";
    pub const DESCRIPTION: [u8; 4] = *b"DESC";
    pub const IMAGE: [u8; 4] = *b"IMAG";
    pub const END: [u8; 4] = *b"END ";
}

fn id_text(id: &[u8; 4]) -> String {
    id.iter().map(|&b| b as char).collect()
}

// =============================================================================
// Sniff
// =============================================================================

pub fn sniff(prefix: &[u8]) -> bool {
    prefix.get(..4) == Some(MAGIC.as_slice())
        && ByteOrder::LittleEndian
            .u16_at(prefix, 4)
            .is_some_and(|v| v >= 1)
}

// =============================================================================
// Decode
// =============================================================================

/// Maps a short payload read onto a structural error naming the section.
fn short_payload(offset: u64, id: &[u8; 4]) -> impl Fn(io::Error) -> DecodeError + '_ {
    move |err| DecodeError::Structural {
        offset,
        field: "section payload",
        expected: format!("complete {} payload", id_text(id)),
        found: err.to_string(),
    }
}

pub fn decode(bytes: &[u8], _config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let total = bytes.len() as u64;
    let mut reader = LeStreamReader::new(bytes);

    let magic: [u8; 4] = reader.read_array()?;
    if &magic != MAGIC {
        return Err(DecodeError::InvalidMagic {
            expected: "EDSX".to_string(),
            found: hex::encode(magic),
        });
    }
    let version = reader.read_u16()?;
    let section_count = reader.read_u16()?;
    debug_assert_eq!(reader.position(), HEADER_LEN);
    tracing::debug!(version, section_count, "reading EDSX sections");

    let mut props = SpectrumProperties::new();
    let mut warnings = Vec::new();
    let mut calibration = None;
    let mut counts: Option<Vec<f64>> = None;

    for _ in 0..section_count {
        let start = reader.position();
        let id: [u8; 4] = reader.read_array()?;
        let len = reader.read_u32()? as u64;
        let payload_at = reader.position();
        if payload_at + len > total {
            return Err(DecodeError::structural(
                start,
                "section length",
                format!("<= {}", total - payload_at),
                len,
            ));
        }
        if id == ids::END {
            break;
        }
        let payload = reader.read_fully(len as usize)?;
        debug_assert_eq!(reader.position(), payload_at + len);

        let short = short_payload(payload_at, &id);
        let mut section = LeStreamReader::new(payload.as_slice());
        match id {
            ids::CALIBRATION => {
                let offset = section.read_f64().map_err(&short)?;
                let width = section.read_f64().map_err(&short)?;
                calibration = Some(Calibration::new(offset, width));
            }
            ids::CHANNELS => {
                let n = section.read_u32().map_err(&short)? as u64;
                if 4 + 4 * n != len {
                    return Err(DecodeError::structural(
                        payload_at,
                        "channel count",
                        (len.saturating_sub(4)) / 4,
                        n,
                    ));
                }
                let mut values = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    values.push(section.read_u32().map_err(&short)? as f64);
                }
                counts = Some(values);
            }
            ids::ACQUISITION => {
                for id in [
                    PropertyId::LiveTime,
                    PropertyId::RealTime,
                    PropertyId::BeamEnergy,
                    PropertyId::ProbeCurrent,
                ] {
                    let value = section.read_f64().map_err(&short)?;
                    if value.is_finite() && value > 0.0 {
                        props.set_number(id, value)?;
                    }
                }
                let millis = section.read_i64().map_err(&short)?;
                if millis != 0 {
                    match DateTime::from_timestamp_millis(millis) {
                        Some(t) => props.set_timestamp(PropertyId::AcquisitionTime, t.naive_utc())?,
                        None => Decoded::warn(
                            &mut warnings,
                            DecodeWarning::OmittedValue {
                                field: "acquisition time",
                                value: millis.to_string(),
                            },
                        ),
                    }
                }
            }
            ids::STAGE => {
                let mask = section.read_u8().map_err(&short)?;
                let mut stage = StagePosition::new();
                for (bit, axis) in StageAxis::ALL.into_iter().enumerate() {
                    let value = section.read_f64().map_err(&short)?;
                    if mask & (1 << bit) != 0 {
                        stage.set(axis, value);
                    }
                }
                if !stage.is_empty() {
                    props.set_stage(stage)?;
                }
            }
            ids::COMPOSITION => {
                let n = section.read_u16().map_err(&short)?;
                let mut composition = Composition::new(FractionKind::Mass);
                let mut composition_ok = true;
                for _ in 0..n {
                    let z = section.read_u8().map_err(&short)?;
                    let fraction = section.read_f64().map_err(&short)?;
                    let inserted = Element::from_atomic_number(z as u32)
                        .map(|el| composition.insert(el, fraction).is_ok())
                        .unwrap_or(false);
                    if !inserted {
                        composition_ok = false;
                        Decoded::warn(
                            &mut warnings,
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
            }
            ids::NAME => {
                let text = String::from_utf8_lossy(&payload);
                let text = text.trim_end_matches('\0').trim();
                if !text.is_empty() {
                    props.set_text(PropertyId::Title, text)?;
                }
            }
            ids::DESCRIPTION => {
                let text = String::from_utf8_lossy(&payload);
                props.append_text(PropertyId::SpecimenDescription, text.trim_end_matches('\0'))?;
            }
            ids::IMAGE => match image::load_from_memory(&payload) {
                Ok(img) => props.set_image(PropertyId::MicroImage, img)?,
                Err(err) => Decoded::warn(
                    &mut warnings,
                    DecodeWarning::Unparsable {
                        field: PropertyId::MicroImage.name().to_string(),
                        value: err.to_string(),
                    },
                ),
            },
            other => {
                tracing::debug!(section = %id_text(&other), len, "skipping unknown section");
                warnings.push(DecodeWarning::UnknownTag(id_text(&other)));
            }
        }
    }

    let Some(counts) = counts else {
        return Err(DecodeError::InvalidValue {
            field: "CHAN",
            value: "file has no channel section".to_string(),
        });
    };
    let calibration = calibration.unwrap_or_default();

    Ok(Decoded::single(
        Spectrum::new(counts, calibration).with_properties(props),
        warnings,
    ))
}

// =============================================================================
// Encode
// =============================================================================

fn section(
    w: &mut BinaryWriter<Vec<u8>>,
    id: [u8; 4],
    payload: &[u8],
) -> Result<(), DecodeError> {
    let len = u32::try_from(payload.len()).map_err(|_| DecodeError::InvalidValue {
        field: "section length",
        value: payload.len().to_string(),
    })?;
    w.write_bytes(&id)?;
    w.write_u32(len)?;
    w.write_bytes(payload)?;
    Ok(())
}

fn payload() -> BinaryWriter<Vec<u8>> {
    BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian)
}

fn unix_millis(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp_millis()
}

/// Encode one spectrum. Counts must be whole numbers that fit in `u32`.
pub fn encode(spectrum: &Spectrum) -> Result<Vec<u8>, DecodeError> {
    if !spectrum.is_integral() {
        return Err(DecodeError::InvalidValue {
            field: "CHAN",
            value: "counts must be whole numbers".to_string(),
        });
    }
    let props = spectrum.properties();
    let mut sections: Vec<([u8; 4], Vec<u8>)> = Vec::new();

    if let Some(title) = props.text(PropertyId::Title) {
        sections.push((ids::NAME, title.as_bytes().to_vec()));
    }

    let cal = spectrum.calibration();
    let mut p = payload();
    p.write_f64(cal.offset_ev)?;
    p.write_f64(cal.width_ev)?;
    sections.push((ids::CALIBRATION, p.into_inner()));

    let acquisition = [
        PropertyId::LiveTime,
        PropertyId::RealTime,
        PropertyId::BeamEnergy,
        PropertyId::ProbeCurrent,
    ];
    let timestamp = props.timestamp(PropertyId::AcquisitionTime);
    if timestamp.is_some() || acquisition.iter().any(|id| props.contains(*id)) {
        let mut p = payload();
        for id in acquisition {
            p.write_f64(props.number(id).unwrap_or(0.0))?;
        }
        p.write_i64(timestamp.map(unix_millis).unwrap_or(0))?;
        sections.push((ids::ACQUISITION, p.into_inner()));
    }

    if let Some(stage) = props.stage() {
        let mut p = payload();
        let mask = StageAxis::ALL
            .iter()
            .enumerate()
            .filter(|(_, axis)| stage.get(**axis).is_some())
            .fold(0u8, |m, (bit, _)| m | (1 << bit));
        p.write_u8(mask)?;
        for axis in StageAxis::ALL {
            p.write_f64(stage.get(axis).unwrap_or(0.0))?;
        }
        sections.push((ids::STAGE, p.into_inner()));
    }

    if let Some(comp) = props.composition(PropertyId::StandardComposition) {
        let mut p = payload();
        p.write_u16(comp.len() as u16)?;
        for (el, fraction) in comp.iter() {
            p.write_u8(el.atomic_number())?;
            p.write_f64(fraction)?;
        }
        sections.push((ids::COMPOSITION, p.into_inner()));
    }

    if let Some(desc) = props.text(PropertyId::SpecimenDescription) {
        sections.push((ids::DESCRIPTION, desc.as_bytes().to_vec()));
    }

    if let Some(img) = props.image(PropertyId::MicroImage) {
        let mut png = Cursor::new(Vec::new());
        img.write_to(&mut png, ImageFormat::Png)?;
        sections.push((ids::IMAGE, png.into_inner()));
    }

    let mut p = payload();
    p.write_u32(spectrum.channel_count() as u32)?;
    for value in spectrum.channels() {
        p.write_u32(*value as u32)?;
    }
    sections.push((ids::CHANNELS, p.into_inner()));
    sections.push((ids::END, Vec::new()));

    let mut w = BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian);
    w.write_bytes(MAGIC)?;
    w.write_u16(VERSION)?;
    w.write_u16(sections.len() as u16)?;
    for (id, body) in &sections {
        section(&mut w, *id, body)?;
    }
    Ok(w.into_inner())
}

// =============================================================================
// Tests
// =============================================================================
