//! Golden unit-conversion tests for the fixed-layout binary formats.
//!
//! Tests verify:
//! - SPC stage coordinates in µm become mm and angles pass through
//! - Record bundle timestamps count seconds from 1904 and counts are scaled
//! - EDSX timestamps are Unix milliseconds and stage masks select axes
//! - Truncated multi-record files decode partially unless strict

use eds_io::format::{bundle, sectioned, spc};
use eds_io::io::{BinaryWriter, ByteOrder};
use eds_io::{DecodeConfig, DecodeError, DecodeWarning, PropertyId, StageAxis};

use super::test_utils::{assert_close, element, sample_spectrum, timestamp, SpcBuilder};

fn strict() -> DecodeConfig {
    DecodeConfig {
        strict: true,
        ..DecodeConfig::default()
    }
}

// =============================================================================
// SPC
// =============================================================================

#[test]
fn test_spc_golden_units() {
    let bytes = SpcBuilder::default().build();
    let decoded = spc::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(s.calibration().width_ev, 5.0);
    assert_eq!(s.calibration().offset_ev, 0.0);

    let p = s.properties();
    assert_eq!(p.number(PropertyId::BeamEnergy), Some(25.0));
    assert_eq!(p.number(PropertyId::LiveTime), Some(100.0));
    assert_eq!(p.number(PropertyId::RealTime), Some(110.0));
    assert_eq!(p.number(PropertyId::Elevation), Some(30.0));
    assert_eq!(p.text(PropertyId::Title), Some("quartz"));
    assert_eq!(p.text(PropertyId::DetectorType), Some("SiLi"));
    assert_eq!(p.text(PropertyId::WindowType), Some("Ultra-thin polymer"));
    assert_eq!(
        p.timestamp(PropertyId::AcquisitionTime),
        Some(timestamp(2018, 11, 7, 16, 30, 12))
    );

    let stage = p.stage().unwrap();
    assert_close(stage.get(StageAxis::X).unwrap(), 2.5, 1e-9);
    assert_close(stage.get(StageAxis::Y).unwrap(), -1.25, 1e-9);
    assert_close(stage.get(StageAxis::Z).unwrap(), 10.0, 1e-9);
    assert_eq!(stage.get(StageAxis::T), None);

    assert_eq!(p.elements().unwrap(), &[element("Si"), element("O")]);
}

#[test]
fn test_spc_stage_flags_select_axes() {
    let bytes = SpcBuilder {
        stage_flags: 0b010,
        ..Default::default()
    }
    .build();
    let decoded = spc::decode(&bytes, &DecodeConfig::default()).unwrap();
    let stage = decoded.first().unwrap().properties().stage().unwrap().clone();
    assert_eq!(stage.get(StageAxis::X), None);
    assert_close(stage.get(StageAxis::Y).unwrap(), -1.25, 1e-9);
}

#[test]
fn test_spc_known_bad_elevation() {
    let bytes = SpcBuilder {
        elevation: 57.0,
        ..Default::default()
    }
    .build();

    let corrected = spc::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(
        corrected.first().unwrap().properties().number(PropertyId::Elevation),
        Some(37.0)
    );
    assert_eq!(corrected.warnings.len(), 1);

    let raw = spc::decode(&bytes, &DecodeConfig::without_corrections()).unwrap();
    assert_eq!(
        raw.first().unwrap().properties().number(PropertyId::Elevation),
        Some(57.0)
    );
    assert!(raw.warnings.is_empty());
}

#[test]
fn test_spc_without_channel_data_is_truncated() {
    let mut bytes = SpcBuilder::default().build();
    bytes.truncate(spc::offsets::DEFAULT_DATA_START as usize);
    assert!(matches!(
        spc::decode(&bytes, &DecodeConfig::default()),
        Err(DecodeError::Truncated { .. })
    ));
}

// =============================================================================
// Record bundle
// =============================================================================

/// One record with hand-picked values, written field by field.
fn golden_bundle(seconds: u32, scale: f32) -> Vec<u8> {
    use bundle::offsets;

    let channels = 3u32;
    let mut w = BinaryWriter::new(Vec::new(), ByteOrder::BigEndian);
    w.write_bytes(bundle::MAGIC).unwrap();
    w.write_u16(bundle::VERSION).unwrap();
    w.write_u16(1).unwrap();
    w.write_u32(channels).unwrap();
    w.write_u32(bundle::record_len(channels) as u32).unwrap();
    w.pad_to(offsets::HEADER_LEN).unwrap();

    w.write_fixed_string("NIST SRM 470", offsets::NAME_LEN).unwrap();
    // keV, live, real, nA, eV/channel, zero offset
    for v in [20.0, 50.0, 61.0, 0.5, 10.0, -30.0] {
        w.write_f64(v).unwrap();
    }
    w.write_u32(seconds).unwrap();
    w.write_u16(2).unwrap();
    for (z, f) in [(26u8, 0.5f32), (28, 0.25)] {
        w.write_u8(z).unwrap();
        w.write_f32(f).unwrap();
    }
    w.pad_to(offsets::HEADER_LEN + offsets::COUNT_SCALE).unwrap();
    w.write_f32(scale).unwrap();
    for c in [7u16, 0, 65535] {
        w.write_u16(c).unwrap();
    }
    w.into_inner()
}

#[test]
fn test_bundle_golden_units() {
    // 1904 is a leap year
    let bytes = golden_bundle(366 * 86_400 + 3_661, 0.0);
    let decoded = bundle::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.len(), 1);

    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[7.0, 0.0, 65535.0]);
    assert_eq!(s.calibration().width_ev, 10.0);
    assert_eq!(s.calibration().offset_ev, -30.0);

    let p = s.properties();
    assert_eq!(p.text(PropertyId::Title), Some("NIST SRM 470"));
    assert_eq!(p.number(PropertyId::BeamEnergy), Some(20.0));
    assert_eq!(p.number(PropertyId::ProbeCurrent), Some(0.5));
    assert_eq!(
        p.timestamp(PropertyId::AcquisitionTime),
        Some(timestamp(1905, 1, 1, 1, 1, 1))
    );

    let comp = p.composition(PropertyId::StandardComposition).unwrap();
    assert_eq!(comp.fraction(element("Fe")), Some(0.5));
    assert_eq!(comp.fraction(element("Ni")), Some(0.25));
}

#[test]
fn test_bundle_scale_and_zero_time() {
    let bytes = golden_bundle(0, 0.5);
    let decoded = bundle::decode(&bytes, &DecodeConfig::default()).unwrap();
    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[3.5, 0.0, 32767.5]);
    assert!(!s.properties().contains(PropertyId::AcquisitionTime));
}

#[test]
fn test_bundle_truncated_records() {
    let spectra = vec![sample_spectrum(); 3];
    let mut bytes = bundle::encode(&spectra).unwrap();
    bytes.truncate(bytes.len() - 5);

    let decoded = bundle::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.warnings.contains(&DecodeWarning::TruncatedRecords {
        declared: 3,
        complete: 2
    }));

    match bundle::decode(&bytes, &strict()) {
        Err(DecodeError::Truncated { offset, .. }) => {
            assert_eq!(
                offset,
                bundle::offsets::HEADER_LEN + 2 * bundle::record_len(8)
            );
        }
        other => panic!("expected truncation error, got {:?}", other),
    }
}

#[test]
fn test_bundle_bad_magic() {
    let mut bytes = golden_bundle(0, 1.0);
    bytes[0] = b'X';
    assert!(matches!(
        bundle::decode(&bytes, &DecodeConfig::default()),
        Err(DecodeError::InvalidMagic { .. })
    ));
}

// =============================================================================
// Sectioned EDSX
// =============================================================================

fn section(w: &mut BinaryWriter<Vec<u8>>, id: &[u8; 4], payload: &[u8]) {
    w.write_bytes(id).unwrap();
    w.write_u32(payload.len() as u32).unwrap();
    w.write_bytes(payload).unwrap();
}

fn le_payload(build: impl FnOnce(&mut BinaryWriter<Vec<u8>>)) -> Vec<u8> {
    let mut p = BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian);
    build(&mut p);
    p.into_inner()
}

#[test]
fn test_sectioned_golden_units() {
    use sectioned::ids;

    let mut w = BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian);
    w.write_bytes(sectioned::MAGIC).unwrap();
    w.write_u16(sectioned::VERSION).unwrap();
    w.write_u16(5).unwrap();

    // Sections out of their usual order
    section(
        &mut w,
        &ids::CHANNELS,
        &le_payload(|p| {
            p.write_u32(4).unwrap();
            for c in [9u32, 8, 7, 6] {
                p.write_u32(c).unwrap();
            }
        }),
    );
    section(
        &mut w,
        &ids::CALIBRATION,
        &le_payload(|p| {
            p.write_f64(5.0).unwrap();
            p.write_f64(2.5).unwrap();
        }),
    );
    section(
        &mut w,
        &ids::ACQUISITION,
        &le_payload(|p| {
            for v in [30.0, 0.0, 10.0, 0.0] {
                p.write_f64(v).unwrap();
            }
            p.write_i64(1_600_000_000_000).unwrap();
        }),
    );
    section(
        &mut w,
        &ids::STAGE,
        &le_payload(|p| {
            // X and T
            p.write_u8(0b01_0001).unwrap();
            for v in [1.5, 99.0, 99.0, 99.0, 45.0, 99.0] {
                p.write_f64(v).unwrap();
            }
        }),
    );
    section(&mut w, &ids::END, &[]);

    let decoded = sectioned::decode(&w.into_inner(), &DecodeConfig::default()).unwrap();
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[9.0, 8.0, 7.0, 6.0]);
    assert_eq!(s.calibration().offset_ev, 5.0);
    assert_eq!(s.calibration().width_ev, 2.5);

    let p = s.properties();
    assert_eq!(p.number(PropertyId::LiveTime), Some(30.0));
    assert_eq!(p.number(PropertyId::BeamEnergy), Some(10.0));
    assert!(!p.contains(PropertyId::RealTime));
    assert_eq!(
        p.timestamp(PropertyId::AcquisitionTime),
        Some(timestamp(2020, 9, 13, 12, 26, 40))
    );

    let stage = p.stage().unwrap();
    assert_eq!(stage.get(StageAxis::X), Some(1.5));
    assert_eq!(stage.get(StageAxis::T), Some(45.0));
    assert_eq!(stage.get(StageAxis::Y), None);
}

#[test]
fn test_sectioned_unknown_section_warns_and_continues() {
    let mut w = BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian);
    w.write_bytes(sectioned::MAGIC).unwrap();
    w.write_u16(sectioned::VERSION).unwrap();
    w.write_u16(2).unwrap();
    section(&mut w, b"XTRA", &[1, 2, 3]);
    section(
        &mut w,
        &sectioned::ids::CHANNELS,
        &le_payload(|p| {
            p.write_u32(1).unwrap();
            p.write_u32(42).unwrap();
        }),
    );

    let decoded = sectioned::decode(&w.into_inner(), &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.first().unwrap().channels(), &[42.0]);
    assert!(decoded
        .warnings
        .contains(&DecodeWarning::UnknownTag("XTRA".to_string())));
}
