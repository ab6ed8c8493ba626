//! Exporter round-trips.
//!
//! Tests verify:
//! - Each writer's output is detected as its own format and decodes back
//! - Calibration and the properties a format can carry are preserved
//! - Conversions between formats keep the channel data intact

use std::fs;

use tempfile::TempDir;

use eds_io::format::{bundle, csv_text, dump, emsa, sectioned, tiff_spectrum};
use eds_io::{
    open_bytes, open_path, Calibration, CubeFile, CubeHeader, DataType, DecodeConfig, Spectrum,
    PropertyId, SpectrumFormat, SpectrumLibrary, StageAxis,
};

use super::test_utils::{
    assert_close, element, keyword_spectrum, sample_spectrum, stage, timestamp,
};

fn reopen(bytes: &[u8], expected: SpectrumFormat) -> Spectrum {
    let (format, decoded) = open_bytes(bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(format, expected);
    decoded.spectra.into_iter().next().unwrap()
}

fn assert_core_preserved(got: &Spectrum, original: &Spectrum) {
    assert_eq!(got.channels(), original.channels());
    assert_eq!(got.calibration(), original.calibration());
    let (p, q) = (got.properties(), original.properties());
    for id in [
        PropertyId::BeamEnergy,
        PropertyId::LiveTime,
        PropertyId::RealTime,
        PropertyId::ProbeCurrent,
    ] {
        assert_eq!(p.number(id), q.number(id), "{}", id);
    }
    assert_eq!(
        p.timestamp(PropertyId::AcquisitionTime),
        q.timestamp(PropertyId::AcquisitionTime)
    );
}

// =============================================================================
// Per-format
// =============================================================================

#[test]
fn test_emsa_roundtrip() {
    let mut original = sample_spectrum();
    original
        .properties_mut()
        .set_stage(stage(1.5, -2.0, 30.0))
        .unwrap();

    let mut bytes = Vec::new();
    emsa::write(&original, &mut bytes).unwrap();
    let got = reopen(&bytes, SpectrumFormat::Emsa);

    assert_core_preserved(&got, &original);
    let p = got.properties();
    assert_eq!(p.text(PropertyId::Title), Some("K411 glass"));
    let comp = p.composition(PropertyId::StandardComposition).unwrap();
    assert_eq!(comp.fraction(element("Fe")), Some(0.5));
    let st = p.stage().unwrap();
    assert_eq!(st.get(StageAxis::X), Some(1.5));
    assert_eq!(st.get(StageAxis::Y), Some(-2.0));
    assert_eq!(st.get(StageAxis::T), Some(30.0));
}

#[test]
fn test_emsa_keeps_property_bag() {
    let original = keyword_spectrum();
    let mut bytes = Vec::new();
    emsa::write(&original, &mut bytes).unwrap();

    let (format, decoded) = open_bytes(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::Emsa);
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    let got = decoded.first().unwrap();
    assert_eq!(got.properties(), original.properties());
    assert!(!got.properties().contains(PropertyId::Title));
    assert_eq!(got, &original);
}

#[test]
fn test_tiff_keeps_property_bag() {
    let original = keyword_spectrum();
    let bytes = tiff_spectrum::encode(std::slice::from_ref(&original)).unwrap();

    let (format, decoded) = open_bytes(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::TiffSpectrum);
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    assert_eq!(decoded.first().unwrap(), &original);
}

#[test]
fn test_tiff_roundtrip() {
    let original = sample_spectrum();
    let bytes = tiff_spectrum::encode(std::slice::from_ref(&original)).unwrap();
    let got = reopen(&bytes, SpectrumFormat::TiffSpectrum);
    assert_core_preserved(&got, &original);
}

#[test]
fn test_sectioned_roundtrip() {
    let mut original = sample_spectrum();
    original
        .properties_mut()
        .set_stage(stage(0.25, 0.5, -10.0))
        .unwrap();
    let bytes = sectioned::encode(&original).unwrap();
    let got = reopen(&bytes, SpectrumFormat::Sectioned);

    assert_core_preserved(&got, &original);
    assert_eq!(got.properties().stage(), original.properties().stage());
    assert_eq!(
        got.properties().composition(PropertyId::StandardComposition),
        original.properties().composition(PropertyId::StandardComposition)
    );
}

#[test]
fn test_bundle_roundtrip_many() {
    let mut second = sample_spectrum();
    second
        .properties_mut()
        .set_timestamp(PropertyId::AcquisitionTime, timestamp(1999, 12, 31, 23, 59, 59))
        .unwrap();
    let originals = vec![sample_spectrum(), second];

    let bytes = bundle::encode(&originals).unwrap();
    let (format, decoded) = open_bytes(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::RecordBundle);
    assert_eq!(decoded.len(), 2);
    for (got, original) in decoded.spectra.iter().zip(&originals) {
        assert_core_preserved(got, original);
    }
}

#[test]
fn test_bundle_large_counts_scaled() {
    let original = Spectrum::new(vec![0.0, 100_000.0, 250_000.0], Calibration::default());
    let bytes = bundle::encode(std::slice::from_ref(&original)).unwrap();
    let got = reopen(&bytes, SpectrumFormat::RecordBundle);
    for (a, b) in got.channels().iter().zip(original.channels()) {
        // One step of the 16-bit scale
        assert_close(*a, *b, 250_000.0 / 65_535.0);
    }
}

#[test]
fn test_csv_roundtrip() {
    let original = sample_spectrum();
    let mut bytes = Vec::new();
    csv_text::write(&original, &mut bytes).unwrap();
    let got = reopen(&bytes, SpectrumFormat::Csv);
    assert_eq!(got.channels(), original.channels());
    assert_eq!(got.calibration(), original.calibration());
}

#[test]
fn test_dump_roundtrip() {
    let original = sample_spectrum();
    let mut bytes = Vec::new();
    dump::write(&original, &mut bytes).unwrap();
    assert_eq!(bytes.len(), 4 * original.channel_count());

    let got = dump::read(&bytes, original.calibration()).unwrap();
    assert_eq!(got.channels(), original.channels());
}

// =============================================================================
// Conversions
// =============================================================================

#[test]
fn test_spc_to_emsa_via_files() {
    let dir = TempDir::new().unwrap();
    let spc_path = dir.path().join("in.spc");
    fs::write(&spc_path, super::test_utils::SpcBuilder::default().build()).unwrap();

    let (format, decoded) = open_path(&spc_path, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::Spc);
    let spectrum = decoded.first().unwrap();

    let msa_path = dir.path().join("out.msa");
    emsa::write(spectrum, fs::File::create(&msa_path).unwrap()).unwrap();

    let (format, again) = open_path(&msa_path, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::Emsa);
    let again = again.first().unwrap();
    assert_eq!(again.channels(), spectrum.channels());
    assert_eq!(
        again.properties().elements(),
        spectrum.properties().elements()
    );
    assert_eq!(
        again.properties().number(PropertyId::BeamEnergy),
        Some(25.0)
    );
}

#[test]
fn test_library_serves_repeated_lookups() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("s.edsx");
    fs::write(&path, sectioned::encode(&sample_spectrum()).unwrap()).unwrap();

    let library = SpectrumLibrary::default();
    let first = library.entry(&path).unwrap();
    let second = library.get(&path).unwrap();
    assert_eq!(first.format, SpectrumFormat::Sectioned);
    assert!(std::sync::Arc::ptr_eq(&first.decoded, &second));
}

#[test]
fn test_cube_sum_to_emsa() {
    let dir = TempDir::new().unwrap();
    let header = CubeHeader::new(2, 2, 4, 4, DataType::Float);
    let rpl = dir.path().join("m.rpl");
    let raw = dir.path().join("m.raw");

    let mut cube = CubeFile::create(&rpl, &raw, header).unwrap();
    for _ in 0..4 {
        cube.write_floats(&[1.0, 2.5, 0.0, 4.0]).unwrap();
    }
    let sum = cube.sum_spectrum(Calibration::new(0.0, 20.0)).unwrap();
    cube.close().unwrap();
    assert_eq!(sum.channels(), &[4.0, 10.0, 0.0, 16.0]);

    let mut bytes = Vec::new();
    emsa::write(&sum, &mut bytes).unwrap();
    let got = reopen(&bytes, SpectrumFormat::Emsa);
    assert_eq!(got.channels(), sum.channels());
}
