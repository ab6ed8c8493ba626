//! Test utilities for integration tests.
//!
//! Every fixture is built byte by byte in code, so the tests never depend
//! on vendor sample files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use eds_io::format::{bundle, csv_text, emsa, sectioned, spc, tiff_spectrum};
use eds_io::io::{BinaryWriter, ByteOrder};
use eds_io::spectrum::FractionKind;
use eds_io::{
    Calibration, Composition, CubeHeader, DataType, Element, PropertyId, Spectrum, SpectrumFormat,
    StageAxis, StagePosition,
};

// =============================================================================
// Spectra
// =============================================================================

/// A spectrum with integral counts and properties every writer can carry.
pub fn sample_spectrum() -> Spectrum {
    let mut s = Spectrum::new(
        vec![0.0, 3.0, 17.0, 250.0, 1200.0, 96.0, 4.0, 0.0],
        Calibration::new(-20.0, 10.0),
    );
    let props = s.properties_mut();
    props.set_text(PropertyId::Title, "K411 glass").unwrap();
    props.set_number(PropertyId::BeamEnergy, 15.0).unwrap();
    props.set_number(PropertyId::LiveTime, 60.0).unwrap();
    props.set_number(PropertyId::RealTime, 72.5).unwrap();
    props.set_number(PropertyId::ProbeCurrent, 1.25).unwrap();
    props
        .set_timestamp(PropertyId::AcquisitionTime, timestamp(2021, 3, 14, 9, 26, 53))
        .unwrap();

    let mut comp = Composition::new(FractionKind::Mass);
    comp.insert(element("Fe"), 0.5).unwrap();
    comp.insert(element("Ni"), 0.25).unwrap();
    props
        .set_composition(PropertyId::StandardComposition, comp)
        .unwrap();
    s
}

/// A spectrum carrying every property the EMSA keyword block can express,
/// with a sub-second timestamp and no title.
pub fn keyword_spectrum() -> Spectrum {
    let mut s = Spectrum::new(
        vec![2.0, 0.0, 41.0, 377.0, 12.0, 1.0],
        Calibration::new(-12.5, 5.0),
    );
    let props = s.properties_mut();
    let time = NaiveDate::from_ymd_opt(2019, 6, 1)
        .unwrap()
        .and_hms_milli_opt(3, 4, 5, 670)
        .unwrap();
    props.set_timestamp(PropertyId::AcquisitionTime, time).unwrap();
    props.set_number(PropertyId::BeamEnergy, 20.0).unwrap();
    props.set_number(PropertyId::LiveTime, 99.75).unwrap();
    props.set_number(PropertyId::RealTime, 120.0).unwrap();
    props.set_number(PropertyId::ProbeCurrent, 0.8).unwrap();
    props.set_number(PropertyId::Magnification, 2500.0).unwrap();
    props.set_number(PropertyId::Elevation, 35.0).unwrap();
    props.set_number(PropertyId::Azimuth, -45.0).unwrap();
    props.set_number(PropertyId::WorkingDistance, 10.5).unwrap();
    props.set_text(PropertyId::Operator, "jd").unwrap();
    props.set_text(PropertyId::Instrument, "SEM-7").unwrap();
    props.set_text(PropertyId::DetectorType, "SDD").unwrap();
    props.set_text(PropertyId::SpecimenName, "K411").unwrap();
    props
        .append_text(PropertyId::SpecimenDescription, "polished")
        .unwrap();
    props
        .append_text(PropertyId::SpecimenDescription, "carbon coated")
        .unwrap();
    props.set_stage(stage(12.25, -3.5, 20.0)).unwrap();
    props
        .set_elements(vec![element("Mg"), element("Si"), element("Fe")])
        .unwrap();

    let mut comp = Composition::new(FractionKind::Mass);
    comp.insert(element("Si"), 0.25).unwrap();
    comp.insert(element("Fe"), 0.125).unwrap();
    props
        .set_composition(PropertyId::StandardComposition, comp)
        .unwrap();
    s
}

pub fn element(symbol: &str) -> Element {
    Element::from_symbol(symbol).unwrap()
}

pub fn timestamp(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

pub fn stage(x: f64, y: f64, tilt: f64) -> StagePosition {
    StagePosition::new()
        .with(StageAxis::X, x)
        .with(StageAxis::Y, y)
        .with(StageAxis::T, tilt)
}

// =============================================================================
// Text fixtures
// =============================================================================

pub const EMSA_SAMPLE: &str = "#FORMAT      : EMSA/MAS Spectral Data File\r\n\
#VERSION     : 1.0\r\n\
#TITLE       : Pure Cu\r\n\
#DATE        : 02-JAN-2020\r\n\
#TIME        : 14:05:00\r\n\
#NPOINTS     : 6\r\n\
#NCOLUMNS    : 1\r\n\
#XUNITS      : eV\r\n\
#YUNITS      : counts\r\n\
#DATATYPE    : Y\r\n\
#XPERCHAN    : 20.0\r\n\
#OFFSET      : -100.0\r\n\
#BEAMKV   -kV: 20.0\r\n\
#LIVETIME  -s: 30.5\r\n\
#ELEVANGLE-dg: 35.0\r\n\
#XPOSITION mm: 12.5\r\n\
#SPECTRUM    : Spectral Data Starts Here\r\n\
0, 12, 804,\r\n\
9561, 77, 3,\r\n\
#ENDOFDATA   :\r\n";

pub const CSV_SAMPLE: &str = "# exported by a line scan tool\n\
Energy (eV),Counts\n\
0,5\n\
10,9\n\
20,14\n\
30,2\n";

// =============================================================================
// SPC builder
// =============================================================================

/// Parameters of a synthetic SPC file. Values are in the file's own units.
pub struct SpcBuilder {
    pub ev_per_channel: f32,
    pub zero_offset: f32,
    pub kv: f32,
    pub live: f32,
    pub real: f32,
    pub elevation: f32,
    pub stage_um: [f32; 3],
    pub stage_flags: u16,
    pub atomic_numbers: Vec<u16>,
    pub channels: Vec<i32>,
}

impl Default for SpcBuilder {
    fn default() -> Self {
        Self {
            ev_per_channel: 5.0,
            zero_offset: 0.0,
            kv: 25.0,
            live: 100.0,
            real: 110.0,
            elevation: 30.0,
            stage_um: [2500.0, -1250.0, 10000.0],
            stage_flags: 0b111,
            atomic_numbers: vec![14, 8],
            channels: vec![1, 2, 3, 4, 5, 6],
        }
    }
}

impl SpcBuilder {
    pub fn build(&self) -> Vec<u8> {
        use spc::offsets;

        let mut w = BinaryWriter::new(Vec::new(), ByteOrder::LittleEndian);
        w.write_f32(0.61).unwrap();
        w.pad_to(offsets::DATE).unwrap();
        w.write_u16(2018).unwrap();
        // day, month, minute, hour, hundredths, second
        for b in [7u8, 11, 30, 16, 0, 12] {
            w.write_u8(b).unwrap();
        }
        w.write_i32(0).unwrap();
        w.write_i32(0).unwrap();
        w.pad_to(offsets::LABEL).unwrap();
        w.write_fixed_string("quartz", offsets::LABEL_LEN).unwrap();
        w.pad_to(offsets::EV_PER_CHANNEL).unwrap();
        w.write_f32(self.ev_per_channel).unwrap();
        w.pad_to(offsets::ELEMENT_COUNT).unwrap();
        w.write_u16(self.atomic_numbers.len() as u16).unwrap();
        for z in &self.atomic_numbers {
            w.write_u16(*z).unwrap();
        }
        w.pad_to(offsets::ACQUISITION).unwrap();
        let [x, y, z] = self.stage_um;
        for v in [
            self.kv,
            0.0,
            0.0,
            self.elevation,
            0.0,
            self.live,
            self.real,
            0.0,
            x,
            y,
            z,
            0.0,
            0.0,
        ] {
            w.write_f32(v).unwrap();
        }
        w.write_i32(self.channels.len() as i32).unwrap();
        w.write_f32(self.zero_offset).unwrap();
        w.write_i16(1).unwrap();
        w.write_i16(2).unwrap();
        w.write_u16(0).unwrap();
        w.write_u16(self.stage_flags).unwrap();
        w.write_f32(0.0).unwrap();
        w.pad_to(offsets::DEFAULT_DATA_START).unwrap();
        for c in &self.channels {
            w.write_i32(*c).unwrap();
        }
        w.into_inner()
    }
}

// =============================================================================
// TIFF builder
// =============================================================================

/// A minimal classic TIFF holding `counts` as LONGs and an EMSA keyword
/// block, written by hand in either byte order.
pub fn tiff_with_counts(order: ByteOrder, counts: &[u32], header: &str) -> Vec<u8> {
    assert!(counts.len() > 1, "single counts would be stored inline");
    let mut text = header.as_bytes().to_vec();
    text.push(0);
    assert!(text.len() > 4, "short headers would be stored inline");

    let entries = 2u16;
    let ifd_len = 2 + 12 * entries as u32 + 4;
    let counts_at = 8 + ifd_len;
    let text_at = counts_at + 4 * counts.len() as u32;

    let mut w = BinaryWriter::new(Vec::new(), order);
    w.write_bytes(match order {
        ByteOrder::LittleEndian => b"II",
        ByteOrder::BigEndian => b"MM",
    })
    .unwrap();
    w.write_u16(42).unwrap();
    w.write_u32(8).unwrap();

    w.write_u16(entries).unwrap();
    // SpectrumCounts: LONG
    w.write_u16(50000).unwrap();
    w.write_u16(4).unwrap();
    w.write_u32(counts.len() as u32).unwrap();
    w.write_u32(counts_at).unwrap();
    // SpectrumHeader: ASCII
    w.write_u16(50001).unwrap();
    w.write_u16(2).unwrap();
    w.write_u32(text.len() as u32).unwrap();
    w.write_u32(text_at).unwrap();
    w.write_u32(0).unwrap();

    for c in counts {
        w.write_u32(*c).unwrap();
    }
    w.write_bytes(&text).unwrap();
    w.into_inner()
}

// =============================================================================
// Corpus
// =============================================================================

/// One valid file per registered format.
pub fn corpus() -> Vec<(SpectrumFormat, Vec<u8>)> {
    let s = sample_spectrum();

    let mut emsa_bytes = Vec::new();
    emsa::write(&s, &mut emsa_bytes).unwrap();
    let mut csv_bytes = Vec::new();
    csv_text::write(&s, &mut csv_bytes).unwrap();

    vec![
        (
            SpectrumFormat::TiffSpectrum,
            tiff_spectrum::encode(std::slice::from_ref(&s)).unwrap(),
        ),
        (SpectrumFormat::Sectioned, sectioned::encode(&s).unwrap()),
        (
            SpectrumFormat::RecordBundle,
            bundle::encode(&[s.clone(), s.clone()]).unwrap(),
        ),
        (SpectrumFormat::Emsa, emsa_bytes),
        (SpectrumFormat::Spc, SpcBuilder::default().build()),
        (SpectrumFormat::Csv, csv_bytes),
    ]
}

// =============================================================================
// Cubes
// =============================================================================

/// Write a little-endian u16 cube whose elements count up from zero.
pub fn sequential_u16_cube(dir: &Path, width: usize, height: usize, depth: usize) -> (PathBuf, PathBuf) {
    let header = CubeHeader::new(width, height, depth, 2, DataType::Unsigned);
    let rpl = dir.join("seq.rpl");
    let raw = dir.join("seq.raw");
    fs::write(&rpl, header.to_text()).unwrap();
    let n = (width * height * depth) as u16;
    let bytes: Vec<u8> = (0..n).flat_map(|v| v.to_le_bytes()).collect();
    fs::write(&raw, bytes).unwrap();
    (rpl, raw)
}

/// Assert two floats agree to `eps`.
pub fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {} within {} of {}",
        actual,
        eps,
        expected
    );
}
