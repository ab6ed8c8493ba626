//! Ripple cube tests.
//!
//! Tests verify:
//! - Element addressing matches `((row * width + col) * depth + d)`
//! - Sequential reads carry depth into column and column into row
//! - Every element type round-trips through create, write and reopen
//! - Header text survives a write and parse cycle

use std::fs;

use proptest::prelude::*;
use tempfile::TempDir;

use eds_io::cube::raw_path_for;
use eds_io::{
    Calibration, CubeByteOrder, CubeError, CubeFile, CubeHeader, CubeItem, DataType, PropertyId,
};

use super::test_utils::sequential_u16_cube;

// =============================================================================
// Scenario
// =============================================================================

#[test]
fn test_documented_scenario() {
    let dir = TempDir::new().unwrap();
    let (rpl, raw) = sequential_u16_cube(dir.path(), 4, 3, 2);
    let mut cube = CubeFile::open(&rpl, &raw).unwrap();

    cube.seek(1, 2, 0).unwrap();
    assert_eq!(cube.read_int().unwrap(), 2 * (4 + 2));
    assert_eq!(cube.position(), (1, 2, 1));
}

#[test]
fn test_walk_whole_cube() {
    let dir = TempDir::new().unwrap();
    let (rpl, raw) = sequential_u16_cube(dir.path(), 3, 2, 4);
    let mut cube = CubeFile::open(&rpl, &raw).unwrap();

    let mut expected = 0i64;
    while !cube.is_eof() {
        assert_eq!(cube.read_int().unwrap(), expected);
        expected += 1;
    }
    assert_eq!(expected, 24);
    assert_eq!(cube.position(), (2, 0, 0));
    assert!(matches!(cube.read_ints(1), Err(CubeError::EndOfCube)));
}

#[test]
fn test_raw_path_for_header() {
    let dir = TempDir::new().unwrap();
    let (rpl, raw) = sequential_u16_cube(dir.path(), 2, 2, 2);
    assert_eq!(raw_path_for(&rpl), raw);
}

proptest! {
    #[test]
    fn prop_seek_reads_linear_index(
        width in 1usize..6,
        height in 1usize..6,
        depth in 1usize..6,
        seed in any::<u64>(),
    ) {
        let dir = TempDir::new().unwrap();
        let (rpl, raw) = sequential_u16_cube(dir.path(), width, height, depth);
        let mut cube = CubeFile::open(&rpl, &raw).unwrap();

        let total = (width * height * depth) as u64;
        let linear = seed % total;
        let d = (linear % depth as u64) as usize;
        let c = ((linear / depth as u64) % width as u64) as usize;
        let r = (linear / (depth * width) as u64) as usize;

        cube.seek(r, c, d).unwrap();
        prop_assert_eq!(cube.read_int().unwrap(), linear as i64);
    }

    #[test]
    fn prop_increment_matches_linear_arithmetic(
        width in 1usize..6,
        height in 1usize..6,
        depth in 1usize..6,
        steps in prop::collection::vec(0u64..20, 1..8),
    ) {
        let dir = TempDir::new().unwrap();
        let (rpl, raw) = sequential_u16_cube(dir.path(), width, height, depth);
        let mut cube = CubeFile::open(&rpl, &raw).unwrap();
        let total = (width * height * depth) as u64;

        let mut linear = 0u64;
        for step in steps {
            cube.increment(step).unwrap();
            linear = (linear + step).min(total);
            let expected = if linear == total {
                (height, 0, 0)
            } else {
                (
                    (linear / (width * depth) as u64) as usize,
                    ((linear / depth as u64) % width as u64) as usize,
                    (linear % depth as u64) as usize,
                )
            };
            prop_assert_eq!(cube.position(), expected);
            prop_assert_eq!(cube.is_eof(), linear == total);
        }
    }
}

// =============================================================================
// Element types
// =============================================================================

fn roundtrip_item(header: CubeHeader, item: CubeItem) {
    let dir = TempDir::new().unwrap();
    let rpl = dir.path().join("c.rpl");
    let raw = dir.path().join("c.raw");

    let mut cube = CubeFile::create(&rpl, &raw, header).unwrap();
    cube.write_item(header.height - 1, header.width - 1, &item).unwrap();
    assert!(cube.is_eof());
    cube.close().unwrap();

    let mut cube = CubeFile::open(&rpl, &raw).unwrap();
    assert_eq!(cube.header(), &header);
    assert_eq!(
        cube.read_item(header.height - 1, header.width - 1).unwrap(),
        item
    );
}

#[test]
fn test_signed_types_roundtrip() {
    let cases: [(usize, Vec<i64>); 4] = [
        (1, vec![i8::MIN as i64, -1, i8::MAX as i64]),
        (2, vec![i16::MIN as i64, 0, i16::MAX as i64]),
        (4, vec![i32::MIN as i64, 7, i32::MAX as i64]),
        (8, vec![i64::MIN, -2, i64::MAX]),
    ];
    for (byte_depth, values) in cases {
        for order in [CubeByteOrder::LittleEndian, CubeByteOrder::BigEndian] {
            let mut header = CubeHeader::new(2, 2, 3, byte_depth, DataType::Signed);
            header.byte_order = order;
            roundtrip_item(header, CubeItem::Ints(values.clone()));
        }
    }
}

#[test]
fn test_unsigned_types_roundtrip() {
    let cases: [(usize, Vec<i64>); 3] = [
        (1, vec![0, 200, 255]),
        (2, vec![0, 40_000, 65_535]),
        (4, vec![0, 3_000_000_000, u32::MAX as i64]),
    ];
    for (byte_depth, values) in cases {
        let mut header = CubeHeader::new(3, 1, 3, byte_depth, DataType::Unsigned);
        header.byte_order = CubeByteOrder::BigEndian;
        roundtrip_item(header, CubeItem::Ints(values));
    }
}

#[test]
fn test_float_types_roundtrip() {
    let values = vec![-1.5, 0.0, 1.0e6, 0.125];
    for byte_depth in [4, 8] {
        let header = CubeHeader::new(1, 2, 4, byte_depth, DataType::Float);
        roundtrip_item(header, CubeItem::Floats(values.clone()));
    }
}

#[test]
fn test_dont_care_order_one_byte() {
    let mut header = CubeHeader::new(2, 1, 2, 1, DataType::Unsigned);
    header.byte_order = CubeByteOrder::DontCare;
    roundtrip_item(header, CubeItem::Ints(vec![1, 254]));

    let mut wide = CubeHeader::new(2, 1, 2, 2, DataType::Unsigned);
    wide.byte_order = CubeByteOrder::DontCare;
    assert!(wide.validate().is_err());
}

#[test]
fn test_wrong_item_length() {
    let dir = TempDir::new().unwrap();
    let header = CubeHeader::new(2, 2, 3, 2, DataType::Signed);
    let mut cube =
        CubeFile::create(dir.path().join("c.rpl"), dir.path().join("c.raw"), header).unwrap();
    assert!(matches!(
        cube.write_item(0, 0, &CubeItem::Ints(vec![1, 2])),
        Err(CubeError::InvalidValue { key: "depth", .. })
    ));
}

// =============================================================================
// Header files
// =============================================================================

#[test]
fn test_vendor_header_variants() {
    let dir = TempDir::new().unwrap();
    let rpl = dir.path().join("map.rpl");
    let raw = dir.path().join("map.raw");
    fs::write(
        &rpl,
        "key\tvalue\n\
         WIDTH 2\n\
         Height\t2\n\
         depth    2\n\
         offset 4\n\
         data-length 2\n\
         data-type signed\n\
         byte-order big-endian\n\
         record-by vector\n\
         ev-per-chan 10\n",
    )
    .unwrap();
    let mut bytes = vec![0xAA; 4];
    for v in [-3i16, 1, 2, 3, 4, 5, 6, 7] {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    fs::write(&raw, bytes).unwrap();

    let mut cube = CubeFile::open(&rpl, &raw).unwrap();
    assert_eq!(cube.header().offset, 4);
    assert_eq!(cube.read_ints(3).unwrap(), vec![-3, 1, 2]);
}

#[test]
fn test_image_record_order_rejected() {
    let text = "width 1\nheight 1\ndepth 1\ndata-length 1\ndata-type unsigned\nrecord-by image\n";
    assert!(matches!(
        CubeHeader::parse(text),
        Err(CubeError::UnsupportedRecordOrder(_))
    ));
}

#[test]
fn test_unsigned_eight_bytes_rejected() {
    let header = CubeHeader::new(1, 1, 1, 8, DataType::Unsigned);
    assert!(matches!(
        header.validate(),
        Err(CubeError::UnsupportedCombination { .. })
    ));
}

// =============================================================================
// Spectra
// =============================================================================

#[test]
fn test_extracted_spectrum_properties() {
    let dir = TempDir::new().unwrap();
    let (rpl, raw) = sequential_u16_cube(dir.path(), 2, 2, 3);
    let mut cube = CubeFile::open(&rpl, &raw).unwrap();

    let s = cube
        .spectrum_at(1, 1, Calibration::new(100.0, 5.0))
        .unwrap();
    assert_eq!(s.channels(), &[9.0, 10.0, 11.0]);
    assert_eq!(s.energy_for_channel(2), 110.0);
    assert_eq!(
        s.properties().text(PropertyId::SourceFile),
        Some(raw.display().to_string().as_str())
    );
}
