//! TIFF container tests.
//!
//! Tests verify:
//! - Little-endian and big-endian containers decode to the same spectrum
//! - Reading a file with the wrong byte order does not give the same values
//! - Embedded keyword blocks and micro-images survive a round-trip

use image::{DynamicImage, GrayImage, Luma};
use proptest::prelude::*;

use eds_io::format::tiff::{TiffHeader, ValueReader};
use eds_io::format::tiff_spectrum;
use eds_io::io::ByteOrder;
use eds_io::{DecodeConfig, DecodeError, DecodeWarning, PropertyId};

use super::test_utils::{sample_spectrum, tiff_with_counts};

const HEADER: &str = "#FORMAT : EMSA/MAS Spectral Data File\n\
                      #XPERCHAN : 10.0\n\
                      #OFFSET : -50.0\n\
                      #LIVETIME : 42.0\n";

// =============================================================================
// Byte order
// =============================================================================

#[test]
fn test_little_and_big_endian_agree() {
    let counts = [0, 1, 300, 70_000, 5];
    let le = tiff_with_counts(ByteOrder::LittleEndian, &counts, HEADER);
    let be = tiff_with_counts(ByteOrder::BigEndian, &counts, HEADER);
    assert_eq!(&le[..2], b"II");
    assert_eq!(&be[..2], b"MM");
    assert!(tiff_spectrum::sniff(&le));
    assert!(tiff_spectrum::sniff(&be));

    let config = DecodeConfig::default();
    let le = tiff_spectrum::decode(&le, &config).unwrap();
    let be = tiff_spectrum::decode(&be, &config).unwrap();
    assert_eq!(le, be);

    let s = le.first().unwrap();
    assert_eq!(s.channels(), &[0.0, 1.0, 300.0, 70_000.0, 5.0]);
    assert_eq!(s.calibration().offset_ev, -50.0);
    assert_eq!(s.properties().number(PropertyId::LiveTime), Some(42.0));
}

#[test]
fn test_header_parse_detects_order() {
    let be = tiff_with_counts(ByteOrder::BigEndian, &[1, 2], HEADER);
    let header = TiffHeader::parse(&be, be.len() as u64).unwrap();
    assert_eq!(header.byte_order, ByteOrder::BigEndian);
    assert_eq!(header.first_ifd_offset, 8);
}

proptest! {
    #[test]
    fn prop_counts_symmetric_across_byte_orders(counts in prop::collection::vec(any::<u32>(), 2..64)) {
        let config = DecodeConfig::default();
        let le = tiff_spectrum::decode(&tiff_with_counts(ByteOrder::LittleEndian, &counts, HEADER), &config).unwrap();
        let be = tiff_spectrum::decode(&tiff_with_counts(ByteOrder::BigEndian, &counts, HEADER), &config).unwrap();
        let expected: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        prop_assert_eq!(le.first().unwrap().channels(), expected.as_slice());
        prop_assert_eq!(be.first().unwrap().channels(), expected.as_slice());
    }

    #[test]
    fn prop_scalar_order_roundtrip(value in any::<u32>()) {
        for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
            prop_assert_eq!(order.read_u32(&order.u32_bytes(value)), value);
        }
    }

    #[test]
    fn prop_wrong_order_differs(value in any::<u32>().prop_filter("not a byte palindrome", |v| v.swap_bytes() != *v)) {
        let le = ByteOrder::LittleEndian.u32_bytes(value);
        prop_assert_ne!(ByteOrder::BigEndian.read_u32(&le), value);
        prop_assert_eq!(ByteOrder::BigEndian.read_u32(&le), value.swap_bytes());
    }
}

#[test]
fn test_flipped_order_marker_misreads() {
    let counts = [1u32, 2, 3];
    let mut bytes = tiff_with_counts(ByteOrder::LittleEndian, &counts, HEADER);
    // Re-label as big-endian without swapping any field
    bytes[..2].copy_from_slice(b"MM");
    assert!(TiffHeader::parse(&bytes, bytes.len() as u64).is_err());
    assert!(!tiff_spectrum::sniff(&bytes));
}

#[test]
fn test_value_reader_follows_header_order() {
    let be = tiff_with_counts(ByteOrder::BigEndian, &[7, 9], HEADER);
    let header = TiffHeader::parse(&be, be.len() as u64).unwrap();
    let values = ValueReader::new(&be, &header);
    assert_eq!(values.bytes().len(), be.len());
}

// =============================================================================
// Declared channel counts
// =============================================================================

#[test]
fn test_header_npoints_shortfall_zero_fills() {
    let header = format!("{}#NPOINTS : 4\n", HEADER);
    let bytes = tiff_with_counts(ByteOrder::LittleEndian, &[5, 6], &header);
    let decoded = tiff_spectrum::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.first().unwrap().channels(), &[5.0, 6.0, 0.0, 0.0]);
    assert!(decoded.warnings.contains(&DecodeWarning::ChannelShortfall {
        declared: 4,
        found: 2
    }));
}

#[test]
fn test_header_npoints_beyond_file_is_structural() {
    let header = format!("{}#NPOINTS : 50000000\n", HEADER);
    let bytes = tiff_with_counts(ByteOrder::BigEndian, &[5, 6], &header);
    assert!(matches!(
        tiff_spectrum::decode(&bytes, &DecodeConfig::default()),
        Err(DecodeError::Structural {
            field: "SpectrumCounts",
            ..
        })
    ));
}

// =============================================================================
// Round-trip
// =============================================================================

#[test]
fn test_encode_decode_with_image() {
    let mut s = sample_spectrum();
    let img = GrayImage::from_fn(4, 3, |x, y| Luma([(x * 40 + y * 10) as u8]));
    s.properties_mut()
        .set_image(PropertyId::MicroImage, DynamicImage::ImageLuma8(img.clone()))
        .unwrap();

    let bytes = tiff_spectrum::encode(&[s.clone(), sample_spectrum()]).unwrap();
    let decoded = tiff_spectrum::decode(&bytes, &DecodeConfig::default()).unwrap();
    assert_eq!(decoded.len(), 2);

    for got in &decoded.spectra {
        assert_eq!(got.channels(), s.channels());
        assert_eq!(got.calibration(), s.calibration());
        let image = got.properties().image(PropertyId::MicroImage).unwrap();
        assert_eq!(image.to_luma8(), img);
    }
    let p = decoded.spectra[0].properties();
    assert_eq!(p.text(PropertyId::Title), Some("K411 glass"));
    assert_eq!(p.number(PropertyId::RealTime), Some(72.5));
}
