//! Format detection and dispatch tests.
//!
//! Tests verify:
//! - Exactly one sniffer accepts each file of a one-per-format corpus
//! - Sniffers never panic on short, empty or random input
//! - Unrecognized data reports every sniffer tried and the leading bytes
//! - Files opened by path carry their source path

use std::fs;
use std::io::Cursor;

use proptest::prelude::*;
use tempfile::TempDir;

use eds_io::format::{sniff_reader, sniff_seekable, SNIFF_PREFIX_LEN};
use eds_io::{
    detect_format, open_bytes, open_path, DecodeConfig, FormatError, PropertyId, SpectrumFormat,
    FORMATS,
};

use super::test_utils::{corpus, CSV_SAMPLE, EMSA_SAMPLE};

// =============================================================================
// Sniffer exclusivity
// =============================================================================

#[test]
fn test_exactly_one_sniffer_per_corpus_file() {
    for (format, bytes) in corpus() {
        let accepting: Vec<SpectrumFormat> =
            FORMATS.iter().copied().filter(|f| f.sniff(&bytes)).collect();
        assert_eq!(accepting, vec![format], "{} file", format);
    }
}

#[test]
fn test_every_corpus_file_decodes() {
    let config = DecodeConfig::default();
    for (format, bytes) in corpus() {
        let (detected, decoded) = open_bytes(&bytes, &config).unwrap();
        assert_eq!(detected, format);
        assert!(!decoded.is_empty(), "{} produced no spectra", format);
    }
}

#[test]
fn test_registry_order() {
    let names: Vec<&str> = FORMATS.iter().map(|f| f.name()).collect();
    assert_eq!(
        names,
        [
            "TIFF spectrum",
            "Sectioned EDSX",
            "Record bundle",
            "EMSA/MAS text",
            "SPC",
            "CSV"
        ]
    );
}

#[test]
fn test_text_fixtures_detected() {
    assert_eq!(
        detect_format(EMSA_SAMPLE.as_bytes()),
        Some(SpectrumFormat::Emsa)
    );
    assert_eq!(
        detect_format(CSV_SAMPLE.as_bytes()),
        Some(SpectrumFormat::Csv)
    );
}

proptest! {
    #[test]
    fn prop_sniffers_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        for format in FORMATS {
            let _ = format.sniff(&bytes);
        }
    }

    #[test]
    fn prop_truncated_corpus_never_panics(cut in 0usize..4096) {
        let config = DecodeConfig::default();
        for (_, bytes) in corpus() {
            let end = cut.min(bytes.len());
            let _ = open_bytes(&bytes[..end], &config);
        }
    }
}

// =============================================================================
// Unrecognized data
// =============================================================================

#[test]
fn test_unrecognized_reports_prefix() {
    let bytes = b"\x00\x01\x02\x03 hello world";
    match open_bytes(bytes, &DecodeConfig::default()) {
        Err(FormatError::Unrecognized { tried, prefix }) => {
            assert_eq!(tried.len(), FORMATS.len());
            assert_eq!(prefix, "000102032068656c");
        }
        other => panic!("expected unrecognized, got {:?}", other.map(|(f, _)| f)),
    }
}

#[test]
fn test_empty_input_unrecognized() {
    assert!(matches!(
        open_bytes(&[], &DecodeConfig::default()),
        Err(FormatError::Unrecognized { .. })
    ));
}

#[test]
fn test_decode_failure_names_format() {
    // Claims to be a bundle, but the header is cut short
    let err = open_bytes(b"RBND\x00\x01", &DecodeConfig::default()).unwrap_err();
    match err {
        FormatError::Decode { format, .. } => assert_eq!(format, "Record bundle"),
        other => panic!("unexpected {:?}", other),
    }
}

// =============================================================================
// Streams and paths
// =============================================================================

#[test]
fn test_sniff_stream_sources() {
    for (format, bytes) in corpus() {
        let mut cursor = Cursor::new(bytes.clone());
        assert_eq!(sniff_seekable(&mut cursor).unwrap(), Some(format));
        assert_eq!(cursor.position(), 0);
        assert_eq!(sniff_reader(bytes.as_slice()).unwrap(), Some(format));
    }
}

#[test]
fn test_sniff_long_text_reads_prefix_only() {
    let mut text = EMSA_SAMPLE.to_string();
    while text.len() < 4 * SNIFF_PREFIX_LEN {
        text.push_str("1,\r\n");
    }
    assert_eq!(
        sniff_reader(text.as_bytes()).unwrap(),
        Some(SpectrumFormat::Emsa)
    );
}

#[test]
fn test_open_path_sets_source_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cu.msa");
    fs::write(&path, EMSA_SAMPLE).unwrap();

    let (format, decoded) = open_path(&path, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::Emsa);
    let source = decoded
        .first()
        .unwrap()
        .properties()
        .text(PropertyId::SourceFile)
        .unwrap()
        .to_string();
    assert_eq!(source, path.display().to_string());
}

#[test]
fn test_open_missing_path_is_io() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        open_path(dir.path().join("missing.spc"), &DecodeConfig::default()),
        Err(FormatError::Io(_))
    ));
}

#[test]
fn test_extension_does_not_drive_detection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("really_csv.spc");
    fs::write(&path, CSV_SAMPLE).unwrap();
    let (format, _) = open_path(&path, &DecodeConfig::default()).unwrap();
    assert_eq!(format, SpectrumFormat::Csv);
    assert!(SpectrumFormat::Spc.extensions().contains(&"spc"));
}
