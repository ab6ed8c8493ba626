//! EMSA/MAS text tests.
//!
//! Tests verify:
//! - A realistic vendor header decodes with the expected units
//! - Malformed, unknown and partial keyword lines never abort a decode
//! - Number locale is taken from the decode configuration

use eds_io::format::emsa;
use eds_io::{DecodeConfig, DecodeWarning, NumberFormat, PropertyId, StageAxis};

use super::test_utils::{timestamp, EMSA_SAMPLE};

fn decode(text: &str) -> eds_io::Decoded {
    emsa::decode(text.as_bytes(), &DecodeConfig::default()).unwrap()
}

// =============================================================================
// Golden file
// =============================================================================

#[test]
fn test_sample_header() {
    let decoded = decode(EMSA_SAMPLE);
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);

    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[0.0, 12.0, 804.0, 9561.0, 77.0, 3.0]);
    assert_eq!(s.calibration().width_ev, 20.0);
    assert_eq!(s.calibration().offset_ev, -100.0);
    assert_eq!(s.max_channel(), Some(3));

    let p = s.properties();
    assert_eq!(p.text(PropertyId::Title), Some("Pure Cu"));
    assert_eq!(p.number(PropertyId::BeamEnergy), Some(20.0));
    assert_eq!(p.number(PropertyId::LiveTime), Some(30.5));
    assert_eq!(p.number(PropertyId::Elevation), Some(35.0));
    assert_eq!(p.stage().unwrap().get(StageAxis::X), Some(12.5));
    assert_eq!(
        p.timestamp(PropertyId::AcquisitionTime),
        Some(timestamp(2020, 1, 2, 14, 5, 0))
    );
}

// =============================================================================
// Partial-tag tolerance
// =============================================================================

#[test]
fn test_garbage_lines_between_tags() {
    let text = "#FORMAT : EMSA/MAS Spectral Data File\n\
                this line is not a keyword\n\
                #\n\
                #BEAMKV : 10\n\
                #SPECTRUM :\n\
                1, 2\n";
    let decoded = decode(text);
    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[1.0, 2.0]);
    assert_eq!(s.properties().number(PropertyId::BeamEnergy), Some(10.0));
}

#[test]
fn test_keyword_without_value() {
    let decoded = decode("#FORMAT: EMSA\n#BEAMKV\n#LIVETIME:\n#SPECTRUM\n5\n");
    let p = decoded.first().unwrap().properties();
    assert!(!p.contains(PropertyId::BeamEnergy));
    assert!(!p.contains(PropertyId::LiveTime));
    assert_eq!(decoded.first().unwrap().channels(), &[5.0]);
}

#[test]
fn test_unknown_and_bad_values_collected() {
    let text = "#FORMAT: EMSA\n\
                #VENDORFIELD: 17\n\
                #BEAMKV: not-a-number\n\
                #LIVETIME: 12\n\
                #SPECTRUM\n\
                1\n";
    let decoded = decode(text);
    assert_eq!(
        decoded.first().unwrap().properties().number(PropertyId::LiveTime),
        Some(12.0)
    );
    assert!(decoded
        .warnings
        .contains(&DecodeWarning::UnknownTag("VENDORFIELD".to_string())));
    assert!(decoded
        .warnings
        .iter()
        .any(|w| matches!(w, DecodeWarning::Unparsable { .. })));
}

#[test]
fn test_truncated_before_data() {
    let decoded = decode("#FORMAT: EMSA\n#NPOINTS: 3\n#XPERCHAN: 5\n");
    let s = decoded.first().unwrap();
    assert_eq!(s.channels(), &[0.0, 0.0, 0.0]);
    assert!(decoded.warnings.contains(&DecodeWarning::ChannelShortfall {
        declared: 3,
        found: 0
    }));
}

#[test]
fn test_line_endings_mixed() {
    let decoded = decode("#FORMAT: EMSA\r\n#NPOINTS: 2\n#SPECTRUM\r\n3\r\n4\n");
    assert_eq!(decoded.first().unwrap().channels(), &[3.0, 4.0]);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_decimal_comma_from_config() {
    let config = DecodeConfig {
        number_format: NumberFormat::COMMA,
        ..DecodeConfig::default()
    };
    let text = "#FORMAT: EMSA\n#XPERCHAN: 2,5\n#LIVETIME: 1.000,5\n#SPECTRUM\n1\n";
    let decoded = emsa::decode(text.as_bytes(), &config).unwrap();
    let s = decoded.first().unwrap();
    assert_eq!(s.calibration().width_ev, 2.5);
    assert_eq!(s.properties().number(PropertyId::LiveTime), Some(1000.5));
}

#[test]
fn test_strict_rejects_shortfall() {
    let config = DecodeConfig {
        strict: true,
        ..DecodeConfig::default()
    };
    assert!(emsa::decode(b"#FORMAT: EMSA\n#NPOINTS: 4\n#SPECTRUM\n1 2\n", &config).is_err());
}
