//! Format detection and dispatch for spectrum files.
//!
//! Each registered format exposes a sniffer that looks at the leading bytes
//! and never fails; the first sniffer that accepts the data wins. Sniff
//! order matters because some layouts are permissive (CSV accepts any text
//! with the right header), so strongly-marked formats come first:
//!
//! 1. TIFF spectrum (TIFF header plus the spectrum counts tag)
//! 2. Sectioned EDSX (`EDSX` magic)
//! 3. Record bundle (`RBND` magic)
//! 4. EMSA/MAS text (`#FORMAT ... EMSA`)
//! 5. SPC fixed layout (header plausibility checks)
//! 6. Two-column CSV
//!
//! Data that no sniffer accepts is reported as
//! [`FormatError::Unrecognized`] listing every format that was tried.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::config::DecodeConfig;
use crate::error::{DecodeError, FormatError};
use crate::io::ByteOrder;
use crate::spectrum::{Decoded, PropertyId};

use super::tiff::TIFF_HEADER_SIZE;
use super::{bundle, csv_text, emsa, sectioned, spc, tiff_spectrum};

/// Bytes handed to prefix sniffers.
pub const SNIFF_PREFIX_LEN: usize = 4096;

/// Leading bytes shown in an unrecognized-format error.
const ERROR_PREFIX_LEN: usize = 8;

// =============================================================================
// SpectrumFormat
// =============================================================================

/// A registered spectrum file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumFormat {
    /// Spectrum counts and an EMSA keyword block in private TIFF tags
    TiffSpectrum,

    /// Little-endian, length-prefixed sections
    Sectioned,

    /// Big-endian, many fixed-length records
    RecordBundle,

    /// EMSA/MAS text
    Emsa,

    /// Little-endian fixed-offset header
    Spc,

    /// Energy and counts columns
    Csv,
}

/// Registered formats in sniff order.
pub const FORMATS: [SpectrumFormat; 6] = [
    SpectrumFormat::TiffSpectrum,
    SpectrumFormat::Sectioned,
    SpectrumFormat::RecordBundle,
    SpectrumFormat::Emsa,
    SpectrumFormat::Spc,
    SpectrumFormat::Csv,
];

impl SpectrumFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            SpectrumFormat::TiffSpectrum => "TIFF spectrum",
            SpectrumFormat::Sectioned => "Sectioned EDSX",
            SpectrumFormat::RecordBundle => "Record bundle",
            SpectrumFormat::Emsa => "EMSA/MAS text",
            SpectrumFormat::Spc => "SPC",
            SpectrumFormat::Csv => "CSV",
        }
    }

    /// File extensions conventionally used for the format, lower case.
    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            SpectrumFormat::TiffSpectrum => &["tif", "tiff"],
            SpectrumFormat::Sectioned => &["edsx"],
            SpectrumFormat::RecordBundle => &["rbnd", "bnd"],
            SpectrumFormat::Emsa => &["msa", "emsa", "txt"],
            SpectrumFormat::Spc => &["spc"],
            SpectrumFormat::Csv => &["csv"],
        }
    }

    /// Run this format's sniffer. Only the TIFF sniffer looks past the
    /// first [`SNIFF_PREFIX_LEN`] bytes.
    pub fn sniff(&self, bytes: &[u8]) -> bool {
        let prefix = &bytes[..bytes.len().min(SNIFF_PREFIX_LEN)];
        match self {
            SpectrumFormat::TiffSpectrum => tiff_spectrum::sniff(bytes),
            SpectrumFormat::Sectioned => sectioned::sniff(prefix),
            SpectrumFormat::RecordBundle => bundle::sniff(prefix),
            SpectrumFormat::Emsa => emsa::sniff(prefix),
            SpectrumFormat::Spc => spc::sniff(prefix),
            SpectrumFormat::Csv => csv_text::sniff(prefix),
        }
    }

    pub fn decode(&self, bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
        match self {
            SpectrumFormat::TiffSpectrum => tiff_spectrum::decode(bytes, config),
            SpectrumFormat::Sectioned => sectioned::decode(bytes, config),
            SpectrumFormat::RecordBundle => bundle::decode(bytes, config),
            SpectrumFormat::Emsa => emsa::decode(bytes, config),
            SpectrumFormat::Spc => spc::decode(bytes, config),
            SpectrumFormat::Csv => csv_text::decode(bytes, config),
        }
    }
}

impl std::fmt::Display for SpectrumFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// First registered format whose sniffer accepts `bytes`.
pub fn detect_format(bytes: &[u8]) -> Option<SpectrumFormat> {
    FORMATS.into_iter().find(|format| format.sniff(bytes))
}

/// Check if bytes start with a classic or BigTIFF header.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    let order = match bytes.get(..2) {
        Some(b"II") => ByteOrder::LittleEndian,
        Some(b"MM") => ByteOrder::BigEndian,
        _ => return false,
    };
    bytes.len() >= TIFF_HEADER_SIZE && matches!(order.u16_at(bytes, 2), Some(42 | 43))
}

/// Read the sniffing window from `reader`. A TIFF header pulls in the rest
/// of the stream because its first directory may sit anywhere.
fn read_window<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut window = Vec::with_capacity(SNIFF_PREFIX_LEN);
    reader
        .by_ref()
        .take(SNIFF_PREFIX_LEN as u64)
        .read_to_end(&mut window)?;
    if window.len() == SNIFF_PREFIX_LEN && is_tiff_header(&window) {
        reader.read_to_end(&mut window)?;
    }
    Ok(window)
}

/// Sniff a seekable source and restore its position afterwards.
pub fn sniff_seekable<R: Read + Seek>(reader: &mut R) -> Result<Option<SpectrumFormat>, FormatError> {
    let start = reader.stream_position()?;
    let window = read_window(reader);
    reader.seek(SeekFrom::Start(start))?;
    Ok(detect_format(&window?))
}

/// Sniff a stream that cannot be rewound. The stream is consumed.
pub fn sniff_reader<R: Read>(mut reader: R) -> Result<Option<SpectrumFormat>, FormatError> {
    let window = read_window(&mut reader)?;
    Ok(detect_format(&window))
}

// =============================================================================
// Decoding entry points
// =============================================================================

/// Detect and decode an in-memory file.
pub fn open_bytes(
    bytes: &[u8],
    config: &DecodeConfig,
) -> Result<(SpectrumFormat, Decoded), FormatError> {
    let Some(format) = detect_format(bytes) else {
        return Err(FormatError::Unrecognized {
            tried: FORMATS.iter().map(SpectrumFormat::name).collect(),
            prefix: hex::encode(&bytes[..bytes.len().min(ERROR_PREFIX_LEN)]),
        });
    };
    tracing::debug!(format = format.name(), len = bytes.len(), "detected format");

    let decoded = format
        .decode(bytes, config)
        .map_err(|source| FormatError::Decode {
            format: format.name(),
            source,
        })?;
    Ok((format, decoded))
}

/// Read a file and decode it. Every spectrum gets a `SourceFile` property.
pub fn open_path(
    path: impl AsRef<Path>,
    config: &DecodeConfig,
) -> Result<(SpectrumFormat, Decoded), FormatError> {
    let path = path.as_ref();
    // The file handle is closed before decoding starts.
    let bytes = Bytes::from(fs::read(path)?);
    let (format, mut decoded) = open_bytes(&bytes, config)?;

    let source = path.display().to_string();
    for spectrum in &mut decoded.spectra {
        spectrum
            .properties_mut()
            .set_text(PropertyId::SourceFile, source.as_str())
            .map_err(|err| FormatError::Decode {
                format: format.name(),
                source: err.into(),
            })?;
    }
    tracing::info!(
        path = %path.display(),
        format = format.name(),
        spectra = decoded.len(),
        warnings = decoded.warnings.len(),
        "opened spectrum file"
    );
    Ok((format, decoded))
}

// =============================================================================
// Tests
// =============================================================================
