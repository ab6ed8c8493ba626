//! Spectrum file formats.
//!
//! Every decoder is a pure function over an in-memory file:
//! `decode(bytes, &DecodeConfig) -> Result<Decoded, DecodeError>`. Format
//! identification lives in [`detect`], which runs the sniffers in a fixed
//! order and dispatches to the matching decoder.
//!
//! Supported formats:
//!
//! - **TIFF spectrum**: counts and an EMSA keyword block in private TIFF tags
//! - **Sectioned EDSX**: little-endian length-prefixed sections
//! - **Record bundle**: big-endian fixed-length records, many spectra per file
//! - **EMSA/MAS**: the ISO 22029 text format
//! - **SPC**: little-endian fixed-offset header
//! - **CSV**: energy and counts columns
//!
//! The headerless [`dump`] format is write-mostly and is not sniffed.

pub mod bundle;
pub mod csv_text;
pub mod detect;
pub mod dump;
pub mod emsa;
pub mod sectioned;
pub mod spc;
pub mod tiff;
pub mod tiff_spectrum;

pub use detect::{
    detect_format, is_tiff_header, open_bytes, open_path, sniff_reader, sniff_seekable,
    SpectrumFormat, FORMATS, SNIFF_PREFIX_LEN,
};
