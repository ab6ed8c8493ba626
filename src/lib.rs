//! # eds-io
//!
//! Readers and writers for X-ray energy-dispersive spectroscopy (EDS)
//! spectrum files, plus a random-access codec for ripple hyperspectral
//! cubes.
//!
//! Every supported vendor format decodes into one canonical model: a
//! [`Spectrum`] holding channel counts, a linear energy [`Calibration`] and
//! a typed property bag. Decoding is a pure function over an in-memory
//! buffer, so files are read once and the handle is closed before any
//! parsing happens.
//!
//! ## Features
//!
//! - **Format detection**: sniffers run in a fixed priority order and never fail
//! - **Partial-data tolerance**: truncated files decode as far as possible and report warnings
//! - **Exporters**: EMSA/MAS text, TIFF spectrum containers, CSV and raw dumps
//! - **Cubes**: seek, read and write elements of `.rpl`/`.raw` pairs
//!
//! ## Architecture
//!
//! - [`io`] - byte order handling and bounded binary readers/writers
//! - [`spectrum`] - the canonical spectrum, properties and decode output
//! - [`mod@format`] - per-format sniffers, decoders and the dispatch registry
//! - [`cube`] - ripple cube header and file handle
//! - [`library`] - LRU cache of decoded files
//! - [`config`] - decode settings and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use eds_io::{open_path, DecodeConfig};
//!
//! let (format, decoded) = open_path("sample.msa", &DecodeConfig::default())?;
//! for spectrum in &decoded.spectra {
//!     println!("{}: {} channels", format, spectrum.channel_count());
//! }
//! for warning in &decoded.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! # Ok::<(), eds_io::FormatError>(())
//! ```

pub mod config;
pub mod cube;
pub mod error;
pub mod format;
pub mod io;
pub mod library;
pub mod spectrum;

// Re-export commonly used types
pub use config::{AngleOverride, DecodeConfig, NumberFormat};
pub use cube::{CubeByteOrder, CubeFile, CubeHeader, CubeItem, DataType, RecordBy};
pub use error::{CubeError, DecodeError, FormatError, PropertyError, TiffError};
pub use format::{detect_format, open_bytes, open_path, SpectrumFormat, FORMATS};
pub use io::ByteOrder;
pub use library::{LibraryEntry, SpectrumLibrary};
pub use spectrum::{
    Calibration, Composition, DecodeWarning, Decoded, Element, PropertyId, PropertyValue,
    Spectrum, SpectrumProperties, StageAxis, StagePosition,
};
