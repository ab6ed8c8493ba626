//! EMSA/MAS spectral data files (ISO 22029 text format).
//!
//! ```text
//! #FORMAT      : EMSA/MAS Spectral Data File
//! #NPOINTS     : 2048
//! #XPERCHAN    : 10.0
//! #BEAMKV   -kV: 20.0
//! ##D2STDCMP   : (Fe:0.7,Ni:0.3)
//! #SPECTRUM    : Spectral Data Starts Here
//! 0, 0, 12, 40, ...
//! #ENDOFDATA   :
//! ```
//!
//! Keywords are looked up in a table of handlers; unknown
//! keywords are reported as warnings, never as errors.

mod parser;
mod tags;
mod writer;

pub use parser::{
    decode, fill_shortfall, parse_keywords, sniff, split_keyword, KeywordBlock, ShortfallContext,
    ValueParser, MAX_FILL_CHANNELS,
};
pub use writer::{header_text, write};
