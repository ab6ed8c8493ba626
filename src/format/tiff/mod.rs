//! Classic TIFF container support.
//!
//! Some EDS vendors store a spectrum in a TIFF file: the counts and an
//! EMSA-style keyword block sit in private tags next to an ordinary raster
//! showing the analysed region. This module handles the container; the
//! spectrum mapping lives in [`crate::format::tiff_spectrum`].
//!
//! # Key Concepts
//!
//! - **Byte order**: declared in the header (II = little-endian, MM = big-endian).
//!   All multi-byte values are read respecting this order.
//!
//! - **IFD (Image File Directory)**: a list of tagged entries plus the offset of
//!   the next directory. Multi-spectrum files carry one directory per spectrum.
//!
//! - **Inline vs offset values**: values of four bytes or less are stored in
//!   the entry itself; larger values are stored at an offset.

mod parser;
mod tags;
mod values;
mod writer;

pub use parser::{
    read_ifd_chain, Ifd, IfdEntry, TiffHeader, IFD_ENTRY_SIZE, MIN_IFD_SIZE, TIFF_HEADER_SIZE,
};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::ValueReader;
pub use writer::{encode_tiff, TiffDirectory};
