//! Ripple hyperspectral cubes.
//!
//! A cube is a pair of files: a small text header (`.rpl`) describing the
//! geometry and element type, and a headerless raw payload (`.raw`) stored
//! pixel by pixel with every depth value of a pixel contiguous.
//!
//! ```text
//!  element (r, c, d) lives at  offset + ((r * width + c) * depth + d) * data_length
//! ```

mod file;
mod header;

pub use file::{CubeFile, CubeItem};
pub use header::{CubeByteOrder, CubeHeader, DataType, RecordBy};

/// Raw file path conventionally paired with `header_path`.
pub fn raw_path_for(header_path: &std::path::Path) -> std::path::PathBuf {
    header_path.with_extension("raw")
}
