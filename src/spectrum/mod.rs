//! Canonical spectrum model.
//!
//! Every decoder produces [`Spectrum`] values: a fixed-length sequence of
//! channel counts, a linear energy [`Calibration`] and a sparse, typed
//! [`SpectrumProperties`] bag.
//!
//! ```text
//!  vendor file ──decode──▶ Decoded { spectra: Vec<Spectrum>, warnings }
//!                                      │
//!                                      ├── channels: Vec<f64>   (len fixed)
//!                                      ├── calibration          (offset, width in eV)
//!                                      └── properties           (PropertyId → PropertyValue)
//! ```

mod composition;
mod element;
mod model;
mod properties;
mod stage;

pub use composition::{Composition, FractionKind};
pub use element::{Element, MAX_ATOMIC_NUMBER};
pub use model::{Calibration, DecodeWarning, Decoded, Spectrum};
pub use properties::{ObjectValue, PropertyId, PropertyKind, PropertyValue, SpectrumProperties};
pub use stage::{StageAxis, StagePosition};
