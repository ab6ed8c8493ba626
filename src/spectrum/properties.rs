//! Typed, sparse property bag attached to every spectrum.
//!
//! The set of property identifiers is closed: decoders map vendor fields onto
//! [`PropertyId`] and convert to the canonical unit documented on each
//! variant. A property that a decoder cannot determine is simply absent;
//! there is no "unknown" sentinel.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use image::DynamicImage;

use crate::error::PropertyError;

use super::composition::Composition;
use super::element::Element;
use super::stage::StagePosition;

// =============================================================================
// PropertyKind / PropertyId
// =============================================================================

/// The kind of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Number,
    Text,
    Timestamp,
    Composition,
    Image,
    Object,
}

impl PropertyKind {
    pub const fn name(self) -> &'static str {
        match self {
            PropertyKind::Number => "number",
            PropertyKind::Text => "text",
            PropertyKind::Timestamp => "timestamp",
            PropertyKind::Composition => "composition",
            PropertyKind::Image => "image",
            PropertyKind::Object => "object",
        }
    }
}

/// Well-known spectrum properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyId {
    /// Live time (s)
    LiveTime,
    /// Real (clock) time (s)
    RealTime,
    /// Beam energy (keV)
    BeamEnergy,
    /// Probe current (nA)
    ProbeCurrent,
    /// Gun emission current (µA)
    EmissionCurrent,
    /// Beam diameter (nm)
    BeamDiameter,
    /// Working distance (mm)
    WorkingDistance,
    /// Magnification
    Magnification,
    /// Detector elevation / take-off angle (degrees)
    Elevation,
    /// Detector azimuth (degrees)
    Azimuth,
    /// Specimen tilt (degrees)
    SpecimenTilt,
    /// Detector solid angle (sr)
    SolidAngle,
    /// Detector dead layer thickness (µm)
    DeadLayer,
    /// Detector active layer thickness (µm)
    DetectorThickness,
    /// Window thickness (µm)
    WindowThickness,
    /// Detector active area (mm²)
    DetectorArea,
    /// Resolution at Mn Kα (eV)
    FwhmMnKa,
    /// Dead time fraction (%)
    DeadPercent,
    /// Date and time of acquisition
    AcquisitionTime,
    /// Stage coordinates at acquisition
    StagePosition,
    /// Certified composition of a standard
    StandardComposition,
    /// Elements identified in the spectrum
    ElementList,
    /// Detector technology (e.g. "SDD", "SiLi")
    DetectorType,
    /// Window material or model
    WindowType,
    /// Signal type (e.g. "EDS")
    SignalType,
    /// Instrument name
    Instrument,
    /// Operator / owner
    Operator,
    /// Specimen name
    SpecimenName,
    /// Free-text description; decoders may append to it
    SpecimenDescription,
    /// Title of the spectrum
    Title,
    /// Path of the file the spectrum was read from
    SourceFile,
    /// Image of the analysed region
    MicroImage,
    /// Row/column of a spectrum extracted from a cube
    PixelPosition,
}

impl PropertyId {
    pub const ALL: [PropertyId; 33] = [
        PropertyId::LiveTime,
        PropertyId::RealTime,
        PropertyId::BeamEnergy,
        PropertyId::ProbeCurrent,
        PropertyId::EmissionCurrent,
        PropertyId::BeamDiameter,
        PropertyId::WorkingDistance,
        PropertyId::Magnification,
        PropertyId::Elevation,
        PropertyId::Azimuth,
        PropertyId::SpecimenTilt,
        PropertyId::SolidAngle,
        PropertyId::DeadLayer,
        PropertyId::DetectorThickness,
        PropertyId::WindowThickness,
        PropertyId::DetectorArea,
        PropertyId::FwhmMnKa,
        PropertyId::DeadPercent,
        PropertyId::AcquisitionTime,
        PropertyId::StagePosition,
        PropertyId::StandardComposition,
        PropertyId::ElementList,
        PropertyId::DetectorType,
        PropertyId::WindowType,
        PropertyId::SignalType,
        PropertyId::Instrument,
        PropertyId::Operator,
        PropertyId::SpecimenName,
        PropertyId::SpecimenDescription,
        PropertyId::Title,
        PropertyId::SourceFile,
        PropertyId::MicroImage,
        PropertyId::PixelPosition,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            PropertyId::LiveTime => "LiveTime",
            PropertyId::RealTime => "RealTime",
            PropertyId::BeamEnergy => "BeamEnergy",
            PropertyId::ProbeCurrent => "ProbeCurrent",
            PropertyId::EmissionCurrent => "EmissionCurrent",
            PropertyId::BeamDiameter => "BeamDiameter",
            PropertyId::WorkingDistance => "WorkingDistance",
            PropertyId::Magnification => "Magnification",
            PropertyId::Elevation => "Elevation",
            PropertyId::Azimuth => "Azimuth",
            PropertyId::SpecimenTilt => "SpecimenTilt",
            PropertyId::SolidAngle => "SolidAngle",
            PropertyId::DeadLayer => "DeadLayer",
            PropertyId::DetectorThickness => "DetectorThickness",
            PropertyId::WindowThickness => "WindowThickness",
            PropertyId::DetectorArea => "DetectorArea",
            PropertyId::FwhmMnKa => "FwhmMnKa",
            PropertyId::DeadPercent => "DeadPercent",
            PropertyId::AcquisitionTime => "AcquisitionTime",
            PropertyId::StagePosition => "StagePosition",
            PropertyId::StandardComposition => "StandardComposition",
            PropertyId::ElementList => "ElementList",
            PropertyId::DetectorType => "DetectorType",
            PropertyId::WindowType => "WindowType",
            PropertyId::SignalType => "SignalType",
            PropertyId::Instrument => "Instrument",
            PropertyId::Operator => "Operator",
            PropertyId::SpecimenName => "SpecimenName",
            PropertyId::SpecimenDescription => "SpecimenDescription",
            PropertyId::Title => "Title",
            PropertyId::SourceFile => "SourceFile",
            PropertyId::MicroImage => "MicroImage",
            PropertyId::PixelPosition => "PixelPosition",
        }
    }

    pub const fn kind(self) -> PropertyKind {
        match self {
            PropertyId::AcquisitionTime => PropertyKind::Timestamp,
            PropertyId::StandardComposition => PropertyKind::Composition,
            PropertyId::MicroImage => PropertyKind::Image,
            PropertyId::StagePosition | PropertyId::ElementList | PropertyId::PixelPosition => {
                PropertyKind::Object
            }
            PropertyId::DetectorType
            | PropertyId::WindowType
            | PropertyId::SignalType
            | PropertyId::Instrument
            | PropertyId::Operator
            | PropertyId::SpecimenName
            | PropertyId::SpecimenDescription
            | PropertyId::Title
            | PropertyId::SourceFile => PropertyKind::Text,
            _ => PropertyKind::Number,
        }
    }

    /// Canonical unit for numeric properties.
    pub const fn unit(self) -> Option<&'static str> {
        match self {
            PropertyId::LiveTime | PropertyId::RealTime => Some("s"),
            PropertyId::BeamEnergy => Some("keV"),
            PropertyId::ProbeCurrent => Some("nA"),
            PropertyId::EmissionCurrent => Some("µA"),
            PropertyId::BeamDiameter => Some("nm"),
            PropertyId::WorkingDistance => Some("mm"),
            PropertyId::Elevation | PropertyId::Azimuth | PropertyId::SpecimenTilt => Some("°"),
            PropertyId::SolidAngle => Some("sr"),
            PropertyId::DeadLayer | PropertyId::DetectorThickness | PropertyId::WindowThickness => {
                Some("µm")
            }
            PropertyId::DetectorArea => Some("mm²"),
            PropertyId::FwhmMnKa => Some("eV"),
            PropertyId::DeadPercent => Some("%"),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PropertyValue
// =============================================================================

/// Structured values that are neither numbers nor text.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Stage(StagePosition),
    Elements(Vec<Element>),
    Pixel { row: usize, col: usize },
}

/// A tagged property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Composition(Composition),
    Image(DynamicImage),
    Object(ObjectValue),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Timestamp(_) => PropertyKind::Timestamp,
            PropertyValue::Composition(_) => PropertyKind::Composition,
            PropertyValue::Image(_) => PropertyKind::Image,
            PropertyValue::Object(_) => PropertyKind::Object,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(v) => write!(f, "{}", v),
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            PropertyValue::Composition(c) => write!(f, "{}", c),
            PropertyValue::Image(img) => write!(f, "<image {}x{}>", img.width(), img.height()),
            PropertyValue::Object(ObjectValue::Stage(s)) => write!(f, "{}", s),
            PropertyValue::Object(ObjectValue::Elements(els)) => {
                let symbols: Vec<&str> = els.iter().map(|e| e.symbol()).collect();
                f.write_str(&symbols.join(","))
            }
            PropertyValue::Object(ObjectValue::Pixel { row, col }) => {
                write!(f, "(row {}, col {})", row, col)
            }
        }
    }
}

// =============================================================================
// SpectrumProperties
// =============================================================================

/// Sparse map from [`PropertyId`] to [`PropertyValue`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectrumProperties {
    values: BTreeMap<PropertyId, PropertyValue>,
}

impl SpectrumProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value wholesale.
    pub fn set(&mut self, id: PropertyId, value: PropertyValue) -> Result<(), PropertyError> {
        if value.kind() != id.kind() {
            return Err(PropertyError::KindMismatch {
                property: id.name(),
                expected: id.kind().name(),
                found: value.kind().name(),
            });
        }
        if let PropertyValue::Number(v) = value {
            if !v.is_finite() {
                return Err(PropertyError::NonFinite(id.name()));
            }
        }
        self.values.insert(id, value);
        Ok(())
    }

    pub fn set_number(&mut self, id: PropertyId, value: f64) -> Result<(), PropertyError> {
        self.set(id, PropertyValue::Number(value))
    }

    pub fn set_text(&mut self, id: PropertyId, value: impl Into<String>) -> Result<(), PropertyError> {
        self.set(id, PropertyValue::Text(value.into()))
    }

    pub fn set_timestamp(&mut self, id: PropertyId, value: NaiveDateTime) -> Result<(), PropertyError> {
        self.set(id, PropertyValue::Timestamp(value))
    }

    pub fn set_composition(
        &mut self,
        id: PropertyId,
        value: Composition,
    ) -> Result<(), PropertyError> {
        self.set(id, PropertyValue::Composition(value))
    }

    pub fn set_image(&mut self, id: PropertyId, value: DynamicImage) -> Result<(), PropertyError> {
        self.set(id, PropertyValue::Image(value))
    }

    /// Store a stage position; an empty position is not stored.
    pub fn set_stage(&mut self, value: StagePosition) -> Result<(), PropertyError> {
        if value.is_empty() {
            return Ok(());
        }
        self.set(
            PropertyId::StagePosition,
            PropertyValue::Object(ObjectValue::Stage(value)),
        )
    }

    /// Store an element list; an empty list is not stored.
    pub fn set_elements(&mut self, value: Vec<Element>) -> Result<(), PropertyError> {
        if value.is_empty() {
            return Ok(());
        }
        self.set(
            PropertyId::ElementList,
            PropertyValue::Object(ObjectValue::Elements(value)),
        )
    }

    /// Append to a text property, separating entries with a newline.
    pub fn append_text(&mut self, id: PropertyId, value: &str) -> Result<(), PropertyError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let combined = match self.text(id) {
            Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, value),
            _ => value.to_string(),
        };
        self.set_text(id, combined)
    }

    pub fn get(&self, id: PropertyId) -> Option<&PropertyValue> {
        self.values.get(&id)
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn remove(&mut self, id: PropertyId) -> Option<PropertyValue> {
        self.values.remove(&id)
    }

    pub fn number(&self, id: PropertyId) -> Option<f64> {
        match self.values.get(&id) {
            Some(PropertyValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, id: PropertyId) -> Option<&str> {
        match self.values.get(&id) {
            Some(PropertyValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn timestamp(&self, id: PropertyId) -> Option<NaiveDateTime> {
        match self.values.get(&id) {
            Some(PropertyValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn composition(&self, id: PropertyId) -> Option<&Composition> {
        match self.values.get(&id) {
            Some(PropertyValue::Composition(c)) => Some(c),
            _ => None,
        }
    }

    pub fn image(&self, id: PropertyId) -> Option<&DynamicImage> {
        match self.values.get(&id) {
            Some(PropertyValue::Image(img)) => Some(img),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<&StagePosition> {
        match self.values.get(&PropertyId::StagePosition) {
            Some(PropertyValue::Object(ObjectValue::Stage(s))) => Some(s),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Element]> {
        match self.values.get(&PropertyId::ElementList) {
            Some(PropertyValue::Object(ObjectValue::Elements(e))) => Some(e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }
}
