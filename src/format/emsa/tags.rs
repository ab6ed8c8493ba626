//! Keyword dispatch table.
//!
//! Each keyword maps to a [`TagHandler`]. Most handlers are data (a property
//! id plus the factor converting the file unit to the canonical unit); the
//! handful that need state are plain functions over the parse session.
//! The writer walks the same table so both directions agree on units.

use std::collections::HashMap;

use crate::spectrum::{PropertyId, StageAxis};

use super::parser::{
    handle_choffset, handle_composition, handle_datatype, handle_date, handle_element_numbers,
    handle_elements, handle_npoints, handle_offset, handle_time, handle_xperchan, handle_xunits,
    CustomHandler,
};

/// What to do with a keyword's value.
#[derive(Clone, Copy)]
pub enum TagHandler {
    /// Known keyword without a canonical property
    Ignore,
    /// Number multiplied by `scale` into a property. With `positive`, zero
    /// and negative values are omitted.
    Number {
        id: PropertyId,
        scale: f64,
        positive: bool,
    },
    /// Text property, replaced wholesale
    Text(PropertyId),
    /// Text property, appended on a new line
    Append(PropertyId),
    /// One stage axis, multiplied by `scale`
    Stage { axis: StageAxis, scale: f64 },
    /// Window layer thickness in cm; sets the window type to the material
    Window(&'static str),
    /// Anything that needs session state
    Custom(CustomHandler),
}

/// `(keyword as written, handler)`. Keys are matched without the leading
/// `#` characters; the first entry for a property is the one the writer uses.
pub const TAGS: &[(&str, TagHandler)] = &[
    // -------------------------------------------------------------------------
    // Required EMSA/MAS keywords
    // -------------------------------------------------------------------------
    ("#FORMAT", TagHandler::Ignore),
    ("#VERSION", TagHandler::Ignore),
    ("#TITLE", TagHandler::Text(PropertyId::Title)),
    ("#DATE", TagHandler::Custom(handle_date)),
    ("#TIME", TagHandler::Custom(handle_time)),
    ("#OWNER", TagHandler::Text(PropertyId::Operator)),
    ("#NPOINTS", TagHandler::Custom(handle_npoints)),
    ("#NCOLUMNS", TagHandler::Ignore),
    ("#XUNITS", TagHandler::Custom(handle_xunits)),
    ("#YUNITS", TagHandler::Ignore),
    ("#DATATYPE", TagHandler::Custom(handle_datatype)),
    ("#XPERCHAN", TagHandler::Custom(handle_xperchan)),
    ("#OFFSET", TagHandler::Custom(handle_offset)),
    // -------------------------------------------------------------------------
    // Optional EMSA/MAS keywords
    // -------------------------------------------------------------------------
    ("#SIGNALTYPE", TagHandler::Text(PropertyId::SignalType)),
    ("#XLABEL", TagHandler::Ignore),
    ("#YLABEL", TagHandler::Ignore),
    ("#CHOFFSET", TagHandler::Custom(handle_choffset)),
    ("#COMMENT", TagHandler::Append(PropertyId::SpecimenDescription)),
    (
        "#BEAMKV",
        TagHandler::Number {
            id: PropertyId::BeamEnergy,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#EMISSION",
        TagHandler::Number {
            id: PropertyId::EmissionCurrent,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#PROBECUR",
        TagHandler::Number {
            id: PropertyId::ProbeCurrent,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#BEAMDIAM",
        TagHandler::Number {
            id: PropertyId::BeamDiameter,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#MAGCAM",
        TagHandler::Number {
            id: PropertyId::Magnification,
            scale: 1.0,
            positive: true,
        },
    ),
    ("#OPERMODE", TagHandler::Ignore),
    ("#CONVANGLE", TagHandler::Ignore),
    ("#COLLANGLE", TagHandler::Ignore),
    ("#THICKNESS", TagHandler::Ignore),
    (
        "#XTILTSTGE",
        TagHandler::Stage {
            axis: StageAxis::T,
            scale: 1.0,
        },
    ),
    (
        "#YTILTSTGE",
        TagHandler::Stage {
            axis: StageAxis::B,
            scale: 1.0,
        },
    ),
    (
        "#XPOSITION",
        TagHandler::Stage {
            axis: StageAxis::X,
            scale: 1.0,
        },
    ),
    (
        "#YPOSITION",
        TagHandler::Stage {
            axis: StageAxis::Y,
            scale: 1.0,
        },
    ),
    (
        "#ZPOSITION",
        TagHandler::Stage {
            axis: StageAxis::Z,
            scale: 1.0,
        },
    ),
    ("#DWELLTIME", TagHandler::Ignore),
    ("#INTEGTIME", TagHandler::Ignore),
    ("#ELSDET", TagHandler::Ignore),
    (
        "#ELEVANGLE",
        TagHandler::Number {
            id: PropertyId::Elevation,
            scale: 1.0,
            positive: false,
        },
    ),
    (
        "#AZIMANGLE",
        TagHandler::Number {
            id: PropertyId::Azimuth,
            scale: 1.0,
            positive: false,
        },
    ),
    (
        "#SOLIDANGLE",
        TagHandler::Number {
            id: PropertyId::SolidAngle,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#LIVETIME",
        TagHandler::Number {
            id: PropertyId::LiveTime,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#REALTIME",
        TagHandler::Number {
            id: PropertyId::RealTime,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "#FWHMMNKA",
        TagHandler::Number {
            id: PropertyId::FwhmMnKa,
            scale: 1.0,
            positive: true,
        },
    ),
    // Layer thicknesses are written in cm; canonical unit is µm.
    ("#TBEWIND", TagHandler::Window("Be")),
    ("#TAUWIND", TagHandler::Window("Au")),
    ("#TALWIND", TagHandler::Window("Al")),
    ("#TPYWIND", TagHandler::Window("Pyrolene")),
    ("#TBNWIND", TagHandler::Window("BN")),
    ("#TDIWIND", TagHandler::Window("Diamond")),
    ("#THCWIND", TagHandler::Window("Hydrocarbon")),
    (
        "#TDEADLYR",
        TagHandler::Number {
            id: PropertyId::DeadLayer,
            scale: 1.0e4,
            positive: true,
        },
    ),
    (
        "#TACTLYR",
        TagHandler::Number {
            id: PropertyId::DetectorThickness,
            scale: 1.0e4,
            positive: true,
        },
    ),
    ("#EDSDET", TagHandler::Text(PropertyId::DetectorType)),
    ("#CHECKSUM", TagHandler::Ignore),
    ("#PRISMDATA", TagHandler::Ignore),
    ("#EELSDET", TagHandler::Ignore),
    ("#XRAYDET", TagHandler::Ignore),
    // -------------------------------------------------------------------------
    // Extension keywords (double hash)
    // -------------------------------------------------------------------------
    ("##D2STDCMP", TagHandler::Custom(handle_composition)),
    ("##SPECIMEN", TagHandler::Text(PropertyId::SpecimenName)),
    ("##SRCFILE", TagHandler::Text(PropertyId::SourceFile)),
    (
        "##WORKDIST",
        TagHandler::Number {
            id: PropertyId::WorkingDistance,
            scale: 1.0,
            positive: true,
        },
    ),
    ("##ELEMENTS", TagHandler::Custom(handle_elements)),
    (
        "##DEADPCT",
        TagHandler::Number {
            id: PropertyId::DeadPercent,
            scale: 1.0,
            positive: false,
        },
    ),
    (
        "##DETAREA",
        TagHandler::Number {
            id: PropertyId::DetectorArea,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "##WINTHICK",
        TagHandler::Number {
            id: PropertyId::WindowThickness,
            scale: 1.0,
            positive: true,
        },
    ),
    ("##WINDOW", TagHandler::Text(PropertyId::WindowType)),
    ("##INSTRUMENT", TagHandler::Text(PropertyId::Instrument)),
    (
        "##ROTATION",
        TagHandler::Stage {
            axis: StageAxis::R,
            scale: 1.0,
        },
    ),
    (
        "##SPECTILT",
        TagHandler::Number {
            id: PropertyId::SpecimenTilt,
            scale: 1.0,
            positive: false,
        },
    ),
    // Vendor keywords seen in the wild
    ("##OXINSTELEMS", TagHandler::Custom(handle_element_numbers)),
    ("##OXINSTLABEL", TagHandler::Ignore),
    ("##OXINSTPT", TagHandler::Ignore),
    ("##OXINSTSTROB", TagHandler::Ignore),
    ("##MNFWHM", TagHandler::Ignore),
    (
        "##WD",
        TagHandler::Number {
            id: PropertyId::WorkingDistance,
            scale: 1.0,
            positive: true,
        },
    ),
    (
        "##MAG",
        TagHandler::Number {
            id: PropertyId::Magnification,
            scale: 1.0,
            positive: true,
        },
    ),
    ("##OPERATOR", TagHandler::Text(PropertyId::Operator)),
];

/// Strip leading `#`s and case-fold.
pub fn normalize_key(keyword: &str) -> String {
    let key = keyword.trim_start_matches('#');
    // `#ELEVANGLE-dg` carries its unit glued to the keyword
    let key = key.split('-').next().unwrap_or(key);
    key.trim().to_ascii_uppercase()
}

/// Build the lookup map once per decode call.
pub fn dispatch_table() -> HashMap<String, TagHandler> {
    TAGS.iter()
        .map(|(keyword, handler)| (normalize_key(keyword), *handler))
        .collect()
}
