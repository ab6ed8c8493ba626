//! EMSA/MAS text writer.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::spectrum::{PropertyId, Spectrum, StageAxis};

use super::tags::{TagHandler, TAGS};

fn line(out: &mut String, keyword: &str, value: impl std::fmt::Display) {
    // Writing into a String cannot fail.
    let _ = write!(out, "{:<13}: {}\r\n", keyword, value);
}

/// The keyword block for a spectrum, without the data section.
///
/// `#FORMAT` comes first; calibration and every property with a keyword
/// follow in table order.
pub fn header_text(spectrum: &Spectrum) -> String {
    let props = spectrum.properties();
    let cal = spectrum.calibration();
    let mut out = String::new();

    line(&mut out, "#FORMAT", "EMSA/MAS Spectral Data File");
    line(&mut out, "#VERSION", "1.0");
    line(&mut out, "#TITLE", props.text(PropertyId::Title).unwrap_or(""));
    if let Some(t) = props.timestamp(PropertyId::AcquisitionTime) {
        line(
            &mut out,
            "#DATE",
            t.format("%d-%b-%Y").to_string().to_ascii_uppercase(),
        );
        line(&mut out, "#TIME", t.format("%H:%M:%S%.f"));
    }
    line(
        &mut out,
        "#OWNER",
        props.text(PropertyId::Operator).unwrap_or(""),
    );
    line(&mut out, "#NPOINTS", spectrum.channel_count());
    line(&mut out, "#NCOLUMNS", 1);
    line(&mut out, "#XUNITS", "eV");
    line(&mut out, "#YUNITS", "counts");
    line(&mut out, "#DATATYPE", "Y");
    line(&mut out, "#XPERCHAN", cal.width_ev);
    line(&mut out, "#OFFSET", cal.offset_ev);

    let written = [PropertyId::Title, PropertyId::Operator];
    let mut seen: HashSet<PropertyId> = written.into_iter().collect();
    let mut seen_axes: HashSet<StageAxis> = HashSet::new();
    let stage = props.stage();

    for (keyword, handler) in TAGS {
        match *handler {
            TagHandler::Number { id, scale, .. } => {
                if let Some(v) = props.number(id) {
                    if seen.insert(id) {
                        line(&mut out, keyword, v / scale);
                    }
                }
            }
            TagHandler::Text(id) => {
                if let Some(text) = props.text(id) {
                    if seen.insert(id) {
                        line(&mut out, keyword, text.replace(['\r', '\n'], " "));
                    }
                }
            }
            TagHandler::Append(id) => {
                if let Some(text) = props.text(id) {
                    if seen.insert(id) {
                        for part in text.lines() {
                            line(&mut out, keyword, part);
                        }
                    }
                }
            }
            TagHandler::Stage { axis, scale } => {
                if let Some(v) = stage.and_then(|s| s.get(axis)) {
                    if seen_axes.insert(axis) {
                        line(&mut out, keyword, v / scale);
                    }
                }
            }
            TagHandler::Ignore | TagHandler::Window(_) | TagHandler::Custom(_) => {}
        }
    }

    if let Some(c) = props.composition(PropertyId::StandardComposition) {
        line(&mut out, "##D2STDCMP", c);
    }
    if let Some(elements) = props.elements() {
        let symbols: Vec<&str> = elements.iter().map(|e| e.symbol()).collect();
        line(&mut out, "##ELEMENTS", symbols.join(","));
    }

    out
}

/// Write a complete EMSA file with CRLF line endings.
pub fn write<W: Write>(spectrum: &Spectrum, mut out: W) -> io::Result<()> {
    out.write_all(header_text(spectrum).as_bytes())?;
    write!(out, "{:<13}: Spectral Data Starts Here\r\n", "#SPECTRUM")?;
    for value in spectrum.channels() {
        write!(out, "{},\r\n", value)?;
    }
    write!(out, "{:<13}: \r\n", "#ENDOFDATA")?;
    out.flush()
}
