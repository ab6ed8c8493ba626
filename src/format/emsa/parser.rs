//! EMSA/MAS text decoder.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};

use crate::config::{DecodeConfig, NumberFormat};
use crate::error::DecodeError;
use crate::spectrum::{
    Calibration, Composition, DecodeWarning, Decoded, Element, FractionKind, PropertyId, Spectrum,
    SpectrumProperties, StagePosition,
};

use super::tags::{dispatch_table, normalize_key, TagHandler};

/// Handler needing access to the parse session.
pub type CustomHandler = fn(&mut Session, &str) -> Result<(), DecodeError>;

const DATE_LAYOUTS: &[&str] = &["%d-%b-%Y", "%d-%m-%Y", "%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"];
const TIME_LAYOUTS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

// =============================================================================
// ValueParser
// =============================================================================

/// Value conversions for one decode session.
#[derive(Debug, Clone, Copy)]
pub struct ValueParser {
    format: NumberFormat,
}

impl ValueParser {
    pub fn new(format: NumberFormat) -> Self {
        Self { format }
    }

    /// First token of a value as a number; trailing unit words are ignored.
    pub fn number(&self, text: &str) -> Option<f64> {
        let token = text.split_whitespace().next()?;
        self.format.parse_f64(token)
    }

    pub fn date(&self, text: &str) -> Option<NaiveDate> {
        let text = text.trim();
        DATE_LAYOUTS
            .iter()
            .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
    }

    pub fn time(&self, text: &str) -> Option<NaiveTime> {
        let text = text.trim();
        TIME_LAYOUTS
            .iter()
            .find_map(|layout| NaiveTime::parse_from_str(text, layout).ok())
    }

    /// Parse `(Fe:0.7,Ni:0.3)`. Anything before the opening parenthesis is
    /// ignored. With a decimal comma, pieces without a `:` continue the
    /// previous fraction.
    pub fn composition(&self, text: &str) -> Option<Composition> {
        let start = text.find('(')?;
        let end = text.rfind(')')?;
        if end <= start {
            return None;
        }

        let mut entries: Vec<String> = Vec::new();
        for piece in text[start + 1..end].split([',', ';']) {
            let piece = piece.trim();
            match entries.last_mut() {
                Some(last) if !piece.contains(':') => {
                    last.push(',');
                    last.push_str(piece);
                }
                _ => entries.push(piece.to_string()),
            }
        }

        let mut composition = Composition::new(FractionKind::Mass);
        for entry in entries.iter().filter(|e| !e.is_empty()) {
            let (symbol, fraction) = entry.split_once(':')?;
            let element = Element::from_symbol(symbol)?;
            let fraction = self.format.parse_f64(fraction)?;
            composition.insert(element, fraction).ok()?;
        }
        (!composition.is_empty()).then_some(composition)
    }

    /// Split a data line into value tokens. Commas separate values unless
    /// they are the decimal separator.
    pub fn tokens<'t>(&self, line: &'t str) -> Vec<&'t str> {
        let comma_is_decimal = self.format.decimal_separator == ',';
        line.split(|c: char| c.is_whitespace() || c == ';' || (c == ',' && !comma_is_decimal))
            .filter(|t| !t.is_empty())
            .collect()
    }
}

// =============================================================================
// Session
// =============================================================================

/// Mutable state for one keyword block.
pub struct Session {
    values: ValueParser,
    properties: SpectrumProperties,
    warnings: Vec<DecodeWarning>,
    stage: StagePosition,
    npoints: Option<usize>,
    width: Option<f64>,
    offset: Option<f64>,
    ch_offset: Option<f64>,
    kev_units: bool,
    xy: bool,
    pending_time: Option<NaiveTime>,
}

/// Everything a keyword block says about a spectrum.
#[derive(Debug, Clone)]
pub struct KeywordBlock {
    pub properties: SpectrumProperties,
    pub calibration: Calibration,
    pub npoints: Option<usize>,
    pub xy: bool,
    pub warnings: Vec<DecodeWarning>,
}

impl Session {
    pub fn new(format: NumberFormat) -> Self {
        Self {
            values: ValueParser::new(format),
            properties: SpectrumProperties::new(),
            warnings: Vec::new(),
            stage: StagePosition::new(),
            npoints: None,
            width: None,
            offset: None,
            ch_offset: None,
            kev_units: false,
            xy: false,
            pending_time: None,
        }
    }

    fn parse_number(&mut self, key: &str, value: &str) -> Option<f64> {
        if value.is_empty() {
            return None;
        }
        let parsed = self.values.number(value);
        if parsed.is_none() {
            Decoded::warn(
                &mut self.warnings,
                DecodeWarning::Unparsable {
                    field: key.to_string(),
                    value: value.to_string(),
                },
            );
        }
        parsed
    }

    fn unparsable(&mut self, key: &str, value: &str) {
        Decoded::warn(
            &mut self.warnings,
            DecodeWarning::Unparsable {
                field: key.to_string(),
                value: value.to_string(),
            },
        );
    }

    fn omit(&mut self, field: &'static str, value: &str) {
        Decoded::warn(
            &mut self.warnings,
            DecodeWarning::OmittedValue {
                field,
                value: value.to_string(),
            },
        );
    }

    /// Apply one `key: value` pair.
    pub fn apply(
        &mut self,
        table: &HashMap<String, TagHandler>,
        key: &str,
        value: &str,
    ) -> Result<(), DecodeError> {
        let Some(handler) = table.get(key) else {
            tracing::debug!(key, "unknown keyword");
            self.warnings.push(DecodeWarning::UnknownTag(key.to_string()));
            return Ok(());
        };

        match *handler {
            TagHandler::Ignore => {}
            TagHandler::Number {
                id,
                scale,
                positive,
            } => {
                if let Some(v) = self.parse_number(key, value) {
                    if v.is_finite() && (!positive || v > 0.0) {
                        self.properties.set_number(id, v * scale)?;
                    } else {
                        self.omit(id.name(), value);
                    }
                }
            }
            TagHandler::Text(id) => {
                if !value.is_empty() {
                    self.properties.set_text(id, value)?;
                }
            }
            TagHandler::Append(id) => self.properties.append_text(id, value)?,
            TagHandler::Stage { axis, scale } => {
                if let Some(v) = self.parse_number(key, value) {
                    if v.is_finite() {
                        self.stage.set(axis, v * scale);
                    } else {
                        self.omit(axis.name(), value);
                    }
                }
            }
            TagHandler::Window(material) => {
                if let Some(cm) = self.parse_number(key, value) {
                    if !cm.is_finite() || cm <= 0.0 {
                        self.omit(PropertyId::WindowThickness.name(), value);
                        return Ok(());
                    }
                    self.properties
                        .set_number(PropertyId::WindowThickness, cm * 1.0e4)?;
                    self.properties.set_text(PropertyId::WindowType, material)?;
                }
            }
            TagHandler::Custom(handle) => handle(self, value)?,
        }
        Ok(())
    }

    /// Close the block: resolve the calibration and any pending time.
    pub fn finish(mut self) -> Result<KeywordBlock, DecodeError> {
        if self.pending_time.take().is_some() {
            Decoded::warn(&mut self.warnings, DecodeWarning::TimeWithoutDate);
        }
        self.properties.set_stage(self.stage)?;

        let unit = if self.kev_units { 1000.0 } else { 1.0 };
        let default = Calibration::default();
        let width = self.width.map(|w| w * unit).unwrap_or(default.width_ev);
        let offset = match (self.offset, self.ch_offset) {
            (Some(o), _) => o * unit,
            (None, Some(ch)) => -ch * width,
            (None, None) => default.offset_ev,
        };

        Ok(KeywordBlock {
            properties: self.properties,
            calibration: Calibration::new(offset, width),
            npoints: self.npoints,
            xy: self.xy,
            warnings: self.warnings,
        })
    }
}

// =============================================================================
// Custom handlers
// =============================================================================

pub(super) fn handle_date(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() {
        return Ok(());
    }
    let Some(date) = session.values.date(value) else {
        session.unparsable("DATE", value);
        return Ok(());
    };
    // Keep a time that was read first, either already combined or pending.
    let time = session
        .properties
        .timestamp(PropertyId::AcquisitionTime)
        .map(|t| t.time())
        .or_else(|| session.pending_time.take())
        .unwrap_or(NaiveTime::MIN);
    session
        .properties
        .set_timestamp(PropertyId::AcquisitionTime, date.and_time(time))?;
    Ok(())
}

pub(super) fn handle_time(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() {
        return Ok(());
    }
    let Some(time) = session.values.time(value) else {
        session.unparsable("TIME", value);
        return Ok(());
    };
    match session.properties.timestamp(PropertyId::AcquisitionTime) {
        Some(existing) => session
            .properties
            .set_timestamp(PropertyId::AcquisitionTime, existing.date().and_time(time))?,
        None => session.pending_time = Some(time),
    }
    Ok(())
}

pub(super) fn handle_npoints(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if let Some(n) = session.parse_number("NPOINTS", value) {
        if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
            session.npoints = Some(n as usize);
        } else {
            return Err(DecodeError::InvalidValue {
                field: "NPOINTS",
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

pub(super) fn handle_xunits(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    session.kev_units = value.trim().eq_ignore_ascii_case("kev");
    Ok(())
}

pub(super) fn handle_datatype(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    session.xy = value.trim().eq_ignore_ascii_case("xy");
    Ok(())
}

pub(super) fn handle_xperchan(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if let Some(w) = session.parse_number("XPERCHAN", value) {
        session.width = Some(w);
    }
    Ok(())
}

pub(super) fn handle_offset(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if let Some(o) = session.parse_number("OFFSET", value) {
        session.offset = Some(o);
    }
    Ok(())
}

pub(super) fn handle_choffset(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if let Some(ch) = session.parse_number("CHOFFSET", value) {
        session.ch_offset = Some(ch);
    }
    Ok(())
}

pub(super) fn handle_composition(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    if value.is_empty() {
        return Ok(());
    }
    match session.values.composition(value) {
        Some(c) => session
            .properties
            .set_composition(PropertyId::StandardComposition, c)?,
        None => session.unparsable("D2STDCMP", value),
    }
    Ok(())
}

/// Comma or whitespace separated element symbols.
pub(super) fn handle_elements(session: &mut Session, value: &str) -> Result<(), DecodeError> {
    let mut elements = Vec::new();
    for symbol in value.split([',', ' ', '\t', ';']).filter(|s| !s.is_empty()) {
        match Element::from_symbol(symbol) {
            Some(el) if !elements.contains(&el) => elements.push(el),
            Some(_) => {}
            None => session.unparsable("ELEMENTS", symbol),
        }
    }
    session.properties.set_elements(elements)?;
    Ok(())
}

/// Comma separated atomic numbers.
pub(super) fn handle_element_numbers(
    session: &mut Session,
    value: &str,
) -> Result<(), DecodeError> {
    let mut elements = Vec::new();
    for token in value.split([',', ' ', '\t']).filter(|s| !s.is_empty()) {
        match token.parse::<u32>().ok().and_then(Element::from_atomic_number) {
            Some(el) if !elements.contains(&el) => elements.push(el),
            Some(_) => {}
            None => session.unparsable("OXINSTELEMS", token),
        }
    }
    session.properties.set_elements(elements)?;
    Ok(())
}

// =============================================================================
// Line handling
// =============================================================================

/// Split a `#KEY -unit : value` line into its normalized key and value.
///
/// The colon is optional (`#KEY value`). A colon only separates the key when
/// everything before it is the key plus at most one unit word, so a time
/// such as `#TIME 12:30` is not split inside the value.
pub fn split_keyword(line: &str) -> (String, &str) {
    let body = line.trim_start_matches('#');
    if let Some(i) = body.find(':') {
        let head = &body[..i];
        let mut tokens = head.split_whitespace();
        let key = tokens.next();
        let unit = tokens.next();
        let plain_unit = unit.map_or(true, |u| !u.chars().any(|c| c.is_ascii_digit()));
        if let (Some(key), None, true) = (key, tokens.next(), plain_unit) {
            return (normalize_key(key), body[i + 1..].trim());
        }
    }
    let body = body.trim_start();
    match body.find(char::is_whitespace) {
        Some(i) => (normalize_key(&body[..i]), body[i..].trim()),
        None => (normalize_key(body), ""),
    }
}

/// Bytes to text: UTF-8 when valid, Latin-1 otherwise. A UTF-8 byte order
/// mark is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parse a keyword block with no data section (as embedded in TIFF files).
pub fn parse_keywords(text: &str, config: &DecodeConfig) -> Result<KeywordBlock, DecodeError> {
    let table = dispatch_table();
    let mut session = Session::new(config.number_format);
    for line in text.lines().map(str::trim).filter(|l| l.starts_with('#')) {
        let (key, value) = split_keyword(line);
        if key == "SPECTRUM" || key == "ENDOFDATA" {
            continue;
        }
        session.apply(&table, &key, value)?;
    }
    session.finish()
}

// =============================================================================
// Channel shortfall
// =============================================================================

/// Most channels a declared count may be zero-filled up to.
pub const MAX_FILL_CHANNELS: usize = 1 << 20;

/// Where a declared channel count came from, for error reports.
#[derive(Debug, Clone, Copy)]
pub struct ShortfallContext {
    pub offset: u64,
    pub field: &'static str,
}

/// Zero-fill `counts` up to `declared` channels.
///
/// A declared count larger than `file_len` or [`MAX_FILL_CHANNELS`] cannot
/// describe the file and is structural corruption. Other shortfalls are a
/// warning, or an error in strict mode.
pub fn fill_shortfall(
    counts: &mut Vec<f64>,
    declared: usize,
    file_len: usize,
    context: ShortfallContext,
    config: &DecodeConfig,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<(), DecodeError> {
    if counts.len() >= declared {
        return Ok(());
    }
    let bound = file_len.min(MAX_FILL_CHANNELS);
    if declared > bound {
        return Err(DecodeError::structural(
            context.offset,
            context.field,
            format!("at most {} channels", bound),
            declared,
        ));
    }
    if config.strict {
        return Err(DecodeError::structural(
            context.offset,
            context.field,
            declared,
            counts.len(),
        ));
    }
    Decoded::warn(
        warnings,
        DecodeWarning::ChannelShortfall {
            declared,
            found: counts.len(),
        },
    );
    counts.resize(declared, 0.0);
    Ok(())
}

// =============================================================================
// Sniff / decode
// =============================================================================

/// The first non-blank line must be a `#FORMAT` keyword naming EMSA.
pub fn sniff(prefix: &[u8]) -> bool {
    let prefix = prefix.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(prefix);
    let head = &prefix[..prefix.len().min(512)];
    let text: String = head.iter().map(|&b| b as char).collect();
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|line| {
            let upper = line.to_ascii_uppercase();
            upper.starts_with("#FORMAT") && upper.contains("EMSA")
        })
        .unwrap_or(false)
}

/// Decode an EMSA/MAS file into one spectrum.
pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let text = decode_text(bytes);
    let table = dispatch_table();
    let mut session = Session::new(config.number_format);
    let values = session.values;

    let mut data: Vec<f64> = Vec::new();
    let mut in_data = false;
    let mut data_done = false;
    let mut xy_index = 0usize;
    let mut bad_values = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('#') {
            let (key, value) = split_keyword(line);
            match key.as_str() {
                "SPECTRUM" => in_data = !data_done,
                "ENDOFDATA" => {
                    in_data = false;
                    data_done = true;
                }
                _ => session.apply(&table, &key, value)?,
            }
            continue;
        }
        if !in_data {
            tracing::debug!(line, "text outside the data section ignored");
            continue;
        }

        for token in values.tokens(line) {
            if session.xy {
                xy_index += 1;
                if xy_index % 2 == 1 {
                    continue;
                }
            }
            match values.number(token) {
                Some(v) => data.push(v),
                None => {
                    bad_values.push(token.to_string());
                    data.push(0.0);
                }
            }
        }
        if let Some(n) = session.npoints {
            if data.len() >= n {
                data.truncate(n);
                in_data = false;
                data_done = true;
            }
        }
    }

    let block = session.finish()?;
    let mut warnings = block.warnings;
    for value in bad_values {
        Decoded::warn(
            &mut warnings,
            DecodeWarning::Unparsable {
                field: "SPECTRUM".to_string(),
                value,
            },
        );
    }

    if let Some(declared) = block.npoints {
        fill_shortfall(
            &mut data,
            declared,
            bytes.len(),
            ShortfallContext {
                offset: bytes.len() as u64,
                field: "NPOINTS",
            },
            config,
            &mut warnings,
        )?;
    }

    let clamped = Spectrum::clamped_count(&data);
    if clamped > 0 {
        Decoded::warn(&mut warnings, DecodeWarning::ClampedChannels(clamped));
    }

    let spectrum = Spectrum::new(data, block.calibration).with_properties(block.properties);
    Ok(Decoded::single(spectrum, warnings))
}

// =============================================================================
// Tests
// =============================================================================
