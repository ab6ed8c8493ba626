use std::fmt;

use super::properties::SpectrumProperties;

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Linear energy calibration: `energy(i) = offset_ev + i * width_ev`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Energy of the lower edge of channel 0 (eV)
    pub offset_ev: f64,
    /// Channel width (eV)
    pub width_ev: f64,
}

impl Calibration {
    pub const fn new(offset_ev: f64, width_ev: f64) -> Self {
        Self {
            offset_ev,
            width_ev,
        }
    }

    #[inline]
    pub fn energy(&self, channel: usize) -> f64 {
        self.offset_ev + channel as f64 * self.width_ev
    }

    /// Channel containing `energy_ev`, or `None` below channel 0.
    pub fn channel_for_energy(&self, energy_ev: f64) -> Option<usize> {
        if self.width_ev <= 0.0 {
            return None;
        }
        let ch = ((energy_ev - self.offset_ev) / self.width_ev).floor();
        if ch < 0.0 || !ch.is_finite() {
            None
        } else {
            Some(ch as usize)
        }
    }
}

impl Default for Calibration {
    /// 10 eV/channel from zero, the most common EDS setting.
    fn default() -> Self {
        Self::new(0.0, 10.0)
    }
}

// ---------------------------------------------------------------------------
// Spectrum
// ---------------------------------------------------------------------------

/// The canonical spectrum: fixed-length channel counts, a calibration and a
/// property bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    channels: Vec<f64>,
    calibration: Calibration,
    properties: SpectrumProperties,
}

impl Spectrum {
    /// Build a spectrum. Negative and non-finite counts are clamped to zero;
    /// use [`Spectrum::clamped_count`] beforehand if the caller needs to
    /// report them.
    pub fn new(channels: Vec<f64>, calibration: Calibration) -> Self {
        let channels = channels
            .into_iter()
            .map(|v| if v.is_finite() && v > 0.0 { v } else { 0.0 })
            .collect();
        Self {
            channels,
            calibration,
            properties: SpectrumProperties::new(),
        }
    }

    pub fn with_properties(mut self, properties: SpectrumProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Number of values [`Spectrum::new`] would clamp.
    pub fn clamped_count(channels: &[f64]) -> usize {
        channels
            .iter()
            .filter(|v| !v.is_finite() || **v < 0.0)
            .count()
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Counts in channel `i`; zero outside the spectrum.
    #[inline]
    pub fn counts(&self, i: usize) -> f64 {
        self.channels.get(i).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    #[inline]
    pub fn energy_for_channel(&self, i: usize) -> f64 {
        self.calibration.energy(i)
    }

    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn properties(&self) -> &SpectrumProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut SpectrumProperties {
        &mut self.properties
    }

    pub fn total_counts(&self) -> f64 {
        self.channels.iter().sum()
    }

    /// Index of the channel with the most counts.
    pub fn max_channel(&self) -> Option<usize> {
        self.channels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    /// True when every channel holds a whole number, which lets writers use
    /// integer encodings.
    pub fn is_integral(&self) -> bool {
        self.channels
            .iter()
            .all(|v| v.fract() == 0.0 && *v <= u32::MAX as f64)
    }
}

// ---------------------------------------------------------------------------
// Decode output
// ---------------------------------------------------------------------------

/// A recoverable problem found while decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeWarning {
    /// Tag or section the decoder does not know
    UnknownTag(String),
    /// Fewer channel values than declared
    ChannelShortfall { declared: usize, found: usize },
    /// Negative or non-finite channel values replaced with zero
    ClampedChannels(usize),
    /// Field present but out of range, so the property was left unset
    OmittedValue { field: &'static str, value: String },
    /// Field replaced by a configured correction
    CorrectedValue {
        field: &'static str,
        found: f64,
        replacement: f64,
    },
    /// Value that could not be parsed
    Unparsable { field: String, value: String },
    /// Trailing records missing from a multi-record file
    TruncatedRecords { declared: usize, complete: usize },
    /// Time of day without any date to attach it to
    TimeWithoutDate,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::UnknownTag(tag) => write!(f, "unknown tag {}", tag),
            DecodeWarning::ChannelShortfall { declared, found } => {
                write!(f, "expected {} channels, found {}", declared, found)
            }
            DecodeWarning::ClampedChannels(n) => {
                write!(f, "{} negative or invalid channel values set to zero", n)
            }
            DecodeWarning::OmittedValue { field, value } => {
                write!(f, "{} value {} out of range, omitted", field, value)
            }
            DecodeWarning::CorrectedValue {
                field,
                found,
                replacement,
            } => write!(f, "{} {} corrected to {}", field, found, replacement),
            DecodeWarning::Unparsable { field, value } => {
                write!(f, "cannot parse {} value '{}'", field, value)
            }
            DecodeWarning::TruncatedRecords { declared, complete } => write!(
                f,
                "{} records declared, only {} complete",
                declared, complete
            ),
            DecodeWarning::TimeWithoutDate => f.write_str("acquisition time without a date"),
        }
    }
}

/// Spectra decoded from one file, plus anything worth telling a human.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub spectra: Vec<Spectrum>,
    pub warnings: Vec<DecodeWarning>,
}

impl Decoded {
    pub fn single(spectrum: Spectrum, warnings: Vec<DecodeWarning>) -> Self {
        Self {
            spectra: vec![spectrum],
            warnings,
        }
    }

    /// Record a warning and log it.
    pub fn warn(warnings: &mut Vec<DecodeWarning>, warning: DecodeWarning) {
        tracing::warn!("{}", warning);
        warnings.push(warning);
    }

    pub fn first(&self) -> Option<&Spectrum> {
        self.spectra.first()
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}
