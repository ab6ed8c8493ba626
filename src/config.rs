//! Configuration for decoding and for the `eds-io` command line.
//!
//! Decoders never read process-wide state. Everything that used to be a
//! global default (number locale, vendor quirk corrections, strictness) lives
//! in [`DecodeConfig`] and is passed by reference into each decode call.
//!
//! # Environment Variables
//!
//! The CLI accepts each global option from the environment with the `EDS_` prefix:
//!
//! - `EDS_DECIMAL_COMMA` - Parse text numbers with `,` as the decimal separator
//! - `EDS_NO_ELEVATION_FIX` - Keep detector elevations exactly as stored
//! - `EDS_STRICT` - Treat recoverable structural problems as errors
//! - `EDS_CACHE_CAPACITY` - Decoded files kept by the library cache (default: 64)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of decoded files kept by [`crate::library::SpectrumLibrary`].
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Elevation some SPC firmware writes in place of the real 37° geometry.
pub const SPC_BOGUS_ELEVATION: f64 = 57.0;

/// Elevation substituted for [`SPC_BOGUS_ELEVATION`].
pub const SPC_CORRECTED_ELEVATION: f64 = 37.0;

// =============================================================================
// NumberFormat
// =============================================================================

/// Separators used when parsing numbers out of text formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub grouping_separator: Option<char>,
}

impl NumberFormat {
    /// `1234.5`
    pub const POINT: NumberFormat = NumberFormat {
        decimal_separator: '.',
        grouping_separator: None,
    };

    /// `1.234,5`
    pub const COMMA: NumberFormat = NumberFormat {
        decimal_separator: ',',
        grouping_separator: Some('.'),
    };

    /// Parse a number written in this format. Leading `+` and surrounding
    /// blanks are accepted, as is a trailing decimal separator (`2048.`).
    pub fn parse_f64(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let normalized: String = text
            .chars()
            .filter(|c| Some(*c) != self.grouping_separator)
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect();
        let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
        normalized.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self::POINT
    }
}

// =============================================================================
// DecodeConfig
// =============================================================================

/// Replace an angle that a vendor is known to store incorrectly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleOverride {
    pub found: f64,
    pub replacement: f64,
    pub tolerance: f64,
}

impl AngleOverride {
    pub fn apply(&self, value: f64) -> Option<f64> {
        if (value - self.found).abs() <= self.tolerance {
            Some(self.replacement)
        } else {
            None
        }
    }
}

/// Settings threaded through every decode call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// Number format for text-based formats
    pub number_format: NumberFormat,

    /// Detector elevation corrections applied by binary decoders
    pub elevation_overrides: Vec<AngleOverride>,

    /// When set, truncated multi-record files and channel shortfalls fail
    /// the decode instead of producing a partial result
    pub strict: bool,

    /// Capacity of the decoded-file cache
    pub cache_capacity: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            number_format: NumberFormat::default(),
            elevation_overrides: vec![AngleOverride {
                found: SPC_BOGUS_ELEVATION,
                replacement: SPC_CORRECTED_ELEVATION,
                tolerance: 1e-3,
            }],
            strict: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl DecodeConfig {
    /// Defaults without any vendor value corrections.
    pub fn without_corrections() -> Self {
        Self {
            elevation_overrides: Vec::new(),
            ..Self::default()
        }
    }

    /// Apply the first matching elevation override.
    pub fn correct_elevation(&self, value: f64) -> Option<f64> {
        self.elevation_overrides.iter().find_map(|o| o.apply(value))
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let nf = self.number_format;
        if Some(nf.decimal_separator) == nf.grouping_separator {
            return Err("decimal and grouping separators must differ".to_string());
        }
        if nf.decimal_separator.is_ascii_digit() || nf.decimal_separator == '-' {
            return Err(format!(
                "'{}' cannot be used as a decimal separator",
                nf.decimal_separator
            ));
        }
        for o in &self.elevation_overrides {
            if !(-90.0..=90.0).contains(&o.replacement) || o.tolerance < 0.0 {
                return Err(format!(
                    "invalid elevation override {} -> {}",
                    o.found, o.replacement
                ));
            }
        }
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// eds-io - read, inspect and convert EDS spectrum files.
#[derive(Parser, Debug, Clone)]
#[command(name = "eds-io")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub decode: DecodeArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Options shared by every command that decodes files.
#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Parse text numbers with ',' as the decimal separator.
    #[arg(long, global = true, default_value_t = false, env = "EDS_DECIMAL_COMMA")]
    pub decimal_comma: bool,

    /// Keep detector elevations exactly as stored (disables the 57° → 37° fix).
    #[arg(long, global = true, default_value_t = false, env = "EDS_NO_ELEVATION_FIX")]
    pub no_elevation_fix: bool,

    /// Fail on truncated or short files instead of returning partial data.
    #[arg(long, global = true, default_value_t = false, env = "EDS_STRICT")]
    pub strict: bool,

    /// Maximum number of decoded files to cache.
    #[arg(long, global = true, default_value_t = DEFAULT_CACHE_CAPACITY, env = "EDS_CACHE_CAPACITY")]
    pub cache_capacity: usize,
}

impl DecodeArgs {
    pub fn to_config(&self) -> DecodeConfig {
        let base = if self.no_elevation_fix {
            DecodeConfig::without_corrections()
        } else {
            DecodeConfig::default()
        };
        DecodeConfig {
            number_format: if self.decimal_comma {
                NumberFormat::COMMA
            } else {
                NumberFormat::POINT
            },
            strict: self.strict,
            cache_capacity: self.cache_capacity,
            ..base
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Detect, decode and summarize spectrum files.
    Inspect(InspectConfig),
    /// Convert a spectrum file to another format.
    Convert(ConvertConfig),
    /// List supported formats in detection order.
    Formats,
    /// Work with ripple (.rpl/.raw) hyperspectral cubes.
    #[command(subcommand)]
    Cube(CubeCommand),
}

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Files to inspect.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Export targets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// EMSA/MAS text
    Emsa,
    /// Energy,counts CSV
    Csv,
    /// TIFF spectrum container
    Tiff,
    /// Raw little-endian 32-bit counts
    Dump,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Input spectrum file.
    pub input: PathBuf,

    /// Output file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output format.
    #[arg(long = "to", value_enum, default_value_t = ExportFormat::Emsa)]
    pub format: ExportFormat,

    /// Spectrum to export from a multi-spectrum file (0-based).
    #[arg(long, default_value_t = 0)]
    pub index: usize,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CubeCommand {
    /// Print the geometry of a cube.
    Info {
        /// Header (.rpl) file; the raw file is found next to it.
        header: PathBuf,
    },
    /// Extract the spectrum at one pixel.
    Extract(ExtractConfig),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractConfig {
    /// Header (.rpl) file.
    pub header: PathBuf,

    /// Pixel row.
    #[arg(long)]
    pub row: usize,

    /// Pixel column.
    #[arg(long)]
    pub col: usize,

    /// Output EMSA file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Channel width in eV.
    #[arg(long, default_value_t = 10.0)]
    pub width_ev: f64,

    /// Energy of channel 0 in eV.
    #[arg(long, default_value_t = 0.0)]
    pub offset_ev: f64,
}

// =============================================================================
// Tests
// =============================================================================
