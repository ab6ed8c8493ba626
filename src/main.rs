//! eds-io - inspect and convert EDS spectrum files.
//!
//! This binary wires the library's decoders, exporters and cube codec to
//! the command line.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eds_io::{
    config::{Cli, Command, ConvertConfig, CubeCommand, ExportFormat, ExtractConfig, InspectConfig},
    cube::raw_path_for,
    format::{csv_text, dump, emsa, tiff_spectrum},
    Calibration, CubeFile, DecodeConfig, Decoded, SpectrumFormat, SpectrumLibrary, FORMATS,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.decode.to_config();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Inspect(c) => run_inspect(c, config),
        Command::Convert(c) => run_convert(c, config),
        Command::Formats => {
            run_formats();
            Ok(())
        }
        Command::Cube(CubeCommand::Info { header }) => run_cube_info(&header),
        Command::Cube(CubeCommand::Extract(c)) => run_cube_extract(c),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose { "eds_io=debug" } else { "eds_io=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Inspect Command
// =============================================================================

#[derive(Serialize)]
struct FileSummary {
    path: PathBuf,
    format: &'static str,
    spectra: Vec<SpectrumSummary>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct SpectrumSummary {
    channels: usize,
    offset_ev: f64,
    width_ev: f64,
    total_counts: f64,
    properties: Vec<(String, String)>,
}

impl FileSummary {
    fn new(path: &Path, format: SpectrumFormat, decoded: &Decoded) -> Self {
        Self {
            path: path.to_path_buf(),
            format: format.name(),
            spectra: decoded
                .spectra
                .iter()
                .map(|s| SpectrumSummary {
                    channels: s.channel_count(),
                    offset_ev: s.calibration().offset_ev,
                    width_ev: s.calibration().width_ev,
                    total_counts: s.total_counts(),
                    properties: s
                        .properties()
                        .iter()
                        .map(|(id, v)| (id.name().to_string(), v.to_string()))
                        .collect(),
                })
                .collect(),
            warnings: decoded.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    fn print(&self) {
        println!("{}", self.path.display());
        println!("  Format: {}", self.format);
        for (i, s) in self.spectra.iter().enumerate() {
            println!(
                "  Spectrum {}: {} channels, {} eV + {} eV/ch, {} counts",
                i, s.channels, s.offset_ev, s.width_ev, s.total_counts
            );
            for (name, value) in &s.properties {
                println!("    {}: {}", name, value);
            }
        }
        for w in &self.warnings {
            println!("  Warning: {}", w);
        }
    }
}

fn run_inspect(config: InspectConfig, decode: DecodeConfig) -> CliResult {
    let library = SpectrumLibrary::new(decode);
    let mut summaries = Vec::new();
    let mut failed = 0usize;

    for path in &config.files {
        match library.entry(path) {
            Ok(entry) => summaries.push(FileSummary::new(path, entry.format, &entry.decoded)),
            Err(e) => {
                warn!(path = %path.display(), "{}", e);
                failed += 1;
            }
        }
    }

    if config.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for s in &summaries {
            s.print();
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} files could not be decoded", failed, config.files.len()).into());
    }
    Ok(())
}

// =============================================================================
// Convert Command
// =============================================================================

fn run_convert(config: ConvertConfig, decode: DecodeConfig) -> CliResult {
    let (format, decoded) = eds_io::open_path(&config.input, &decode)?;
    let spectrum = decoded.spectra.get(config.index).ok_or_else(|| {
        format!(
            "{} holds {} spectra, no index {}",
            config.input.display(),
            decoded.len(),
            config.index
        )
    })?;

    let out = BufWriter::new(File::create(&config.output)?);
    match config.format {
        ExportFormat::Emsa => emsa::write(spectrum, out)?,
        ExportFormat::Csv => csv_text::write(spectrum, out)?,
        ExportFormat::Dump => dump::write(spectrum, out)?,
        ExportFormat::Tiff => {
            drop(out);
            std::fs::write(&config.output, tiff_spectrum::encode(std::slice::from_ref(spectrum))?)?;
        }
    }

    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        from = format.name(),
        "converted spectrum"
    );
    Ok(())
}

// =============================================================================
// Formats Command
// =============================================================================

fn run_formats() {
    for (i, format) in FORMATS.iter().enumerate() {
        println!(
            "{}. {:<16} .{}",
            i + 1,
            format.name(),
            format.extensions().join(", .")
        );
    }
}

// =============================================================================
// Cube Commands
// =============================================================================

fn run_cube_info(header: &Path) -> CliResult {
    let cube = CubeFile::open(header, raw_path_for(header))?;
    let h = cube.header();
    println!("{}", header.display());
    println!("  Size: {} x {} x {}", h.width, h.height, h.depth);
    println!(
        "  Elements: {} {}-byte, {}",
        h.data_type.name(),
        h.byte_depth,
        h.byte_order.name()
    );
    println!("  Offset: {}", h.offset);
    cube.close()?;
    Ok(())
}

fn run_cube_extract(config: ExtractConfig) -> CliResult {
    let mut cube = CubeFile::open(&config.header, raw_path_for(&config.header))?;
    let calibration = Calibration::new(config.offset_ev, config.width_ev);
    let spectrum = cube.spectrum_at(config.row, config.col, calibration)?;
    cube.close()?;

    emsa::write(&spectrum, BufWriter::new(File::create(&config.output)?))?;
    info!(
        row = config.row,
        col = config.col,
        output = %config.output.display(),
        "extracted pixel spectrum"
    );
    Ok(())
}
