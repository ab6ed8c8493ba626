//! Two-column CSV spectra: `Energy (eV),Counts`.
//!
//! Energies are the lower edge of each channel. The calibration is
//! recovered from the first two rows; later energies are not checked.
//! Lines starting with `#` are comments. With a decimal-comma number format
//! the columns are separated by `;`.

use std::io::Write;

use crate::config::{DecodeConfig, NumberFormat};
use crate::error::DecodeError;
use crate::spectrum::{Calibration, DecodeWarning, Decoded, Spectrum};

pub const ENERGY_HEADER: &str = "Energy (eV)";
pub const COUNTS_HEADER: &str = "Counts";

fn delimiter(format: &NumberFormat) -> u8 {
    if format.decimal_separator == ',' {
        b';'
    } else {
        b','
    }
}

/// First non-comment line is the two-column header.
pub fn sniff(prefix: &[u8]) -> bool {
    let text = String::from_utf8_lossy(prefix);
    let text = text.trim_start_matches('\u{feff}');
    let Some(first) = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
    else {
        return false;
    };
    let mut columns = first.split([',', ';']).map(str::trim);
    matches!(
        (columns.next(), columns.next(), columns.next()),
        (Some(e), Some(c), None)
            if e.eq_ignore_ascii_case(ENERGY_HEADER) && c.eq_ignore_ascii_case(COUNTS_HEADER)
    )
}

pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(bytes);
    let numbers = config.number_format;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .delimiter(delimiter(&numbers))
        .flexible(true)
        .from_reader(bytes);

    let mut energies = Vec::with_capacity(2);
    let mut counts = Vec::new();
    let mut warnings = Vec::new();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let (Some(energy), Some(value)) = (record.get(0), record.get(1)) else {
            return Err(DecodeError::InvalidValue {
                field: "CSV row",
                value: format!("row {} has {} columns", row + 1, record.len()),
            });
        };
        if energies.len() < 2 {
            let e = numbers
                .parse_f64(energy)
                .ok_or_else(|| DecodeError::InvalidValue {
                    field: "Energy (eV)",
                    value: energy.to_string(),
                })?;
            energies.push(e);
        }
        let count = match numbers.parse_f64(value) {
            Some(v) => v,
            None => {
                Decoded::warn(
                    &mut warnings,
                    DecodeWarning::Unparsable {
                        field: format!("Counts row {}", row + 1),
                        value: value.to_string(),
                    },
                );
                0.0
            }
        };
        counts.push(count);
    }

    if counts.is_empty() {
        return Err(DecodeError::InvalidValue {
            field: "CSV rows",
            value: "no data rows".to_string(),
        });
    }
    let calibration = match energies[..] {
        [e0, e1, ..] if e1 > e0 => Calibration::new(e0, e1 - e0),
        [e0, ..] => Calibration::new(e0, Calibration::default().width_ev),
        [] => Calibration::default(),
    };

    let clamped = Spectrum::clamped_count(&counts);
    if clamped > 0 {
        Decoded::warn(&mut warnings, DecodeWarning::ClampedChannels(clamped));
    }
    Ok(Decoded::single(Spectrum::new(counts, calibration), warnings))
}

/// Write the two-column form with `.` decimals and `,` separators.
pub fn write<W: Write>(spectrum: &Spectrum, out: W) -> Result<(), DecodeError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([ENERGY_HEADER, COUNTS_HEADER])?;
    for (i, count) in spectrum.channels().iter().enumerate() {
        writer.write_record([
            spectrum.energy_for_channel(i).to_string(),
            count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
