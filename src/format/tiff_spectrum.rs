//! Spectra stored in a TIFF image container.
//!
//! Each directory carrying the private `SpectrumCounts` tag (50000) yields
//! one spectrum. Its `SpectrumHeader` tag (50001) holds an EMSA-style keyword
//! block with calibration and acquisition metadata. The directory's raster,
//! when it is an uncompressed 8-bit gray or RGB strip image, becomes the
//! spectrum's micro-image; directories without their own raster share the
//! first one found in the chain.

use image::{DynamicImage, GrayImage, RgbImage};

use crate::config::DecodeConfig;
use crate::error::{DecodeError, TiffError};
use crate::spectrum::{DecodeWarning, Decoded, PropertyId, Spectrum};

use super::emsa;
use super::tiff::{
    encode_tiff, read_ifd_chain, Compression, Ifd, TiffDirectory, TiffHeader, TiffTag, ValueReader,
};

/// Photometric interpretations understood by the raster reader.
const PHOTOMETRIC_WHITE_IS_ZERO: u32 = 0;
const PHOTOMETRIC_BLACK_IS_ZERO: u32 = 1;
const PHOTOMETRIC_RGB: u32 = 2;

// =============================================================================
// Sniff
// =============================================================================

/// A classic TIFF whose first directory carries spectrum counts.
pub fn sniff(bytes: &[u8]) -> bool {
    let Ok(header) = TiffHeader::parse(bytes, bytes.len() as u64) else {
        return false;
    };
    Ifd::parse(bytes, header.first_ifd_offset, header.byte_order)
        .map(|ifd| ifd.has(TiffTag::SpectrumCounts))
        .unwrap_or(false)
}

// =============================================================================
// Decode
// =============================================================================

pub fn decode(bytes: &[u8], config: &DecodeConfig) -> Result<Decoded, DecodeError> {
    let header = TiffHeader::parse(bytes, bytes.len() as u64)?;
    let chain = read_ifd_chain(bytes, &header)?;
    let values = ValueReader::new(bytes, &header);
    let mut warnings = Vec::new();

    let mut rasters = Vec::with_capacity(chain.len());
    for ifd in &chain {
        let raster = match read_raster(&values, ifd) {
            Ok(raster) => raster,
            Err(err) => {
                Decoded::warn(
                    &mut warnings,
                    DecodeWarning::Unparsable {
                        field: PropertyId::MicroImage.name().to_string(),
                        value: err.to_string(),
                    },
                );
                None
            }
        };
        rasters.push(raster);
    }
    let shared = rasters.iter().flatten().next().cloned();

    let mut spectra = Vec::new();
    for (ifd, raster) in chain.iter().zip(rasters) {
        let Some(counts_entry) = ifd.get(TiffTag::SpectrumCounts) else {
            continue;
        };
        let mut counts = values.read_f64_array(counts_entry)?;

        let header_text = match ifd.get(TiffTag::SpectrumHeader) {
            Some(entry) => values.read_string(entry)?,
            None => String::new(),
        };
        let mut block = emsa::parse_keywords(&header_text, config)?;
        warnings.append(&mut block.warnings);

        if let Some(declared) = block.npoints {
            emsa::fill_shortfall(
                &mut counts,
                declared,
                bytes.len(),
                emsa::ShortfallContext {
                    offset: ifd.offset,
                    field: "SpectrumCounts",
                },
                config,
                &mut warnings,
            )?;
        }

        if let Some(entry) = ifd.get(TiffTag::ImageDescription) {
            let description = values.read_string(entry)?;
            let already = block
                .properties
                .text(PropertyId::SpecimenDescription)
                .is_some_and(|d| d.contains(description.trim()));
            if !already {
                block
                    .properties
                    .append_text(PropertyId::SpecimenDescription, &description)?;
            }
        }

        if let Some(image) = raster.or_else(|| shared.clone()) {
            block.properties.set_image(PropertyId::MicroImage, image)?;
        }

        let clamped = Spectrum::clamped_count(&counts);
        if clamped > 0 {
            Decoded::warn(&mut warnings, DecodeWarning::ClampedChannels(clamped));
        }
        spectra.push(Spectrum::new(counts, block.calibration).with_properties(block.properties));
    }

    if spectra.is_empty() {
        return Err(DecodeError::InvalidValue {
            field: "SpectrumCounts",
            value: format!("none of {} directories carries spectrum counts", chain.len()),
        });
    }
    tracing::debug!(spectra = spectra.len(), "decoded TIFF spectrum file");

    Ok(Decoded { spectra, warnings })
}

/// Read an uncompressed 8-bit gray or RGB strip raster.
///
/// Returns `Ok(None)` when the directory has no raster, when its layout is
/// one this reader does not handle, or when it is the 1x1 placeholder the
/// encoder writes for spectra without an image.
fn read_raster(values: &ValueReader<'_>, ifd: &Ifd) -> Result<Option<DynamicImage>, TiffError> {
    let (Some(offsets_entry), Some(counts_entry)) = (
        ifd.get(TiffTag::StripOffsets),
        ifd.get(TiffTag::StripByteCounts),
    ) else {
        return Ok(None);
    };
    let (Some(width_entry), Some(height_entry)) =
        (ifd.get(TiffTag::ImageWidth), ifd.get(TiffTag::ImageLength))
    else {
        return Ok(None);
    };
    let width = values.read_u32(width_entry)?;
    let height = values.read_u32(height_entry)?;
    if width <= 1 && height <= 1 {
        return Ok(None);
    }

    let compression = match ifd.get(TiffTag::Compression) {
        Some(e) => values.read_u32(e)? as u16,
        None => Compression::None as u16,
    };
    if !Compression::from_u16(compression).is_some_and(Compression::is_supported) {
        return Err(TiffError::UnsupportedCompression(compression));
    }

    let samples = match ifd.get(TiffTag::SamplesPerPixel) {
        Some(e) => values.read_u32(e)?,
        None => 1,
    };
    let bits = match ifd.get(TiffTag::BitsPerSample) {
        Some(e) => values.read_u32_array(e)?,
        None => vec![1],
    };
    if bits.iter().any(|&b| b != 8) || !(samples == 1 || samples == 3) {
        tracing::debug!(?bits, samples, "raster layout not supported, skipping");
        return Ok(None);
    }
    if samples == 3 {
        if let Some(e) = ifd.get(TiffTag::PlanarConfiguration) {
            if values.read_u32(e)? != 1 {
                tracing::debug!("planar RGB raster not supported, skipping");
                return Ok(None);
            }
        }
    }

    let offsets = values.read_u32_array(offsets_entry)?;
    let byte_counts = values.read_u32_array(counts_entry)?;
    let expected = width as u64 * height as u64 * samples as u64;
    let mut pixels = Vec::with_capacity(expected.min(1 << 26) as usize);
    let file = values.bytes();
    for (&offset, &count) in offsets.iter().zip(&byte_counts) {
        let start = offset as usize;
        let strip = start
            .checked_add(count as usize)
            .and_then(|end| file.get(start..end))
            .ok_or(TiffError::ValueOutOfBounds {
                tag: TiffTag::StripOffsets.as_u16(),
                offset: offset as u64,
                len: count as u64,
            })?;
        pixels.extend_from_slice(strip);
    }
    if (pixels.len() as u64) < expected {
        return Err(TiffError::InvalidTagValue {
            tag: TiffTag::StripByteCounts.name(),
            message: format!("{} pixel bytes, raster needs {}", pixels.len(), expected),
        });
    }
    pixels.truncate(expected as usize);

    let photometric = match ifd.get(TiffTag::PhotometricInterpretation) {
        Some(e) => values.read_u32(e)?,
        None if samples == 3 => PHOTOMETRIC_RGB,
        None => PHOTOMETRIC_BLACK_IS_ZERO,
    };

    let image = match (samples, photometric) {
        (1, PHOTOMETRIC_WHITE_IS_ZERO) => {
            pixels.iter_mut().for_each(|p| *p = 255 - *p);
            GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        (1, _) => GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
        (3, PHOTOMETRIC_RGB) => RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        _ => None,
    };
    Ok(image)
}

// =============================================================================
// Encode
// =============================================================================

/// Encode spectra as a little-endian TIFF, one directory per spectrum.
pub fn encode(spectra: &[Spectrum]) -> Result<Vec<u8>, DecodeError> {
    let mut directories = Vec::with_capacity(spectra.len());
    for spectrum in spectra {
        let (width, height, samples, pixels) =
            match spectrum.properties().image(PropertyId::MicroImage) {
                Some(DynamicImage::ImageLuma8(gray)) => {
                    (gray.width(), gray.height(), 1u16, gray.as_raw().clone())
                }
                Some(other) => {
                    let rgb = other.to_rgb8();
                    (rgb.width(), rgb.height(), 3u16, rgb.into_raw())
                }
                None => (1, 1, 1u16, vec![0u8]),
            };
        let photometric = if samples == 3 {
            PHOTOMETRIC_RGB
        } else {
            PHOTOMETRIC_BLACK_IS_ZERO
        };

        let mut dir = TiffDirectory::new();
        dir.long(TiffTag::ImageWidth, &[width])
            .long(TiffTag::ImageLength, &[height])
            .short(TiffTag::BitsPerSample, &vec![8; samples as usize])
            .short(TiffTag::Compression, &[Compression::None as u16])
            .short(TiffTag::PhotometricInterpretation, &[photometric as u16])
            .short(TiffTag::SamplesPerPixel, &[samples])
            .long(TiffTag::RowsPerStrip, &[height])
            .short(TiffTag::PlanarConfiguration, &[1])
            .ascii(TiffTag::Software, concat!("eds-io ", env!("CARGO_PKG_VERSION")))
            .double(TiffTag::SpectrumCounts, spectrum.channels())
            .ascii(TiffTag::SpectrumHeader, &emsa::header_text(spectrum))
            .strip(pixels);
        directories.push(dir);
    }
    Ok(encode_tiff(&directories)?)
}

// =============================================================================
// Tests
// =============================================================================
