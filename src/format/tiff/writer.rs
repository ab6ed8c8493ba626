//! Little-endian classic TIFF encoder.
//!
//! Layout produced for a chain of directories:
//!
//! ```text
//! header (8) | dir 0 values | dir 0 IFD | dir 1 values | dir 1 IFD | ...
//! ```
//!
//! Out-of-line values and strip data are placed on even offsets directly
//! before the directory that references them.

use std::io;

use crate::io::{BinaryWriter, ByteOrder};

use super::parser::{IFD_ENTRY_SIZE, TIFF_HEADER_SIZE};
use super::tags::{FieldType, TiffTag};

#[derive(Debug, Clone)]
struct PendingEntry {
    tag: u16,
    field_type: FieldType,
    count: u32,
    data: Vec<u8>,
}

/// A directory under construction.
#[derive(Debug, Clone, Default)]
pub struct TiffDirectory {
    entries: Vec<PendingEntry>,
    strip: Option<Vec<u8>>,
}

impl TiffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, tag: TiffTag, field_type: FieldType, count: usize, data: Vec<u8>) {
        self.entries.retain(|e| e.tag != tag.as_u16());
        self.entries.push(PendingEntry {
            tag: tag.as_u16(),
            field_type,
            count: count as u32,
            data,
        });
    }

    pub fn short(&mut self, tag: TiffTag, values: &[u16]) -> &mut Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, FieldType::Short, values.len(), data);
        self
    }

    pub fn long(&mut self, tag: TiffTag, values: &[u32]) -> &mut Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, FieldType::Long, values.len(), data);
        self
    }

    pub fn double(&mut self, tag: TiffTag, values: &[f64]) -> &mut Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.push(tag, FieldType::Double, values.len(), data);
        self
    }

    /// NUL-terminated Latin-1 string; characters above U+00FF become `?`.
    pub fn ascii(&mut self, tag: TiffTag, text: &str) -> &mut Self {
        let mut data: Vec<u8> = text
            .chars()
            .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
            .collect();
        data.push(0);
        let count = data.len();
        self.push(tag, FieldType::Ascii, count, data);
        self
    }

    /// Attach a single-strip raster; StripOffsets and StripByteCounts are
    /// filled in during layout.
    pub fn strip(&mut self, pixels: Vec<u8>) -> &mut Self {
        self.strip = Some(pixels);
        self
    }
}

fn even(n: u64) -> u64 {
    n + (n & 1)
}

/// Serialize directories into a complete TIFF file.
pub fn encode_tiff(directories: &[TiffDirectory]) -> io::Result<Vec<u8>> {
    // Resolve strip placeholders into concrete entries and sort each
    // directory by tag, as readers expect.
    let mut dirs: Vec<(Vec<PendingEntry>, Option<&[u8]>)> = directories
        .iter()
        .map(|d| {
            let mut entries = d.entries.clone();
            if d.strip.is_some() {
                entries.retain(|e| {
                    e.tag != TiffTag::StripOffsets.as_u16()
                        && e.tag != TiffTag::StripByteCounts.as_u16()
                });
                for tag in [TiffTag::StripOffsets, TiffTag::StripByteCounts] {
                    entries.push(PendingEntry {
                        tag: tag.as_u16(),
                        field_type: FieldType::Long,
                        count: 1,
                        data: vec![0; 4],
                    });
                }
            }
            entries.sort_by_key(|e| e.tag);
            (entries, d.strip.as_deref())
        })
        .collect();

    // First pass: assign offsets.
    let mut pos = TIFF_HEADER_SIZE as u64;
    let mut ifd_offsets = Vec::with_capacity(dirs.len());
    let mut value_offsets: Vec<Vec<Option<u64>>> = Vec::with_capacity(dirs.len());
    let mut strip_offsets = Vec::with_capacity(dirs.len());
    for (entries, strip) in &dirs {
        strip_offsets.push(strip.map(|s| {
            let at = pos;
            pos = even(pos + s.len() as u64);
            at
        }));
        let offsets = entries
            .iter()
            .map(|e| {
                if e.data.len() > FieldType::INLINE_THRESHOLD {
                    let at = pos;
                    pos = even(pos + e.data.len() as u64);
                    Some(at)
                } else {
                    None
                }
            })
            .collect();
        value_offsets.push(offsets);
        ifd_offsets.push(pos);
        pos += 2 + (entries.len() * IFD_ENTRY_SIZE) as u64 + 4;
    }

    // Fill in strip locations now that they are known.
    for (i, (entries, strip)) in dirs.iter_mut().enumerate() {
        if let (Some(strip), Some(at)) = (strip, strip_offsets[i]) {
            for e in entries.iter_mut() {
                if e.tag == TiffTag::StripOffsets.as_u16() {
                    e.data = (at as u32).to_le_bytes().to_vec();
                } else if e.tag == TiffTag::StripByteCounts.as_u16() {
                    e.data = (strip.len() as u32).to_le_bytes().to_vec();
                }
            }
        }
    }

    // Second pass: write.
    let mut w = BinaryWriter::new(Vec::with_capacity(pos as usize), ByteOrder::LittleEndian);
    w.write_bytes(b"II")?;
    w.write_u16(42)?;
    w.write_u32(ifd_offsets.first().copied().unwrap_or(0) as u32)?;

    for (i, (entries, strip)) in dirs.iter().enumerate() {
        if let (Some(strip), Some(at)) = (strip, strip_offsets[i]) {
            w.pad_to(at)?;
            w.write_bytes(strip)?;
        }
        for (e, at) in entries.iter().zip(&value_offsets[i]) {
            if let Some(at) = at {
                w.pad_to(*at)?;
                w.write_bytes(&e.data)?;
            }
        }

        w.pad_to(ifd_offsets[i])?;
        w.write_u16(entries.len() as u16)?;
        for (e, at) in entries.iter().zip(&value_offsets[i]) {
            w.write_u16(e.tag)?;
            w.write_u16(e.field_type.as_u16())?;
            w.write_u32(e.count)?;
            match at {
                Some(at) => w.write_u32(*at as u32)?,
                None => {
                    let mut inline = [0u8; 4];
                    inline[..e.data.len()].copy_from_slice(&e.data);
                    w.write_bytes(&inline)?;
                }
            }
        }
        let next = ifd_offsets.get(i + 1).copied().unwrap_or(0);
        w.write_u32(next as u32)?;
    }

    Ok(w.into_inner())
}
