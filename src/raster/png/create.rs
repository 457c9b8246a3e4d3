use std::path::Path;

use crate::cpl::CslStringList;
use crate::dataset::{Dataset, DatasetBackend, OpenInfo};
use crate::errors::{CplErrorNum, GdalError, Result};
use crate::metadata::Metadata;
use crate::options::Access;
use crate::raster::png::dataset::{PngWriteDataset, IMAGE_STRUCTURE};
use crate::raster::png::scanline::ScanlineWriter;
use crate::raster::png::stream::{compression_for_level, ChannelLayout, EncodeSession, PngHeader};
use crate::raster::{ColorTable, GdalDataType};
use crate::{config, vsi};

/// Longest keyword allowed in a text chunk.
const MAX_KEYWORD_LEN: usize = 79;

fn check_band_count(bands: usize) -> Result<ChannelLayout> {
    ChannelLayout::from_band_count(bands).ok_or_else(|| {
        GdalError::NotSupported(format!(
            "PNG driver doesn't support {bands} bands. Must be 1 (grey), \
             2 (grey+alpha), 3 (rgb) or 4 (rgba) bands."
        ))
        .report()
    })
}

fn zlevel(options: &CslStringList) -> Result<u8> {
    let Some(value) = options.fetch_name_value("ZLEVEL") else {
        return Ok(6);
    };
    match value.trim().parse::<u8>() {
        Ok(level @ 1..=9) => Ok(level),
        _ => Err(GdalError::BadArgument(format!(
            "ZLEVEL={value} is invalid, expected a value between 1 and 9"
        ))
        .report()),
    }
}

/// Bit depth for `band_type`, honouring `NBITS` on gray and paletted byte images.
fn bit_depth(
    band_type: GdalDataType,
    layout: ChannelLayout,
    nbits: Option<&str>,
) -> Result<u8> {
    let natural = if band_type == GdalDataType::UInt16 { 16 } else { 8 };
    let Some(nbits) = nbits else {
        return Ok(natural);
    };
    let sub_byte_allowed = natural == 8
        && matches!(layout, ChannelLayout::Gray | ChannelLayout::Palette);
    match nbits.trim().parse::<u8>() {
        Ok(bits) if bits == natural => Ok(bits),
        Ok(bits @ (1 | 2 | 4)) if sub_byte_allowed => Ok(bits),
        _ => Err(GdalError::BadArgument(format!(
            "NBITS={nbits} is not supported for a {} band {band_type} image",
            layout.channels()
        ))),
    }
}

fn start_writer(path: &Path, header: &PngHeader, level: u8) -> Result<ScanlineWriter<vsi::VsiFile>> {
    let file = vsi::create(path).map_err(|e| {
        GdalError::OpenFailed {
            path: path.display().to_string(),
            msg: format!("Unable to create png file: {e}"),
        }
        .report()
    })?;
    let session = EncodeSession::create(file, header, compression_for_level(level))?;
    Ok(ScanlineWriter::new(session))
}

/// Creates an empty PNG to be written row by row.
///
/// The header is written immediately, so palettes and text cannot be added
/// afterwards. Rows not written before closing are zero.
pub(crate) fn create(
    path: &Path,
    size: (usize, usize),
    bands: usize,
    band_type: GdalDataType,
    options: &CslStringList,
) -> Result<Box<dyn DatasetBackend>> {
    let layout = check_band_count(bands)?;
    if !matches!(band_type, GdalDataType::UInt8 | GdalDataType::UInt16) {
        return Err(GdalError::NotSupported(format!(
            "PNG driver doesn't support data type {band_type}. \
             Only eight and sixteen bit bands supported."
        ))
        .report());
    }
    let depth = bit_depth(band_type, layout, options.fetch_name_value("NBITS"))
        .map_err(GdalError::report)?;
    let header = PngHeader::new(size.0, size.1, depth, layout);
    let writer = start_writer(path, &header, zlevel(options)?)?;
    Ok(Box::new(PngWriteDataset::new(
        &path.display().to_string(),
        writer,
    )))
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| (c as u32) <= 0xff)
}

/// `PLTE` and `tRNS` content for `table`; transparency is trimmed after the
/// last non-opaque entry.
fn palette_chunks(table: &ColorTable) -> (Vec<u8>, Option<Vec<u8>>) {
    let count = table.entry_count().min(256);
    let mut palette = Vec::with_capacity(count * 3);
    let mut alpha = Vec::with_capacity(count);
    for entry in (0..count).filter_map(|i| table.entry_as_rgb(i)) {
        for c in [entry.r, entry.g, entry.b] {
            palette.push(c.clamp(0, 255) as u8);
        }
        alpha.push(entry.a.clamp(0, 255) as u8);
    }
    let opaque = alpha.iter().rposition(|&a| a != 255).map_or(0, |i| i + 1);
    alpha.truncate(opaque);
    (palette, (!alpha.is_empty()).then_some(alpha))
}

/// Writes `source` as a PNG, then reopens the result read-only.
pub(crate) fn create_copy(
    path: &Path,
    source: &Dataset,
    strict: bool,
    options: &CslStringList,
) -> Result<Box<dyn DatasetBackend>> {
    let bands = source.raster_count();
    let mut layout = check_band_count(bands)?;
    let first = source.rasterband(1)?;

    let source_type = first.band_type();
    let band_type = match source_type {
        GdalDataType::UInt8 | GdalDataType::UInt16 => source_type,
        _ if strict => {
            return Err(GdalError::NotSupported(format!(
                "PNG driver doesn't support data type {source_type}. \
                 Only eight and sixteen bit bands supported."
            ))
            .report());
        }
        _ => {
            config::warn(
                CplErrorNum::NotSupported,
                &format!("PNG driver doesn't support data type {source_type}, converting to Byte"),
            );
            GdalDataType::UInt8
        }
    };

    let mut palette = None;
    if let (Some(table), GdalDataType::UInt8, 1) = (first.color_table(), band_type, bands) {
        layout = ChannelLayout::Palette;
        palette = Some(palette_chunks(&table));
    }

    let nbits = options
        .fetch_name_value("NBITS")
        .map(str::to_string)
        .or_else(|| first.metadata_item("NBITS", IMAGE_STRUCTURE));
    let depth = match bit_depth(band_type, layout, nbits.as_deref()) {
        Ok(depth) => depth,
        Err(err) if options.fetch_name_value("NBITS").is_some() => return Err(err.report()),
        Err(_) if band_type == GdalDataType::UInt16 => 16,
        Err(_) => 8,
    };

    let (width, height) = source.raster_size();
    let mut header = PngHeader::new(width, height, depth, layout);
    if let Some((plte, trns)) = palette {
        header.palette = Some(plte);
        header.transparency = trns;
    }
    header.text = source
        .metadata_domain("")
        .unwrap_or_default()
        .iter()
        .filter_map(|item| item.split_once('='))
        .filter(|(key, value)| {
            !key.is_empty() && key.len() <= MAX_KEYWORD_LEN && is_latin1(key) && is_latin1(value)
        })
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

    let mut writer = start_writer(path, &header, zlevel(options)?)?;
    let sample = band_type.bytes();
    for y in 0..height {
        for src in source.rasterbands() {
            let row = if src.band_type() == band_type {
                src.read_raw_row(y)?
            } else if band_type == GdalDataType::UInt16 {
                src.read_as::<u16>((0, y as isize), (width, 1), (width, 1))?
                    .data
                    .iter()
                    .flat_map(|v| v.to_ne_bytes())
                    .collect()
            } else {
                src.read_as::<u8>((0, y as isize), (width, 1), (width, 1))?.data
            };
            debug_assert_eq!(row.len(), width * sample);
            writer.write_band_row(y, src.band_index(), &row)?;
        }
    }
    writer.finish()?;
    drop(writer);

    let info = OpenInfo::new(path, Access::ReadOnly, CslStringList::new());
    super::open(&info)
}
