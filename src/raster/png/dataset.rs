use std::io::Write;

use crate::dataset::{DatasetBackend, DatasetCommon};
use crate::errors::{GdalError, Result};
use crate::metadata::MetadataDomains;
use crate::options::Access;
use crate::raster::png::scanline::{ScanlineCache, ScanlineWriter};
use crate::raster::png::stream::{ChannelLayout, PngHeader, StreamSession};
use crate::raster::{BandInfo, ColorEntry, ColorInterpretation, ColorTable, GdalDataType};
use crate::vsi::{ByteSource, VsiFile};

pub(crate) const IMAGE_STRUCTURE: &str = "IMAGE_STRUCTURE";

/// Metadata key for a PNG text keyword.
pub(crate) fn metadata_key(keyword: &str) -> String {
    keyword
        .chars()
        .map(|c| match c {
            ' ' | '=' | ':' => '_',
            c => c,
        })
        .collect()
}

fn band_type(header: &PngHeader) -> GdalDataType {
    if header.bit_depth == 16 {
        GdalDataType::UInt16
    } else {
        GdalDataType::UInt8
    }
}

fn color_interpretation(layout: ChannelLayout, band: usize) -> ColorInterpretation {
    use ColorInterpretation::*;
    match (layout, band) {
        (ChannelLayout::Gray, _) => GrayIndex,
        (ChannelLayout::GrayAlpha, 1) => GrayIndex,
        (ChannelLayout::GrayAlpha, _) => AlphaBand,
        (ChannelLayout::Palette, _) => PaletteIndex,
        (_, 1) => RedBand,
        (_, 2) => GreenBand,
        (_, 3) => BlueBand,
        (_, _) => AlphaBand,
    }
}

/// Color table of a paletted image, alpha taken from `tRNS`.
fn palette_color_table(header: &PngHeader) -> Option<ColorTable> {
    let palette = header.palette.as_ref()?;
    let alpha = header.transparency.as_deref().unwrap_or(&[]);
    let mut table = ColorTable::default();
    for (i, rgb) in palette.chunks_exact(3).enumerate() {
        let a = alpha.get(i).copied().unwrap_or(255);
        table.set_color_entry(
            i as u16,
            &ColorEntry::rgba(rgb[0] as i16, rgb[1] as i16, rgb[2] as i16, a as i16),
        );
    }
    Some(table)
}

/// Dataset and band state described by a PNG header.
pub(crate) fn describe(description: &str, header: &PngHeader, access: Access) -> DatasetCommon {
    let band_type = band_type(header);
    let bands = (1..=header.channels())
        .map(|band| {
            let mut info = BandInfo::new(band_type, (header.width, 1));
            info.color_interpretation = color_interpretation(header.layout, band);
            if header.bit_depth < 8 {
                info.metadata
                    .set_item("NBITS", &header.bit_depth.to_string(), IMAGE_STRUCTURE);
            }
            if band == 1 && header.layout == ChannelLayout::Palette {
                info.color_table = palette_color_table(header);
            }
            info
        })
        .collect();

    let mut metadata = MetadataDomains::new();
    for (keyword, text) in &header.text {
        metadata.set_item(&metadata_key(keyword), text, "");
    }
    metadata.set_item("INTERLEAVE", "PIXEL", IMAGE_STRUCTURE);
    let interlaced = if header.interlaced { "YES" } else { "NO" };
    metadata.set_item("INTERLACED", interlaced, IMAGE_STRUCTURE);

    DatasetCommon {
        description: description.to_string(),
        raster_size: (header.width, header.height),
        bands,
        metadata,
        access,
        ..Default::default()
    }
}

fn check_row_block(block_index: (usize, usize)) -> Result<usize> {
    if block_index.0 != 0 {
        return Err(GdalError::BadArgument(format!(
            "block index {block_index:?} out of range"
        )));
    }
    Ok(block_index.1)
}

/// A PNG file opened for reading.
///
/// Blocks are single rows; each band read goes through the shared scanline cache.
pub struct PngDataset<S: ByteSource = VsiFile> {
    common: DatasetCommon,
    cache: ScanlineCache<S>,
}

impl<S: ByteSource> PngDataset<S> {
    pub fn new(description: &str, session: StreamSession<S>) -> Self {
        let common = describe(description, session.header(), Access::ReadOnly);
        PngDataset {
            common,
            cache: ScanlineCache::new(session),
        }
    }

    pub fn cache(&self) -> &ScanlineCache<S> {
        &self.cache
    }
}

impl<S: ByteSource> DatasetBackend for PngDataset<S> {
    fn common(&self) -> &DatasetCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut DatasetCommon {
        &mut self.common
    }

    fn read_block(&mut self, band: usize, block_index: (usize, usize), out: &mut [u8]) -> Result<()> {
        let y = check_row_block(block_index)?;
        self.cache
            .read_band_row(y, band, out)
            .map_err(GdalError::report)
    }

    fn flush_cache(&mut self) -> Result<()> {
        self.cache.flush();
        self.common.dirty = false;
        Ok(())
    }
}

/// A PNG file being written row by row.
pub struct PngWriteDataset<W: Write + Send + 'static = VsiFile> {
    common: DatasetCommon,
    writer: ScanlineWriter<W>,
}

impl<W: Write + Send + 'static> PngWriteDataset<W> {
    pub fn new(description: &str, writer: ScanlineWriter<W>) -> Self {
        let common = describe(description, writer.header(), Access::Update);
        PngWriteDataset { common, writer }
    }
}

impl<W: Write + Send + 'static> DatasetBackend for PngWriteDataset<W> {
    fn common(&self) -> &DatasetCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut DatasetCommon {
        &mut self.common
    }

    fn read_block(&mut self, _band: usize, _block_index: (usize, usize), _out: &mut [u8]) -> Result<()> {
        Err(GdalError::NotSupported(
            "reading back a PNG dataset being written".to_string(),
        )
        .report())
    }

    fn write_block(&mut self, band: usize, block_index: (usize, usize), data: &[u8]) -> Result<()> {
        let y = check_row_block(block_index)?;
        self.writer
            .write_band_row(y, band, data)
            .map_err(GdalError::report)
    }

    fn close(&mut self) -> Result<()> {
        self.writer.finish()
    }
}
