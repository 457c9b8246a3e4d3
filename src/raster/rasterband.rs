use std::fmt::{Debug, Formatter};

use crate::dataset::Dataset;
use crate::errors::{CplErrType, CplErrorNum, GdalError, Result};
use crate::metadata::{check_metadata_key, Metadata, MetadataDomains};
use crate::options::Access;
use crate::raster::{Buffer, GdalDataType, GdalType};

#[cfg(feature = "ndarray")]
use ndarray::Array2;

/// Per-band state held by a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct BandInfo {
    pub band_type: GdalDataType,
    pub block_size: (usize, usize),
    pub color_interpretation: ColorInterpretation,
    pub color_table: Option<ColorTable>,
    pub description: String,
    pub no_data_value: Option<f64>,
    pub metadata: MetadataDomains,
}

impl BandInfo {
    pub fn new(band_type: GdalDataType, block_size: (usize, usize)) -> Self {
        BandInfo {
            band_type,
            block_size,
            color_interpretation: ColorInterpretation::Undefined,
            color_table: None,
            description: String::new(),
            no_data_value: None,
            metadata: MetadataDomains::new(),
        }
    }
}

/// Represents a single band of a dataset.
///
/// This object carries the lifetime of the dataset that
/// contains it. This is necessary to prevent the dataset
/// from being dropped before the band.
pub struct RasterBand<'a> {
    dataset: &'a Dataset,
    band: usize,
}

impl<'a> RasterBand<'a> {
    pub(crate) fn new(dataset: &'a Dataset, band: usize) -> Self {
        RasterBand { dataset, band }
    }

    fn info<R>(&self, f: impl FnOnce(&BandInfo) -> R) -> R {
        let backend = self.dataset.backend();
        f(&backend.common().bands[self.band - 1])
    }

    fn info_mut<R>(&self, f: impl FnOnce(&mut BandInfo) -> R) -> R {
        let mut backend = self.dataset.backend_mut();
        let common = backend.common_mut();
        common.dirty = true;
        f(&mut common.bands[self.band - 1])
    }

    /// The 1-based index of this band in its dataset.
    pub fn band_index(&self) -> usize {
        self.band
    }

    /// Get block size from a 'Dataset'.
    pub fn block_size(&self) -> (usize, usize) {
        self.info(|info| info.block_size)
    }

    /// Get x-size of the band
    pub fn x_size(&self) -> usize {
        self.size().0
    }

    /// Get y-size of the band
    pub fn y_size(&self) -> usize {
        self.size().1
    }

    /// Get dimensions of the band.
    pub fn size(&self) -> (usize, usize) {
        self.dataset.raster_size()
    }

    pub fn band_type(&self) -> GdalDataType {
        self.info(|info| info.band_type)
    }

    /// Get actual block size (at the edges) when block size
    /// does not divide band size.
    pub fn actual_block_size(&self, block_index: (usize, usize)) -> Result<(usize, usize)> {
        clip_block(self.block_size(), self.size(), block_index)
    }

    /// Read a [`Buffer<T>`] from a block. T implements [`GdalType`].
    ///
    /// # Arguments
    /// * block_index - the block index
    pub fn read_block<T: GdalType>(&self, block_index: (usize, usize)) -> Result<Buffer<T>> {
        let size = self.actual_block_size(block_index)?;
        let band_type = self.band_type();
        let mut raw = vec![0u8; size.0 * size.1 * band_type.bytes()];
        self.dataset
            .backend_mut()
            .read_block(self.band, block_index, &mut raw)?;
        let data = raw
            .chunks_exact(band_type.bytes())
            .map(|sample| T::from_f64(band_type.read_f64(sample)))
            .collect();
        Ok(Buffer::new(size, data))
    }

    /// Reads row `y` of the band as native-endian samples of the band type.
    pub(crate) fn read_raw_row(&self, y: usize) -> Result<Vec<u8>> {
        let (bw, bh) = self.block_size();
        let size = self.size();
        let sample = self.band_type().bytes();
        let mut row = vec![0u8; size.0 * sample];
        let mut backend = self.dataset.backend_mut();
        let mut block = Vec::new();
        for bx in 0..size.0.div_ceil(bw) {
            let (aw, ah) = clip_block((bw, bh), size, (bx, y / bh))?;
            block.resize(aw * ah * sample, 0);
            backend.read_block(self.band, (bx, y / bh), &mut block)?;
            let line = (y % bh) * aw * sample;
            row[bx * bw * sample..(bx * bw + aw) * sample]
                .copy_from_slice(&block[line..line + aw * sample]);
        }
        Ok(row)
    }

    /// Writes `bytes` (native-endian samples) into row `y` starting at column `x0`.
    ///
    /// Blocks that are only partially covered are read back first.
    pub(crate) fn write_raw_row(&self, y: usize, x0: usize, bytes: &[u8]) -> Result<()> {
        let (bw, bh) = self.block_size();
        let size = self.size();
        let sample = self.band_type().bytes();
        let x1 = x0 + bytes.len() / sample;
        let mut backend = self.dataset.backend_mut();
        for bx in x0 / bw..x1.div_ceil(bw) {
            let block_index = (bx, y / bh);
            let (aw, ah) = clip_block((bw, bh), size, block_index)?;
            let (bx0, bx1) = (bx * bw, bx * bw + aw);
            let (sx0, sx1) = (x0.max(bx0), x1.min(bx1));
            let src = &bytes[(sx0 - x0) * sample..(sx1 - x0) * sample];
            if ah == 1 && sx0 == bx0 && sx1 == bx1 {
                backend.write_block(self.band, block_index, src)?;
                continue;
            }
            let mut block = vec![0u8; aw * ah * sample];
            backend.read_block(self.band, block_index, &mut block)?;
            let start = ((y % bh) * aw + (sx0 - bx0)) * sample;
            block[start..start + src.len()].copy_from_slice(src);
            backend.write_block(self.band, block_index, &block)?;
        }
        Ok(())
    }

    /// Read a 'Buffer<T>' from this band. T implements 'GdalType'
    ///
    /// Rows are fetched top to bottom, so sequential formats decode each row once.
    /// Pixels are resampled with nearest neighbour when `window_size != buffer_size`.
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size
    /// * buffer_size - the desired size of the 'Buffer'
    pub fn read_as<T: GdalType>(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        buffer_size: (usize, usize),
    ) -> Result<Buffer<T>> {
        let (x0, y0) = self.check_window(window, window_size)?;
        let band_type = self.band_type();
        let sample = band_type.bytes();
        let (cols, rows) = buffer_size;
        let mut data = Vec::with_capacity(cols * rows);

        let mut row = Vec::new();
        let mut row_y = None;
        for j in 0..rows {
            let src_y = y0 + (2 * j + 1) * window_size.1 / (2 * rows);
            if row_y != Some(src_y) {
                row = self.read_raw_row(src_y)?;
                row_y = Some(src_y);
            }
            for i in 0..cols {
                let src_x = x0 + (2 * i + 1) * window_size.0 / (2 * cols);
                data.push(T::from_f64(band_type.read_f64(&row[src_x * sample..])));
            }
        }
        Ok(Buffer::new(buffer_size, data))
    }

    fn check_window(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
    ) -> Result<(usize, usize)> {
        let (w, h) = self.size();
        let fits = window.0 >= 0
            && window.1 >= 0
            && window.0 as usize + window_size.0 <= w
            && window.1 as usize + window_size.1 <= h;
        if !fits {
            return Err(GdalError::BadArgument(format!(
                "window {window:?} of size {window_size:?} is outside of raster of size {:?}",
                (w, h)
            ))
            .report());
        }
        Ok((window.0 as usize, window.1 as usize))
    }

    #[cfg(feature = "ndarray")]
    #[cfg_attr(docsrs, doc(cfg(feature = "array")))]
    /// Read a 'Array2<T>' from this band. T implements 'GdalType'.
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size
    /// * array_size - the desired size of the 'Array'
    /// # Docs
    /// The Matrix shape is (rows, cols) and raster shape is (cols in x-axis, rows in y-axis).
    pub fn read_as_array<T: GdalType>(
        &self,
        window: (isize, isize),
        window_size: (usize, usize),
        array_size: (usize, usize),
    ) -> Result<Array2<T>> {
        self.read_as::<T>(window, window_size, array_size)?
            .to_array()
    }

    /// Read the full band as a 'Buffer<T>'.
    pub fn read_band_as<T: GdalType>(&self) -> Result<Buffer<T>> {
        let size = self.size();
        self.read_as::<T>((0, 0), size, size)
    }

    /// Write a 'Buffer<T>' into a 'Dataset'.
    ///
    /// Values are converted to the band type, rounding and saturating for integer
    /// bands. Resampling is not supported on write: `buffer.size` must equal
    /// `window_size`.
    ///
    /// # Arguments
    /// * window - the window position from top left
    /// * window_size - the window size
    pub fn write<T: GdalType>(
        &mut self,
        window: (isize, isize),
        window_size: (usize, usize),
        buffer: &Buffer<T>,
    ) -> Result<()> {
        if self.dataset.access() == Access::ReadOnly {
            return Err(GdalError::CplError {
                class: CplErrType::Failure,
                number: CplErrorNum::NoWriteAccess,
                msg: "dataset is opened in read-only mode".to_string(),
            }
            .report());
        }
        if buffer.size != window_size {
            return Err(GdalError::NotSupported(format!(
                "buffer of size {:?} does not match window of size {window_size:?}",
                buffer.size
            )));
        }
        let (x0, y0) = self.check_window(window, window_size)?;
        let band_type = self.band_type();
        let sample = band_type.bytes();
        let mut bytes = vec![0u8; window_size.0 * sample];
        for j in 0..window_size.1 {
            for (value, out) in buffer.row(j).iter().zip(bytes.chunks_exact_mut(sample)) {
                band_type.write_f64(value.to_f64(), out);
            }
            self.write_raw_row(y0 + j, x0, &bytes)?;
        }
        Ok(())
    }

    pub fn no_data_value(&self) -> Option<f64> {
        self.info(|info| info.no_data_value)
    }

    /// Set the no data value of this band.
    ///
    /// If `no_data` is `None`, any existing no-data value is deleted.
    pub fn set_no_data_value(&mut self, no_data: Option<f64>) -> Result<()> {
        self.info_mut(|info| info.no_data_value = no_data);
        Ok(())
    }

    /// Returns the color interpretation of this band.
    pub fn color_interpretation(&self) -> ColorInterpretation {
        self.info(|info| info.color_interpretation)
    }

    /// Set the color interpretation for this band.
    pub fn set_color_interpretation(&mut self, interp: ColorInterpretation) -> Result<()> {
        self.info_mut(|info| info.color_interpretation = interp);
        Ok(())
    }

    /// Get the color table for this band if it has one.
    pub fn color_table(&self) -> Option<ColorTable> {
        self.info(|info| info.color_table.clone())
    }

    /// Set the color table for this band.
    pub fn set_color_table(&mut self, colors: &ColorTable) {
        self.info_mut(|info| info.color_table = Some(colors.clone()));
    }

    pub fn set_description(&mut self, description: &str) -> Result<()> {
        self.info_mut(|info| info.description = description.to_string());
        Ok(())
    }
}

fn clip_block(
    block_size: (usize, usize),
    raster_size: (usize, usize),
    block_index: (usize, usize),
) -> Result<(usize, usize)> {
    let (x0, y0) = (block_index.0 * block_size.0, block_index.1 * block_size.1);
    if x0 >= raster_size.0 || y0 >= raster_size.1 {
        return Err(GdalError::BadArgument(format!(
            "block index {block_index:?} out of range"
        )));
    }
    Ok((
        block_size.0.min(raster_size.0 - x0),
        block_size.1.min(raster_size.1 - y0),
    ))
}

impl Metadata for RasterBand<'_> {
    fn metadata_store(&self) -> MetadataDomains {
        self.info(|info| info.metadata.clone())
    }

    fn set_metadata_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()> {
        check_metadata_key(key)?;
        self.info_mut(|info| info.metadata.set_item(key, value, domain));
        Ok(())
    }

    fn description(&self) -> Result<String> {
        Ok(self.info(|info| info.description.clone()))
    }
}

impl Debug for RasterBand<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterBand")
            .field("band", &self.band)
            .field("band_type", &self.band_type())
            .field("size", &self.size())
            .finish()
    }
}

/// Color interpretation of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorInterpretation {
    /// Undefined
    Undefined,
    /// Grayscale
    GrayIndex,
    /// Paletted (see associated color table)
    PaletteIndex,
    /// Red band of RGBA image
    RedBand,
    /// Green band of RGBA image
    GreenBand,
    /// Blue band of RGBA image
    BlueBand,
    /// Alpha (0=transparent, 255=opaque)
    AlphaBand,
}

impl ColorInterpretation {
    /// Returns the name of this color interpretation.
    pub fn name(&self) -> &'static str {
        match self {
            ColorInterpretation::Undefined => "Undefined",
            ColorInterpretation::GrayIndex => "Gray",
            ColorInterpretation::PaletteIndex => "Palette",
            ColorInterpretation::RedBand => "Red",
            ColorInterpretation::GreenBand => "Green",
            ColorInterpretation::BlueBand => "Blue",
            ColorInterpretation::AlphaBand => "Alpha",
        }
    }

    /// Creates a color interpretation from its name.
    ///
    /// Unknown names map to [`ColorInterpretation::Undefined`].
    pub fn from_name(name: &str) -> Result<Self> {
        use ColorInterpretation::*;
        Ok([GrayIndex, PaletteIndex, RedBand, GreenBand, BlueBand, AlphaBand]
            .into_iter()
            .find(|interp| interp.name().eq_ignore_ascii_case(name))
            .unwrap_or(Undefined))
    }
}

/// Types of color interpretations for a [`ColorTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteInterpretation {
    /// Grayscale
    Gray,
    /// Red, Green, Blue and Alpha
    Rgba,
}

/// Grayscale [`ColorTable`] entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GrayEntry {
    pub g: i16,
}

/// Red, green, blue, alpha [`ColorTable`] entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RgbaEntry {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

/// Typed [`ColorTable`] entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorEntry {
    Gray(GrayEntry),
    Rgba(RgbaEntry),
}

impl ColorEntry {
    /// Instantiate a greyscale color entry
    pub fn grey(g: i16) -> Self {
        Self::Gray(GrayEntry { g })
    }

    /// Instantiate an red, green, blue, alpha color entry
    pub fn rgba(r: i16, g: i16, b: i16, a: i16) -> Self {
        Self::Rgba(RgbaEntry { r, g, b, a })
    }

    pub fn palette_interpretation(&self) -> PaletteInterpretation {
        match self {
            ColorEntry::Gray(_) => PaletteInterpretation::Gray,
            ColorEntry::Rgba(_) => PaletteInterpretation::Rgba,
        }
    }

    fn components(&self) -> [i16; 4] {
        match *self {
            ColorEntry::Gray(GrayEntry { g }) => [g, g, g, 255],
            ColorEntry::Rgba(RgbaEntry { r, g, b, a }) => [r, g, b, a],
        }
    }

    fn with_components(interp: PaletteInterpretation, c: [i16; 4]) -> Self {
        match interp {
            PaletteInterpretation::Gray => ColorEntry::grey(c[0]),
            PaletteInterpretation::Rgba => ColorEntry::rgba(c[0], c[1], c[2], c[3]),
        }
    }
}

/// Color table for raster bands that use the [`ColorInterpretation::PaletteIndex`]
/// color interpretation.
#[derive(Clone, PartialEq, Eq)]
pub struct ColorTable {
    palette_interpretation: PaletteInterpretation,
    entries: Vec<ColorEntry>,
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new(PaletteInterpretation::Rgba)
    }
}

impl ColorTable {
    /// Instantiate a new color table with the given palette interpretation.
    pub fn new(interp: PaletteInterpretation) -> Self {
        ColorTable {
            palette_interpretation: interp,
            entries: Vec::new(),
        }
    }

    /// Constructs a color ramp from one color entry to another.
    ///
    /// `start_index` and `end_index` must be within the [0..255] range.
    pub fn color_ramp(
        start_index: u8,
        start_color: &ColorEntry,
        end_index: u8,
        end_color: &ColorEntry,
    ) -> Result<ColorTable> {
        if start_color.palette_interpretation() != end_color.palette_interpretation()
            || start_index > end_index
        {
            return Err(GdalError::BadArgument(
                "color ramp needs ordered indexes and entries of the same kind".to_string(),
            ));
        }
        let interp = start_color.palette_interpretation();
        let mut table = ColorTable::new(interp);
        let (from, to) = (start_color.components(), end_color.components());
        let span = (end_index - start_index) as i32;
        for index in start_index..=end_index {
            let step = (index - start_index) as i32;
            let mut c = [0i16; 4];
            for k in 0..4 {
                c[k] = if span == 0 {
                    from[k]
                } else {
                    (from[k] as i32 + (to[k] as i32 - from[k] as i32) * step / span) as i16
                };
            }
            table.set_color_entry(index as u16, &ColorEntry::with_components(interp, c));
        }
        Ok(table)
    }

    /// Get the color palette interpretation.
    pub fn palette_interpretation(&self) -> PaletteInterpretation {
        self.palette_interpretation
    }

    /// Get the number of color entries in this color table.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get a color entry.
    pub fn entry(&self, index: usize) -> Option<ColorEntry> {
        self.entries.get(index).copied()
    }

    /// Get a color entry as RGB.
    ///
    /// Grey entries are expanded to an opaque RGB triplet.
    pub fn entry_as_rgb(&self, index: usize) -> Option<RgbaEntry> {
        let [r, g, b, a] = self.entries.get(index)?.components();
        Some(RgbaEntry { r, g, b, a })
    }

    /// Set entry in the color table.
    ///
    /// The table grows as needed, padding with all-zero entries.
    pub fn set_color_entry(&mut self, index: u16, entry: &ColorEntry) {
        let index = index as usize;
        if self.entries.len() <= index {
            let pad = ColorEntry::with_components(self.palette_interpretation, [0; 4]);
            self.entries.resize(index + 1, pad);
        }
        self.entries[index] = *entry;
    }
}

impl Debug for ColorTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorTable")
            .field("palette_interpretation", &self.palette_interpretation)
            .field("entries", &self.entries)
            .finish()
    }
}
