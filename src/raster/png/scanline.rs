//! Row buffering on top of the forward-only stream sessions.

use std::io::Write;

use crate::config::{cpl_debug, get_config_option};
use crate::errors::{GdalError, Result};
use crate::raster::png::stream::{EncodeSession, PngHeader, StreamSession};
use crate::vsi::ByteSource;

/// Byte addressing of band samples inside one interleaved row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLayout {
    pub width: usize,
    pub channels: usize,
    /// Bytes per sample, 1 or 2.
    pub sample_size: usize,
}

impl PixelLayout {
    pub fn from_header(header: &PngHeader) -> Self {
        PixelLayout {
            width: header.width,
            channels: header.channels(),
            sample_size: header.sample_size(),
        }
    }

    /// Bytes between the first samples of two neighbouring pixels.
    pub fn pixel_stride(&self) -> usize {
        self.channels * self.sample_size
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width * self.pixel_stride()
    }

    /// Offset of the sample of `band` (1-based) at column `x`.
    pub fn offset(&self, x: usize, band: usize) -> usize {
        x * self.pixel_stride() + (band - 1) * self.sample_size
    }

    fn check_band(&self, band: usize, samples: usize) -> Result<()> {
        if band == 0 || band > self.channels {
            return Err(GdalError::BadArgument(format!(
                "band {band} is out of range 1..={}",
                self.channels
            )));
        }
        if samples != self.width * self.sample_size {
            return Err(GdalError::BadArgument(format!(
                "expected {} bytes of samples, got {samples}",
                self.width * self.sample_size
            )));
        }
        Ok(())
    }

    /// Copies the samples of `band` from the interleaved `row` into `out`.
    pub fn extract(&self, row: &[u8], band: usize, out: &mut [u8]) -> Result<()> {
        self.check_band(band, out.len())?;
        let ss = self.sample_size;
        for (x, dst) in out.chunks_exact_mut(ss).enumerate() {
            let at = self.offset(x, band);
            dst.copy_from_slice(&row[at..at + ss]);
        }
        Ok(())
    }

    /// Copies `samples` of `band` into the interleaved `row`.
    pub fn insert(&self, row: &mut [u8], band: usize, samples: &[u8]) -> Result<()> {
        self.check_band(band, samples.len())?;
        let ss = self.sample_size;
        for (x, src) in samples.chunks_exact(ss).enumerate() {
            let at = self.offset(x, band);
            row[at..at + ss].copy_from_slice(src);
        }
        Ok(())
    }
}

/// Upper bound of the whole-image buffer of interlaced images, if configured.
fn full_image_limit() -> Option<usize> {
    let value = get_config_option("GDAL_PNG_MAX_FULL_IMAGE_BYTES", "").ok()?;
    if value.is_empty() {
        return None;
    }
    match value.trim().parse() {
        Ok(limit) => Some(limit),
        Err(_) => {
            cpl_debug(
                "PNG",
                &format!("ignoring invalid GDAL_PNG_MAX_FULL_IMAGE_BYTES={value}"),
            );
            None
        }
    }
}

/// The buffered window of decoded rows of a read session.
///
/// Holds a single row for ordinary images and the whole image for interlaced
/// ones. The contents are only valid for `[start_row, start_row + row_count)`.
pub struct ScanlineCache<S: ByteSource> {
    session: StreamSession<S>,
    layout: PixelLayout,
    buffer: Vec<u8>,
    start_row: usize,
    row_count: usize,
}

impl<S: ByteSource> ScanlineCache<S> {
    pub fn new(session: StreamSession<S>) -> Self {
        ScanlineCache {
            layout: PixelLayout::from_header(session.header()),
            session,
            buffer: Vec::new(),
            start_row: 0,
            row_count: 0,
        }
    }

    pub fn session(&self) -> &StreamSession<S> {
        &self.session
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    fn is_buffered(&self, y: usize) -> bool {
        y >= self.start_row && y < self.start_row + self.row_count
    }

    /// Makes row `y` available through [`row`](Self::row).
    ///
    /// Moving backward restarts the stream and replays it up to `y`.
    pub fn request_row(&mut self, y: usize) -> Result<()> {
        let height = self.session.header().height;
        if y >= height {
            return Err(GdalError::BadArgument(format!(
                "row {y} is out of range 0..{height}"
            )));
        }
        if self.is_buffered(y) {
            return Ok(());
        }

        let bytes_per_row = self.layout.bytes_per_row();
        if self.session.is_interlaced() {
            if self.session.last_row_consumed().is_some() {
                self.session.restart()?;
            }
            self.buffer = Vec::new();
            self.row_count = 0;

            let size = bytes_per_row.checked_mul(height).ok_or_else(|| {
                GdalError::ResourceError(format!(
                    "interlaced image of {height} rows of {bytes_per_row} bytes is too large"
                ))
            })?;
            if let Some(limit) = full_image_limit() {
                if size > limit {
                    return Err(GdalError::ResourceError(format!(
                        "interlaced image needs a {size} bytes buffer, \
                         GDAL_PNG_MAX_FULL_IMAGE_BYTES is {limit}"
                    )));
                }
            }
            let mut buffer = Vec::new();
            buffer.try_reserve_exact(size).map_err(|e| {
                GdalError::ResourceError(format!(
                    "cannot allocate {size} bytes for interlaced image: {e}"
                ))
            })?;
            buffer.resize(size, 0);
            self.session.decode_whole_image(&mut buffer)?;
            self.buffer = buffer;
            self.start_row = 0;
            self.row_count = height;
            return Ok(());
        }

        if self.buffer.len() != bytes_per_row {
            self.buffer = vec![0; bytes_per_row];
        }
        if matches!(self.session.last_row_consumed(), Some(last) if y <= last) {
            self.session.restart()?;
        }
        self.row_count = 0;
        while self.session.advance_row(&mut self.buffer)? < y {}
        self.start_row = y;
        self.row_count = 1;
        Ok(())
    }

    /// The buffered bytes of row `y`, `None` if `y` is outside of the window.
    pub fn row(&self, y: usize) -> Option<&[u8]> {
        if !self.is_buffered(y) {
            return None;
        }
        let bytes_per_row = self.layout.bytes_per_row();
        let at = (y - self.start_row) * bytes_per_row;
        self.buffer.get(at..at + bytes_per_row)
    }

    /// Reads the samples of `band` in row `y` into `out`.
    pub fn read_band_row(&mut self, y: usize, band: usize, out: &mut [u8]) -> Result<()> {
        self.request_row(y)?;
        let row = self
            .row(y)
            .ok_or_else(|| GdalError::BadArgument(format!("row {y} is not buffered")))?;
        self.layout.extract(row, band, out)
    }

    /// Releases the buffer; the next request decodes again.
    pub fn flush(&mut self) {
        self.buffer = Vec::new();
        self.start_row = 0;
        self.row_count = 0;
    }
}

/// Assembles interleaved rows from band rows and streams them to the encoder.
///
/// Only one row is buffered: every band of a row has to be written before
/// moving on to a later row, and rows cannot be revisited.
pub struct ScanlineWriter<W: Write + 'static> {
    session: EncodeSession<W>,
    layout: PixelLayout,
    buffer: Vec<u8>,
    pending_row: Option<usize>,
    bands_written: Vec<bool>,
    /// First row not yet handed to the encoder.
    next_row: usize,
    finished: bool,
}

impl<W: Write + 'static> ScanlineWriter<W> {
    pub fn new(session: EncodeSession<W>) -> Self {
        let layout = PixelLayout::from_header(session.header());
        ScanlineWriter {
            buffer: vec![0; layout.bytes_per_row()],
            bands_written: vec![false; layout.channels],
            layout,
            session,
            pending_row: None,
            next_row: 0,
            finished: false,
        }
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn header(&self) -> &PngHeader {
        self.session.header()
    }

    /// Rows already handed to the encoder.
    pub fn rows_written(&self) -> usize {
        self.next_row
    }

    /// Stores the samples of `band` for row `y`.
    ///
    /// Fails with [`GdalError::OrderViolation`] for a row before the current one
    /// or a band already written for the current row. Rows skipped over are
    /// written as zeros.
    pub fn write_band_row(&mut self, y: usize, band: usize, samples: &[u8]) -> Result<()> {
        let height = self.session.header().height;
        if self.finished {
            return Err(GdalError::BadArgument(
                "the image has already been finished".to_string(),
            ));
        }
        if y >= height {
            return Err(GdalError::BadArgument(format!(
                "row {y} is out of range 0..{height}"
            )));
        }
        self.layout.check_band(band, samples.len())?;
        match self.pending_row {
            Some(pending) if y == pending && self.bands_written[band - 1] => {
                return Err(GdalError::OrderViolation {
                    row: y,
                    band,
                    msg: "band already written for this row".to_string(),
                });
            }
            Some(pending) if y < pending => {
                return Err(GdalError::OrderViolation {
                    row: y,
                    band,
                    msg: format!("row {pending} is already being written"),
                });
            }
            None if y < self.next_row => {
                return Err(GdalError::OrderViolation {
                    row: y,
                    band,
                    msg: format!("rows up to {} have already been written", self.next_row - 1),
                });
            }
            _ => {}
        }

        if self.pending_row != Some(y) {
            self.emit_pending()?;
            self.emit_zero_rows(y)?;
            self.buffer.fill(0);
            self.bands_written.fill(false);
            self.pending_row = Some(y);
        }
        self.layout.insert(&mut self.buffer, band, samples)?;
        self.bands_written[band - 1] = true;
        Ok(())
    }

    fn emit_pending(&mut self) -> Result<()> {
        if let Some(pending) = self.pending_row.take() {
            if self.bands_written.iter().any(|written| !written) {
                cpl_debug(
                    "PNG",
                    &format!("row {pending} written with missing bands, zero filled"),
                );
            }
            self.session.write_row(&self.buffer)?;
            self.next_row = pending + 1;
        }
        Ok(())
    }

    /// Writes zero rows from the next unwritten row up to (excluding) `end`.
    fn emit_zero_rows(&mut self, end: usize) -> Result<()> {
        if self.next_row >= end {
            return Ok(());
        }
        self.buffer.fill(0);
        while self.next_row < end {
            self.session.write_row(&self.buffer)?;
            self.next_row += 1;
        }
        Ok(())
    }

    /// Writes the pending row, zero fills the remaining rows and ends the stream.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.emit_pending()?;
        let height = self.session.header().height;
        if self.next_row < height {
            cpl_debug(
                "PNG",
                &format!("zero filling rows {}..{height}", self.next_row),
            );
        }
        self.emit_zero_rows(height)?;
        self.session.finish()
    }
}
