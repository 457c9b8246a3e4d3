//! Raw band access: samples found at fixed pixel, line and band strides.

use std::io::{Read, Seek, SeekFrom, Write};

use super::header::Interleave;
use crate::errors::Result;
use crate::raster::GdalDataType;

/// Where the samples of every band live in a raw data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub band_type: GdalDataType,
    pub width: usize,
    pub image_offset: u64,
    pub pixel_offset: usize,
    pub line_offset: usize,
    pub band_offset: u64,
    /// `false` when the file's byte order differs from this machine's.
    pub native_order: bool,
}

impl RawLayout {
    pub fn new(
        interleave: Interleave,
        band_type: GdalDataType,
        size: (usize, usize),
        bands: usize,
        image_offset: u64,
        native_order: bool,
    ) -> Self {
        let (pixel_offset, line_offset, band_offset) =
            interleave.offsets(band_type.bytes(), size.0, size.1, bands);
        RawLayout {
            band_type,
            width: size.0,
            image_offset,
            pixel_offset,
            line_offset,
            band_offset,
            native_order,
        }
    }

    fn line_start(&self, band: usize, y: usize) -> u64 {
        self.image_offset + (band as u64 - 1) * self.band_offset + y as u64 * self.line_offset as u64
    }

    /// Bytes from the first to the last sample of one band line.
    fn span(&self) -> usize {
        match self.width {
            0 => 0,
            w => (w - 1) * self.pixel_offset + self.band_type.bytes(),
        }
    }

    fn contiguous(&self) -> bool {
        self.pixel_offset == self.band_type.bytes()
    }

    /// Reads line `y` of `band` into `out` as native-endian samples.
    ///
    /// Bytes past the end of the file read as zero.
    pub fn read_line<F: Read + Seek>(
        &self,
        file: &mut F,
        band: usize,
        y: usize,
        out: &mut [u8],
    ) -> Result<()> {
        let sample = self.band_type.bytes();
        let mut span = vec![0u8; self.span()];
        read_span(file, self.line_start(band, y), &mut span)?;
        if self.contiguous() {
            out[..span.len()].copy_from_slice(&span);
        } else {
            for (x, dst) in out.chunks_exact_mut(sample).take(self.width).enumerate() {
                let src = x * self.pixel_offset;
                dst.copy_from_slice(&span[src..src + sample]);
            }
        }
        if !self.native_order {
            swap_components(&mut out[..self.width * sample], self.band_type.component_bytes());
        }
        Ok(())
    }

    /// Writes native-endian samples of line `y` of `band`.
    ///
    /// Samples of other bands sharing the line are preserved.
    pub fn write_line<F: Read + Write + Seek>(
        &self,
        file: &mut F,
        band: usize,
        y: usize,
        data: &[u8],
    ) -> Result<()> {
        let sample = self.band_type.bytes();
        let mut samples = data[..self.width * sample].to_vec();
        if !self.native_order {
            swap_components(&mut samples, self.band_type.component_bytes());
        }
        let start = self.line_start(band, y);
        let span = if self.contiguous() {
            samples
        } else {
            let mut span = vec![0u8; self.span()];
            read_span(file, start, &mut span)?;
            for (x, src) in samples.chunks_exact(sample).enumerate() {
                let dst = x * self.pixel_offset;
                span[dst..dst + sample].copy_from_slice(src);
            }
            span
        };
        file.seek(SeekFrom::Start(start))?;
        file.write_all(&span)?;
        Ok(())
    }
}

/// Fills `buf` from `offset`, leaving zeros where the file ends early.
fn read_span<F: Read + Seek>(file: &mut F, offset: u64, buf: &mut [u8]) -> Result<()> {
    buf.fill(0);
    file.seek(SeekFrom::Start(offset))?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(())
}

/// Reverses the bytes of every `component`-sized word of `buf`.
pub(crate) fn swap_components(buf: &mut [u8], component: usize) {
    if component > 1 {
        buf.chunks_exact_mut(component).for_each(<[u8]>::reverse);
    }
}
