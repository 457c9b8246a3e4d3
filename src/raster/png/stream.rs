//! Forward-only PNG decode and encode sessions.
//!
//! A [`StreamSession`] owns the byte source and the decoder. The decoder can only
//! move forward, so going back means [`StreamSession::restart`]: rewind the source
//! to its first byte and parse the header again.
//!
//! Samples are always handed out one byte per sample for 1, 2 and 4 bit images,
//! and in native byte order for 16 bit images.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use png::{BitDepth, ColorType, Compression, Decoder, Reader, StreamWriter, Transformations};

use crate::config::cpl_debug;
use crate::errors::{GdalError, Result};
use crate::vsi::ByteSource;

pub(crate) const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

/// Returns `true` if `header` holds at least 4 bytes matching the PNG signature.
pub(crate) fn check_signature(header: &[u8]) -> bool {
    header.len() >= 4
        && header
            .iter()
            .zip(PNG_SIGNATURE.iter())
            .all(|(byte, expected)| byte == expected)
}

/// Channel layout of a PNG image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// One index per pixel into the `PLTE` palette.
    Palette,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Gray | ChannelLayout::Palette => 1,
            ChannelLayout::GrayAlpha => 2,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }

    /// Layout of a non-paletted image with `bands` channels.
    pub fn from_band_count(bands: usize) -> Option<ChannelLayout> {
        match bands {
            1 => Some(ChannelLayout::Gray),
            2 => Some(ChannelLayout::GrayAlpha),
            3 => Some(ChannelLayout::Rgb),
            4 => Some(ChannelLayout::Rgba),
            _ => None,
        }
    }

    fn from_png(color_type: ColorType) -> ChannelLayout {
        match color_type {
            ColorType::Grayscale => ChannelLayout::Gray,
            ColorType::GrayscaleAlpha => ChannelLayout::GrayAlpha,
            ColorType::Rgb => ChannelLayout::Rgb,
            ColorType::Rgba => ChannelLayout::Rgba,
            ColorType::Indexed => ChannelLayout::Palette,
        }
    }

    fn to_png(self) -> ColorType {
        match self {
            ChannelLayout::Gray => ColorType::Grayscale,
            ChannelLayout::GrayAlpha => ColorType::GrayscaleAlpha,
            ChannelLayout::Rgb => ColorType::Rgb,
            ChannelLayout::Rgba => ColorType::Rgba,
            ChannelLayout::Palette => ColorType::Indexed,
        }
    }
}

/// Image geometry and the ancillary chunks found before the image data.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngHeader {
    pub width: usize,
    pub height: usize,
    /// Bits per sample: 1, 2, 4, 8 or 16.
    pub bit_depth: u8,
    pub layout: ChannelLayout,
    pub interlaced: bool,
    /// `PLTE` entries as RGB triplets.
    pub palette: Option<Vec<u8>>,
    /// `tRNS` chunk content.
    pub transparency: Option<Vec<u8>>,
    /// `tEXt`, `zTXt` and `iTXt` keyword / text pairs.
    pub text: Vec<(String, String)>,
}

impl PngHeader {
    pub fn new(width: usize, height: usize, bit_depth: u8, layout: ChannelLayout) -> PngHeader {
        PngHeader {
            width,
            height,
            bit_depth,
            layout,
            interlaced: false,
            palette: None,
            transparency: None,
            text: Vec::new(),
        }
    }

    pub fn channels(&self) -> usize {
        self.layout.channels()
    }

    /// Bytes per unpacked sample.
    pub fn sample_size(&self) -> usize {
        if self.bit_depth == 16 {
            2
        } else {
            1
        }
    }

    /// Bytes in one unpacked row, all channels interleaved.
    pub fn bytes_per_row(&self) -> usize {
        self.width * self.channels() * self.sample_size()
    }

    /// Bytes in one row as stored in the stream.
    fn packed_row_size(&self) -> usize {
        (self.width * self.channels() * self.bit_depth as usize).div_ceil(8)
    }

    fn from_info(info: &png::Info) -> PngHeader {
        let mut text = Vec::new();
        for chunk in &info.uncompressed_latin1_text {
            text.push((chunk.keyword.clone(), chunk.text.clone()));
        }
        for chunk in &info.compressed_latin1_text {
            if let Ok(value) = chunk.get_text() {
                text.push((chunk.keyword.clone(), value));
            }
        }
        for chunk in &info.utf8_text {
            if let Ok(value) = chunk.get_text() {
                text.push((chunk.keyword.clone(), value));
            }
        }
        PngHeader {
            width: info.width as usize,
            height: info.height as usize,
            bit_depth: info.bit_depth as u8,
            layout: ChannelLayout::from_png(info.color_type),
            interlaced: info.interlaced,
            palette: info.palette.as_ref().map(|p| p.to_vec()),
            transparency: info.trns.as_ref().map(|t| t.to_vec()),
            text,
        }
    }
}

/// Work done by a [`StreamSession`] since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub restarts: usize,
    /// Rows produced by [`StreamSession::advance_row`] and whole-image decodes.
    pub rows_decoded: usize,
    pub full_decodes: usize,
}

/// Byte source shared between the session and its current decoder.
struct SharedSource<S>(Arc<Mutex<S>>);

impl<S> SharedSource<S> {
    fn lock(&self) -> io::Result<MutexGuard<'_, S>> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("byte source lock poisoned"))
    }
}

impl<S> Clone for SharedSource<S> {
    fn clone(&self) -> Self {
        SharedSource(self.0.clone())
    }
}

impl<S: Read> Read for SharedSource<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.lock()?.read(buf)
    }
}

fn decode_error(err: impl std::fmt::Display) -> GdalError {
    GdalError::DecodeError {
        msg: err.to_string(),
    }
}

/// Rewinds `source`, checks the signature and parses the header.
fn start_decoder<S: ByteSource>(
    source: &SharedSource<S>,
) -> Result<(Reader<SharedSource<S>>, PngHeader)> {
    {
        let mut guard = source.lock()?;
        guard.seek_to_start()?;
        let mut signature = Vec::with_capacity(PNG_SIGNATURE.len());
        (&mut *guard)
            .take(PNG_SIGNATURE.len() as u64)
            .read_to_end(&mut signature)?;
        if !check_signature(&signature) {
            return Err(GdalError::FormatError(
                "missing PNG signature".to_string(),
            ));
        }
        guard.seek_to_start()?;
    }
    let mut decoder = Decoder::new(source.clone());
    decoder.set_transformations(Transformations::IDENTITY);
    let reader = decoder
        .read_info()
        .map_err(|e| GdalError::FormatError(format!("invalid PNG header: {e}")))?;
    let header = PngHeader::from_info(reader.info());
    Ok((reader, header))
}

/// One decode pass over a PNG stream.
///
/// `last_row_consumed` only grows between restarts. After a decode failure the
/// session refuses further work; the dataset has to be opened again.
pub struct StreamSession<S: ByteSource> {
    source: SharedSource<S>,
    reader: Option<Reader<SharedSource<S>>>,
    header: PngHeader,
    last_row_consumed: Option<usize>,
    stats: StreamStats,
    failure: Option<String>,
}

impl<S: ByteSource> StreamSession<S> {
    /// Takes ownership of `source` and parses the PNG header.
    ///
    /// Fails with [`GdalError::FormatError`] if the signature does not match.
    pub fn open(source: S) -> Result<Self> {
        let source = SharedSource(Arc::new(Mutex::new(source)));
        let (reader, header) = start_decoder(&source)?;
        Ok(StreamSession {
            source,
            reader: Some(reader),
            header,
            last_row_consumed: None,
            stats: StreamStats::default(),
            failure: None,
        })
    }

    pub fn header(&self) -> &PngHeader {
        &self.header
    }

    pub fn is_interlaced(&self) -> bool {
        self.header.interlaced
    }

    /// Index of the last row handed out, `None` before the first one.
    pub fn last_row_consumed(&self) -> Option<usize> {
        self.last_row_consumed
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn check_usable(&self) -> Result<()> {
        match &self.failure {
            Some(msg) => Err(GdalError::DecodeError {
                msg: format!("stream unusable after an earlier failure: {msg}"),
            }),
            None => Ok(()),
        }
    }

    /// Records `err` as fatal for this session.
    fn fail(&mut self, err: GdalError) -> GdalError {
        let msg = match err {
            GdalError::DecodeError { msg } => msg,
            other => other.to_string(),
        };
        cpl_debug("PNG", &format!("decoding failed: {msg}"));
        self.failure = Some(msg.clone());
        self.reader = None;
        GdalError::DecodeError { msg }
    }

    /// Drops the decoder, rewinds the source and parses the header again.
    ///
    /// Afterwards the session is in the same state as right after [`open`](Self::open).
    pub fn restart(&mut self) -> Result<()> {
        self.check_usable()?;
        self.reader = None;
        let (reader, header) = match start_decoder(&self.source) {
            Ok(started) => started,
            Err(err) => return Err(self.fail(err)),
        };
        if header.width != self.header.width
            || header.height != self.header.height
            || header.bit_depth != self.header.bit_depth
            || header.layout != self.header.layout
            || header.interlaced != self.header.interlaced
        {
            return Err(self.fail(decode_error("image header changed on restart")));
        }
        self.reader = Some(reader);
        self.last_row_consumed = None;
        self.stats.restarts += 1;
        cpl_debug("PNG", "Restart");
        Ok(())
    }

    /// Decodes the row after [`last_row_consumed`](Self::last_row_consumed) into `out`
    /// and returns its index.
    ///
    /// `out` must hold [`PngHeader::bytes_per_row`] bytes. Not available on
    /// interlaced images, see [`decode_whole_image`](Self::decode_whole_image).
    pub fn advance_row(&mut self, out: &mut [u8]) -> Result<usize> {
        self.check_usable()?;
        if self.header.interlaced {
            return Err(GdalError::NotSupported(
                "row by row decoding of an interlaced image".to_string(),
            ));
        }
        let next = self.last_row_consumed.map_or(0, |row| row + 1);
        if next >= self.header.height {
            return Err(GdalError::BadArgument(format!(
                "all {} rows have been consumed",
                self.header.height
            )));
        }
        let bit_depth = self.header.bit_depth;
        let outcome = match self.reader.as_mut() {
            None => Err(decode_error("no active decoder")),
            Some(reader) => match reader.next_row() {
                Ok(Some(row)) => {
                    unpack_row(row.data(), out, bit_depth);
                    Ok(())
                }
                Ok(None) => Err(decode_error("image data ends before the last row")),
                Err(e) => Err(decode_error(e)),
            },
        };
        if let Err(err) = outcome {
            return Err(self.fail(err));
        }
        self.last_row_consumed = Some(next);
        self.stats.rows_decoded += 1;
        Ok(next)
    }

    /// De-interlaces the complete image into `out`, which must hold
    /// `height` × [`PngHeader::bytes_per_row`] bytes.
    ///
    /// Only valid on a fresh (or restarted) interlaced session.
    pub fn decode_whole_image(&mut self, out: &mut [u8]) -> Result<()> {
        self.check_usable()?;
        if !self.header.interlaced {
            return Err(GdalError::NotSupported(
                "whole image decoding of a non-interlaced image".to_string(),
            ));
        }
        if self.last_row_consumed.is_some() {
            return Err(GdalError::BadArgument(
                "image already decoded, restart first".to_string(),
            ));
        }
        let header = &self.header;
        let (bit_depth, height) = (header.bit_depth, header.height);
        let (packed_row, unpacked_row) = (header.packed_row_size(), header.bytes_per_row());

        let outcome = match self.reader.as_mut() {
            None => Err(decode_error("no active decoder")),
            Some(reader) if bit_depth >= 8 => reader
                .next_frame(out)
                .map(|_| {
                    if bit_depth == 16 {
                        swap_from_big_endian(out);
                    }
                })
                .map_err(decode_error),
            Some(reader) => {
                let mut packed = Vec::new();
                packed
                    .try_reserve_exact(reader.output_buffer_size())
                    .map_err(|e| GdalError::ResourceError(e.to_string()))?;
                packed.resize(reader.output_buffer_size(), 0);
                reader.next_frame(&mut packed).map_err(decode_error).map(|_| {
                    for y in 0..height {
                        unpack_row(
                            &packed[y * packed_row..(y + 1) * packed_row],
                            &mut out[y * unpacked_row..(y + 1) * unpacked_row],
                            bit_depth,
                        );
                    }
                })
            }
        };
        if let Err(err) = outcome {
            return Err(self.fail(err));
        }
        self.last_row_consumed = height.checked_sub(1);
        self.stats.full_decodes += 1;
        self.stats.rows_decoded += height;
        cpl_debug("PNG", "decoded whole interlaced image");
        Ok(())
    }
}

/// Expands one stored row to one byte per sample, native byte order.
pub(crate) fn unpack_row(packed: &[u8], out: &mut [u8], bit_depth: u8) {
    match bit_depth {
        8 => out.copy_from_slice(&packed[..out.len()]),
        16 => {
            for (dst, src) in out.chunks_exact_mut(2).zip(packed.chunks_exact(2)) {
                dst.copy_from_slice(&u16::from_be_bytes([src[0], src[1]]).to_ne_bytes());
            }
        }
        bits => {
            let bits = bits as usize;
            let mask = (1u8 << bits) - 1;
            for (i, dst) in out.iter_mut().enumerate() {
                let bit = i * bits;
                let shift = 8 - bits - bit % 8;
                *dst = (packed[bit / 8] >> shift) & mask;
            }
        }
    }
}

/// Inverse of [`unpack_row`]. Sub-byte samples are masked to their bit depth.
pub(crate) fn pack_row(row: &[u8], packed: &mut [u8], bit_depth: u8) {
    match bit_depth {
        8 => packed.copy_from_slice(row),
        16 => {
            for (dst, src) in packed.chunks_exact_mut(2).zip(row.chunks_exact(2)) {
                dst.copy_from_slice(&u16::from_ne_bytes([src[0], src[1]]).to_be_bytes());
            }
        }
        bits => {
            let bits = bits as usize;
            let mask = (1u8 << bits) - 1;
            packed.fill(0);
            for (i, value) in row.iter().enumerate() {
                let bit = i * bits;
                let shift = 8 - bits - bit % 8;
                packed[bit / 8] |= (value & mask) << shift;
            }
        }
    }
}

fn swap_from_big_endian(samples: &mut [u8]) {
    for pair in samples.chunks_exact_mut(2) {
        let value = u16::from_be_bytes([pair[0], pair[1]]);
        pair.copy_from_slice(&value.to_ne_bytes());
    }
}

/// zlib effort for a `ZLEVEL` creation option (1 fastest, 9 smallest).
pub(crate) fn compression_for_level(level: u8) -> Compression {
    match level {
        1..=3 => Compression::Fast,
        4..=6 => Compression::Default,
        _ => Compression::Best,
    }
}

/// One encode pass: the header is written on creation, then rows in order.
pub struct EncodeSession<W: Write + 'static> {
    writer: Option<StreamWriter<'static, W>>,
    header: PngHeader,
    packed: Vec<u8>,
    rows_written: usize,
    failure: Option<String>,
}

impl<W: Write + 'static> EncodeSession<W> {
    /// Writes the signature and header chunks (palette, transparency, text) to `out`.
    ///
    /// The image is written non-interlaced.
    pub fn create(out: W, header: &PngHeader, compression: Compression) -> Result<Self> {
        let depth = BitDepth::from_u8(header.bit_depth).ok_or_else(|| {
            GdalError::NotSupported(format!("bit depth {}", header.bit_depth))
        })?;
        let mut encoder = png::Encoder::new(out, header.width as u32, header.height as u32);
        encoder.set_color(header.layout.to_png());
        encoder.set_depth(depth);
        encoder.set_compression(compression);
        if let Some(palette) = &header.palette {
            encoder.set_palette(palette.clone());
        }
        if let Some(transparency) = &header.transparency {
            encoder.set_trns(transparency.clone());
        }
        for (keyword, text) in &header.text {
            encoder
                .add_text_chunk(keyword.clone(), text.clone())
                .map_err(decode_error)?;
        }
        let writer = encoder
            .write_header()
            .and_then(|writer| writer.into_stream_writer())
            .map_err(decode_error)?;

        let mut header = header.clone();
        header.interlaced = false;
        Ok(EncodeSession {
            writer: Some(writer),
            packed: vec![0; header.packed_row_size()],
            header,
            rows_written: 0,
            failure: None,
        })
    }

    pub fn header(&self) -> &PngHeader {
        &self.header
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    fn fail(&mut self, err: impl std::fmt::Display) -> GdalError {
        let msg = err.to_string();
        self.failure = Some(msg.clone());
        self.writer = None;
        GdalError::DecodeError { msg }
    }

    /// Appends the next row: [`PngHeader::bytes_per_row`] bytes, one per sample
    /// (two in native order for 16 bit images).
    pub fn write_row(&mut self, row: &[u8]) -> Result<()> {
        if let Some(msg) = &self.failure {
            return Err(GdalError::DecodeError {
                msg: format!("stream unusable after an earlier failure: {msg}"),
            });
        }
        if self.rows_written >= self.header.height {
            return Err(GdalError::BadArgument(
                "all rows have already been written".to_string(),
            ));
        }
        pack_row(row, &mut self.packed, self.header.bit_depth);
        let written = match self.writer.as_mut() {
            Some(writer) => writer.write_all(&self.packed),
            None => Err(io::Error::other("encoder already finished")),
        };
        if let Err(err) = written {
            return Err(self.fail(err));
        }
        self.rows_written += 1;
        Ok(())
    }

    /// Writes the trailing chunks. Every row must have been written.
    pub fn finish(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        if let Err(err) = writer.finish() {
            return Err(self.fail(err));
        }
        Ok(())
    }
}
