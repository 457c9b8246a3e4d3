//! Raster Data API
//!
//! A [`Dataset`](crate::Dataset) holds one or more [`RasterBand`]s of the same
//! size. Bands are read and written through [`Buffer`]s of any [`GdalType`];
//! values are converted to and from the band's [`GdalDataType`].
//!
//! Two formats are built in: [`png`] and [`envi`].

mod buffer;
pub mod envi;
pub mod png;
mod rasterband;
mod types;

pub use buffer::{Buffer, ByteBuffer};
pub use rasterband::{
    BandInfo, ColorEntry, ColorInterpretation, ColorTable, GrayEntry, PaletteInterpretation,
    RasterBand, RgbaEntry,
};
pub use types::{GdalDataType, GdalType};
