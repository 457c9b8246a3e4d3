//! Portable Network Graphics driver.
//!
//! PNG streams can only be decoded forward. Rows are served from a
//! [`ScanlineCache`](scanline::ScanlineCache): reading top to bottom decodes
//! every row once, going back restarts decoding from the first byte. Interlaced
//! images are decoded whole on first access.
//!
//! Writing is sequential too: rows are handed to the encoder in increasing
//! order, see [`ScanlineWriter`](scanline::ScanlineWriter).
//!
//! # Example
//!
//! ```rust, no_run
//! use gdal_frmts::Dataset;
//! # fn main() -> gdal_frmts::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/palette4.png")?;
//! let band = dataset.rasterband(1)?;
//! let pixels = band.read_band_as::<u8>()?;
//! println!("{:?}", pixels.size);
//! # Ok(())
//! # }
//! ```

mod create;
mod dataset;
pub mod scanline;
pub mod stream;

use crate::dataset::{DatasetBackend, OpenInfo};
use crate::driver::{Driver, DriverCapabilities};
use crate::errors::{GdalError, Result};
use crate::options::Access;
use crate::vsi;

pub use dataset::{PngDataset, PngWriteDataset};
use stream::{check_signature, StreamSession};

fn identify(info: &OpenInfo) -> bool {
    check_signature(&info.header)
}

fn open(info: &OpenInfo) -> Result<Box<dyn DatasetBackend>> {
    if info.access == Access::Update {
        return Err(GdalError::NotSupported(
            "The PNG driver does not support update access to existing datasets.".to_string(),
        )
        .report());
    }
    let file = vsi::open(&info.path)?;
    let session = StreamSession::open(file).map_err(GdalError::report)?;
    Ok(Box::new(PngDataset::new(
        &info.path.display().to_string(),
        session,
    )))
}

pub(crate) fn driver() -> Driver {
    Driver::new("PNG", "Portable Network Graphics", identify, open)
        .with_extensions("png")
        .with_capabilities(DriverCapabilities::RASTER | DriverCapabilities::VIRTUAL_IO)
        .with_create(create::create)
        .with_create_copy(create::create_copy)
}
