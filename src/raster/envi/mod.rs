//! ENVI `.hdr` labelled raster driver.
//!
//! An ENVI dataset is a raw data file plus a text header next to it
//! (`image.img` and `image.hdr`, or `image.img.hdr`). The header gives the
//! raster size, the sample type and byte order, and how bands are interleaved.
//! Optional entries carry band names and georeferencing (`map info`).
//!
//! Open the data file, never the header:
//!
//! ```rust, no_run
//! use gdal_frmts::Dataset;
//! # fn main() -> gdal_frmts::errors::Result<()> {
//! let dataset = Dataset::open("fixtures/envi_bil_int16")?;
//! println!("{:?}", dataset.geo_transform()?);
//! # Ok(())
//! # }
//! ```

mod dataset;
pub mod header;
pub mod mapinfo;
pub mod raw;

use crate::dataset::{DatasetBackend, OpenInfo};
use crate::driver::{Driver, DriverCapabilities};
use crate::errors::{GdalError, Result};
use crate::vsi;

pub use dataset::EnviDataset;
pub use header::{split_list, EnviHeader, Interleave};
pub use mapinfo::{MapInfo, MapProjection};

fn identify(info: &OpenInfo) -> bool {
    header::find_header(&info.path)
        .and_then(|path| vsi::read_header_bytes(path, 4).ok())
        .is_some_and(|magic| magic.starts_with(b"ENVI"))
}

fn open(info: &OpenInfo) -> Result<Box<dyn DatasetBackend>> {
    let dataset = EnviDataset::open(info).map_err(GdalError::report)?;
    Ok(Box::new(dataset))
}

pub(crate) fn driver() -> Driver {
    Driver::new("ENVI", "ENVI .hdr Labelled", identify, open)
        .with_capabilities(DriverCapabilities::RASTER | DriverCapabilities::VIRTUAL_IO)
        .with_create(dataset::create)
}

#[cfg(test)]
mod tests;
