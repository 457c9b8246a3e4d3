//! Format drivers for a GDAL-style raster and vector object model.
//!
//! Built-in raster drivers:
//!
//! * `PNG`: streaming scanline decoder and sequential encoder, see [`raster::png`].
//! * `ENVI`: raw rasters described by a `.hdr` text header, see [`raster::envi`].
//!
//! On the vector side, [`vector::mysql`] exposes the rows of a MySQL `SELECT`
//! as a layer of features.
//!
//! ## Use
//!
//! ```
//! use gdal_frmts::Dataset;
//!
//! let dataset = Dataset::open("fixtures/envi_bsq_byte.dat").unwrap();
//! println!("driver: {}", dataset.driver().short_name());
//! println!("size: {:?}", dataset.raster_size());
//! let band = dataset.rasterband(1).unwrap();
//! let buffer = band.read_band_as::<u8>().unwrap();
//! assert_eq!(buffer.data[6], 6);
//! ```
//!
//! Drivers report errors both through [`errors::Result`] and to the error sink
//! configured in [`config`], which forwards to the [`log`] crate by default.

pub mod config;
pub mod cpl;
mod dataset;
mod driver;
pub mod errors;
mod geo_transform;
mod metadata;
mod options;
pub mod raster;
pub mod vector;
pub mod vsi;

pub use dataset::{Dataset, DatasetBackend, DatasetCommon, OpenInfo};
pub use driver::{
    CreateCopyFn, CreateFn, Driver, DriverCapabilities, DriverManager, IdentifyFn, OpenFn,
};
pub use geo_transform::{GeoTransform, GeoTransformEx};
pub use metadata::{Metadata, MetadataDomains, MetadataEntry};
pub use options::{Access, DatasetOptions, GdalOpenFlags};

#[cfg(test)]
pub(crate) mod test_utils;
