use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

use crate::cpl::CslStringList;
use crate::driver::{Driver, DriverManager};
use crate::errors::{CplErrType, CplErrorNum, GdalError, Result};
use crate::metadata::{check_metadata_key, Metadata, MetadataDomains};
use crate::options::{Access, DatasetOptions, GdalOpenFlags};
use crate::raster::{BandInfo, RasterBand};
use crate::{vsi, GeoTransform};

/// Number of leading bytes handed to drivers for identification.
const HEADER_BYTES: usize = 1024;

/// State shared by every dataset, whatever its format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetCommon {
    pub description: String,
    pub raster_size: (usize, usize),
    pub bands: Vec<BandInfo>,
    pub metadata: MetadataDomains,
    pub geo_transform: Option<GeoTransform>,
    pub projection: String,
    pub access: Access,
    /// Set when descriptive state (metadata, georeferencing, band names) changed
    /// since the last flush.
    pub dirty: bool,
}

/// Format specific half of a [`Dataset`], provided by a driver.
///
/// Band indexes are 1-based. Block buffers hold native-endian samples of the
/// band type, sized to the actual (edge clipped) block.
pub trait DatasetBackend: Send {
    fn common(&self) -> &DatasetCommon;

    fn common_mut(&mut self) -> &mut DatasetCommon;

    fn read_block(&mut self, band: usize, block_index: (usize, usize), out: &mut [u8])
        -> Result<()>;

    fn write_block(
        &mut self,
        _band: usize,
        _block_index: (usize, usize),
        _data: &[u8],
    ) -> Result<()> {
        Err(GdalError::NotSupported(
            "this dataset does not support writing".to_string(),
        ))
    }

    /// Writes pending state and releases caches.
    fn flush_cache(&mut self) -> Result<()> {
        Ok(())
    }

    /// Flushes and releases the underlying file. Called exactly once.
    fn close(&mut self) -> Result<()> {
        self.flush_cache()
    }
}

/// What a driver gets to look at when asked to open a file.
#[derive(Debug, Clone)]
pub struct OpenInfo {
    pub path: PathBuf,
    /// Leading bytes of the file, empty if it could not be read.
    pub header: Vec<u8>,
    pub access: Access,
    pub open_options: CslStringList,
}

impl OpenInfo {
    pub fn new(path: &Path, access: Access, open_options: CslStringList) -> Self {
        let header = vsi::read_header_bytes(path, HEADER_BYTES).unwrap_or_default();
        OpenInfo {
            path: path.to_path_buf(),
            header,
            access,
            open_options,
        }
    }
}

/// Wrapper around an open raster dataset.
///
/// A dataset may be moved to another thread but not shared between threads:
/// band reads go through sequential decoder state.
pub struct Dataset {
    backend: RefCell<Box<dyn DatasetBackend>>,
    driver: Driver,
    closed: bool,
}

impl Dataset {
    /// Open a dataset at the given `path` with default
    /// options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        Self::_open_ex(path.as_ref(), DatasetOptions::default())
    }

    /// Open a dataset with extended options. See
    /// [`GdalOpenFlags`] and [`DatasetOptions`].
    pub fn open_ex<P: AsRef<Path>>(path: P, options: DatasetOptions) -> Result<Dataset> {
        Self::_open_ex(path.as_ref(), options)
    }

    fn _open_ex(path: &Path, options: DatasetOptions) -> Result<Dataset> {
        let verbose = options
            .open_flags
            .contains(GdalOpenFlags::GDAL_OF_VERBOSE_ERROR);
        let result = Self::try_open(path, &options);
        match result {
            Err(err) if verbose => Err(err.report()),
            other => other,
        }
    }

    fn try_open(path: &Path, options: &DatasetOptions) -> Result<Dataset> {
        let mut open_options = CslStringList::new();
        for option in options.open_options.unwrap_or(&[]) {
            let (key, value) = option.split_once('=').ok_or_else(|| {
                GdalError::BadArgument(format!("open option '{option}' is not KEY=VALUE"))
            })?;
            open_options.set_name_value(key, value)?;
        }
        let info = OpenInfo::new(path, options.open_flags.into(), open_options);
        if info.header.is_empty() && !vsi::exists(path) {
            return Err(GdalError::OpenFailed {
                path: path.display().to_string(),
                msg: "No such file or directory".to_string(),
            });
        }

        let flags = options.open_flags;
        let want_raster = flags.contains(GdalOpenFlags::GDAL_OF_RASTER)
            || !flags.contains(GdalOpenFlags::GDAL_OF_VECTOR);
        for driver in DriverManager::drivers() {
            if let Some(allowed) = options.allowed_drivers {
                if !allowed
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(driver.short_name()))
                {
                    continue;
                }
            }
            if !want_raster && driver.is_raster() {
                continue;
            }
            if driver.identify(&info) {
                let backend = driver.open_backend(&info)?;
                return Ok(Dataset::from_backend(driver, backend));
            }
        }
        Err(GdalError::OpenFailed {
            path: path.display().to_string(),
            msg: "not recognized as a supported file format".to_string(),
        })
    }

    pub(crate) fn from_backend(driver: Driver, backend: Box<dyn DatasetBackend>) -> Dataset {
        Dataset {
            backend: RefCell::new(backend),
            driver,
            closed: false,
        }
    }

    pub(crate) fn backend(&self) -> Ref<'_, Box<dyn DatasetBackend>> {
        self.backend.borrow()
    }

    pub(crate) fn backend_mut(&self) -> RefMut<'_, Box<dyn DatasetBackend>> {
        self.backend.borrow_mut()
    }

    fn common_mut(&self) -> RefMut<'_, DatasetCommon> {
        RefMut::map(self.backend.borrow_mut(), |backend| {
            let common = backend.common_mut();
            common.dirty = true;
            common
        })
    }

    /// Get the driver used to open this dataset.
    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn access(&self) -> Access {
        self.backend().common().access
    }

    /// Fetch a band object for a dataset.
    ///
    /// Applies to raster datasets, and fetches the
    /// rasterband at the given _1-based_ index.
    pub fn rasterband(&self, band_index: usize) -> Result<RasterBand<'_>> {
        let count = self.raster_count();
        if band_index == 0 || band_index > count {
            return Err(GdalError::BadArgument(format!(
                "band index {band_index} is out of range 1..={count}"
            )));
        }
        Ok(RasterBand::new(self, band_index))
    }

    /// Iterate over all bands, in order.
    pub fn rasterbands(&self) -> impl Iterator<Item = RasterBand<'_>> {
        (1..=self.raster_count()).map(move |band| RasterBand::new(self, band))
    }

    pub fn raster_count(&self) -> usize {
        self.backend().common().bands.len()
    }

    /// Raster dimensions: (width, height)
    pub fn raster_size(&self) -> (usize, usize) {
        self.backend().common().raster_size
    }

    /// Get the spatial reference system for this dataset, as WKT.
    ///
    /// Returns an empty string when none is known.
    pub fn projection(&self) -> String {
        self.backend().common().projection.clone()
    }

    /// Set the projection reference string for this dataset.
    pub fn set_projection(&mut self, projection: &str) -> Result<()> {
        self.check_update("set_projection")?;
        self.common_mut().projection = projection.to_string();
        Ok(())
    }

    /// Set the [`GeoTransform`] of this dataset.
    pub fn set_geo_transform(&mut self, transformation: &GeoTransform) -> Result<()> {
        self.check_update("set_geo_transform")?;
        self.common_mut().geo_transform = Some(*transformation);
        Ok(())
    }

    /// Get the [`GeoTransform`] of this dataset.
    ///
    /// Fails when the dataset is not georeferenced.
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        self.backend()
            .common()
            .geo_transform
            .ok_or_else(|| GdalError::CplError {
                class: CplErrType::Failure,
                number: CplErrorNum::AppDefined,
                msg: "dataset has no geotransform".to_string(),
            })
    }

    fn check_update(&self, method_name: &str) -> Result<()> {
        if self.access() == Access::ReadOnly {
            return Err(GdalError::CplError {
                class: CplErrType::Failure,
                number: CplErrorNum::NoWriteAccess,
                msg: format!("{method_name}: dataset is opened in read-only mode"),
            }
            .report());
        }
        Ok(())
    }

    /// Writes pending changes and drops cached pixel data.
    ///
    /// Sequential formats will decode again from the start on the next read.
    pub fn flush_cache(&mut self) -> Result<()> {
        self.backend_mut().flush_cache()
    }

    /// Flushes and closes the dataset, reporting any error.
    ///
    /// Dropping a dataset closes it too, but errors are then only sent to the
    /// error handler.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        let result = self.backend.get_mut().close();
        result
    }

    /// Create a copy of this dataset in the format of `driver`.
    ///
    /// See [`Driver::create_copy`].
    pub fn create_copy<P: AsRef<Path>>(
        &self,
        driver: &Driver,
        filename: P,
        options: &CslStringList,
    ) -> Result<Dataset> {
        driver.create_copy(filename, self, false, options)
    }
}

impl Metadata for Dataset {
    fn metadata_store(&self) -> MetadataDomains {
        self.backend().common().metadata.clone()
    }

    fn set_metadata_item(&mut self, key: &str, value: &str, domain: &str) -> Result<()> {
        check_metadata_key(key)?;
        self.common_mut().metadata.set_item(key, value, domain);
        Ok(())
    }

    fn description(&self) -> Result<String> {
        Ok(self.backend().common().description.clone())
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.backend.get_mut().close() {
            crate::config::emit(CplErrType::Failure, err.category(), &err.to_string());
        }
    }
}

impl Debug for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("driver", &self.driver.short_name())
            .field("description", &self.backend().common().description)
            .field("raster_size", &self.raster_size())
            .field("raster_count", &self.raster_count())
            .finish()
    }
}
