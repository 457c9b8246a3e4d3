use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, Once};

use bitflags::bitflags;
use once_cell::sync::Lazy;

use crate::cpl::CslStringList;
use crate::dataset::{Dataset, DatasetBackend, OpenInfo};
use crate::errors::{GdalError, Result};
use crate::metadata::Metadata;
use crate::raster::{envi, png, GdalDataType, GdalType};

static DRIVERS: Lazy<Mutex<Vec<Driver>>> = Lazy::new(Default::default);
static AUTO_REGISTER: Once = Once::new();
static PREVENT_AUTO_REGISTRATION: AtomicBool = AtomicBool::new(false);

/// Returns `true` if `driver` recognizes the file described by `info`.
pub type IdentifyFn = fn(&OpenInfo) -> bool;
/// Opens an identified file.
pub type OpenFn = fn(&OpenInfo) -> Result<Box<dyn DatasetBackend>>;
/// Creates a new dataset: `(path, (width, height), band count, band type, options)`.
pub type CreateFn =
    fn(&Path, (usize, usize), usize, GdalDataType, &CslStringList) -> Result<Box<dyn DatasetBackend>>;
/// Writes a copy of a dataset: `(path, source, strict, options)`.
pub type CreateCopyFn = fn(&Path, &Dataset, bool, &CslStringList) -> Result<Box<dyn DatasetBackend>>;

bitflags! {
    /// Kinds of data a driver handles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DriverCapabilities: u32 {
        const RASTER = 0x01;
        const VECTOR = 0x02;
        /// Accepts `/vsimem/` paths.
        const VIRTUAL_IO = 0x04;
    }
}

/// Raster and Vector Driver API
///
/// A driver is a table of functions: identification, open and the optional
/// create / create-copy entry points.
#[derive(Debug, Clone, Copy)]
pub struct Driver {
    short_name: &'static str,
    long_name: &'static str,
    extensions: &'static str,
    capabilities: DriverCapabilities,
    identify: IdentifyFn,
    open: OpenFn,
    create: Option<CreateFn>,
    create_copy: Option<CreateCopyFn>,
}

impl PartialEq for Driver {
    fn eq(&self, other: &Self) -> bool {
        self.short_name.eq_ignore_ascii_case(other.short_name)
    }
}

impl Driver {
    pub fn new(
        short_name: &'static str,
        long_name: &'static str,
        identify: IdentifyFn,
        open: OpenFn,
    ) -> Driver {
        Driver {
            short_name,
            long_name,
            extensions: "",
            capabilities: DriverCapabilities::RASTER,
            identify,
            open,
            create: None,
            create_copy: None,
        }
    }

    /// Space separated list of file extensions, without dot.
    pub fn with_extensions(mut self, extensions: &'static str) -> Driver {
        self.extensions = extensions;
        self
    }

    pub fn with_capabilities(mut self, capabilities: DriverCapabilities) -> Driver {
        self.capabilities = capabilities;
        self
    }

    pub fn with_create(mut self, create: CreateFn) -> Driver {
        self.create = Some(create);
        self
    }

    pub fn with_create_copy(mut self, create_copy: CreateCopyFn) -> Driver {
        self.create_copy = Some(create_copy);
        self
    }

    /// Return the short name of a driver.
    ///
    /// For the PNG driver, this is "PNG"
    pub fn short_name(&self) -> &'static str {
        self.short_name
    }

    /// Return the long name of a driver.
    ///
    /// For the PNG driver, this is "Portable Network Graphics"
    pub fn long_name(&self) -> &'static str {
        self.long_name
    }

    pub fn extensions(&self) -> impl Iterator<Item = &'static str> {
        self.extensions.split_whitespace()
    }

    pub fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    pub fn is_raster(&self) -> bool {
        self.capabilities.contains(DriverCapabilities::RASTER)
    }

    pub fn identify(&self, info: &OpenInfo) -> bool {
        (self.identify)(info)
    }

    pub(crate) fn open_backend(&self, info: &OpenInfo) -> Result<Box<dyn DatasetBackend>> {
        (self.open)(info)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) and `bands` band count,
    /// and [`u8`] as the cell data type.
    ///
    /// To specify an alternative data type (e.g. [`f32`]), use [`Driver::create_with_band_type`].
    pub fn create<P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        self.create_with_band_type::<u8, _>(filename, size_x, size_y, bands)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) and `bands` band count,
    /// with cell data type specified by `T`.
    pub fn create_with_band_type<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
    ) -> Result<Dataset> {
        let options = CslStringList::new();
        self.create_with_band_type_with_options::<T, _>(filename, size_x, size_y, bands, &options)
    }

    /// Create a new dataset of size (`size_x`, `size_y`) and `bands` band count,
    /// with cell data type specified by `T` and extended options specified via `options`.
    pub fn create_with_band_type_with_options<T: GdalType, P: AsRef<Path>>(
        &self,
        filename: P,
        size_x: usize,
        size_y: usize,
        bands: usize,
        options: &CslStringList,
    ) -> Result<Dataset> {
        self._create(
            filename.as_ref(),
            (size_x, size_y),
            bands,
            T::gdal_type(),
            options,
        )
    }

    fn _create(
        &self,
        filename: &Path,
        size: (usize, usize),
        bands: usize,
        band_type: GdalDataType,
        options: &CslStringList,
    ) -> Result<Dataset> {
        let create = self.create.ok_or_else(|| {
            GdalError::NotSupported(format!("{} driver does not support creation", self.short_name))
                .report()
        })?;
        if size.0 == 0 || size.1 == 0 || bands == 0 {
            return Err(GdalError::BadArgument(format!(
                "cannot create a {}x{} dataset with {bands} bands",
                size.0, size.1
            ))
            .report());
        }
        let backend = create(filename, size, bands, band_type, options)?;
        Ok(Dataset::from_backend(*self, backend))
    }

    /// Create a copy of `source` in this driver's format.
    ///
    /// Drivers without a dedicated copy routine create an empty dataset of the
    /// same shape and band type, then copy georeferencing, band descriptions and
    /// pixels row by row.
    ///
    /// `strict` makes lossy conversions an error instead of a warning.
    pub fn create_copy<P: AsRef<Path>>(
        &self,
        filename: P,
        source: &Dataset,
        strict: bool,
        options: &CslStringList,
    ) -> Result<Dataset> {
        let filename = filename.as_ref();
        if let Some(create_copy) = self.create_copy {
            let backend = create_copy(filename, source, strict, options)?;
            return Ok(Dataset::from_backend(*self, backend));
        }
        self.default_create_copy(filename, source, options)
    }

    fn default_create_copy(
        &self,
        filename: &Path,
        source: &Dataset,
        options: &CslStringList,
    ) -> Result<Dataset> {
        let first = source.rasterband(1)?;
        let band_type = first.band_type();
        let (width, height) = source.raster_size();
        let count = source.raster_count();
        let mut target = self._create(filename, (width, height), count, band_type, options)?;

        if let Ok(gt) = source.geo_transform() {
            target.set_geo_transform(&gt)?;
        }
        let projection = source.projection();
        if !projection.is_empty() {
            target.set_projection(&projection)?;
        }
        for (src, mut dst) in source.rasterbands().zip(target.rasterbands()) {
            dst.set_description(&src.description()?)?;
            dst.set_no_data_value(src.no_data_value())?;
        }

        // Row-major order keeps sequential sources on their forward path.
        for y in 0..height {
            for (src, mut dst) in source.rasterbands().zip(target.rasterbands()) {
                if src.band_type() == dst.band_type() {
                    dst.write_raw_row(y, 0, &src.read_raw_row(y)?)?;
                } else {
                    let row = src.read_as::<f64>((0, y as isize), (width, 1), (width, 1))?;
                    dst.write((0, y as isize), (width, 1), &row)?;
                }
            }
        }
        target.flush_cache()?;
        Ok(target)
    }
}

/// A registry of the available drivers.
///
/// The built-in drivers (PNG, ENVI) are registered on first use unless
/// [`DriverManager::prevent_auto_registration`] was called before.
pub struct DriverManager;

impl DriverManager {
    fn registry() -> MutexGuard<'static, Vec<Driver>> {
        if !PREVENT_AUTO_REGISTRATION.load(Ordering::SeqCst) {
            AUTO_REGISTER.call_once(DriverManager::register_all);
        }
        DRIVERS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the registered drivers, in registration order.
    pub(crate) fn drivers() -> Vec<Driver> {
        Self::registry().clone()
    }

    /// Returns the number of registered drivers.
    pub fn count() -> usize {
        Self::registry().len()
    }

    /// Returns the driver at `index`.
    pub fn get_driver(index: usize) -> Result<Driver> {
        Self::registry()
            .get(index)
            .copied()
            .ok_or_else(|| GdalError::BadArgument(format!("no driver at index {index}")))
    }

    /// Get one of the registered drivers by its short name.
    pub fn get_driver_by_name(name: &str) -> Result<Driver> {
        Self::registry()
            .iter()
            .find(|driver| driver.short_name.eq_ignore_ascii_case(name))
            .copied()
            .ok_or_else(|| GdalError::BadArgument(format!("no driver named '{name}'")))
    }

    /// Returns the first driver that recognizes the file at `path`.
    pub fn get_driver_for_file<P: AsRef<Path>>(path: P) -> Option<Driver> {
        let info = OpenInfo::new(path.as_ref(), Default::default(), CslStringList::new());
        Self::drivers()
            .into_iter()
            .find(|driver| driver.identify(&info))
    }

    /// Returns the first driver able to create a dataset with the extension of `path`.
    pub fn get_output_driver_for_dataset_name<P: AsRef<Path>>(path: P) -> Option<Driver> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        Self::drivers().into_iter().find(|driver| {
            (driver.create.is_some() || driver.create_copy.is_some())
                && driver.extensions().any(|e| e.eq_ignore_ascii_case(&ext))
        })
    }

    /// Register a driver for use.
    ///
    /// Returns the index of the driver in the registry. Registering a driver
    /// twice keeps the first registration.
    pub fn register_driver(driver: &Driver) -> usize {
        let mut drivers = Self::registry();
        match drivers.iter().position(|d| d == driver) {
            Some(index) => index,
            None => {
                drivers.push(*driver);
                drivers.len() - 1
            }
        }
    }

    /// Deregister the passed driver.
    pub fn deregister_driver(driver: &Driver) {
        Self::registry().retain(|d| d != driver);
    }

    /// Register all the built-in drivers.
    pub fn register_all() {
        let mut drivers = DRIVERS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for driver in [png::driver(), envi::driver()] {
            if !drivers.contains(&driver) {
                drivers.push(driver);
            }
        }
    }

    /// Prevents the automatic registration of all known drivers when first calling
    /// [`DriverManager::count`], [`Dataset::open`], etc.
    ///
    /// Use [`DriverManager::register_all`] or [`DriverManager::register_driver`]
    /// to register drivers manually afterwards.
    pub fn prevent_auto_registration() {
        PREVENT_AUTO_REGISTRATION.store(true, Ordering::SeqCst);
    }

    /// Destroys the driver manager, i.e., deregisters all drivers.
    pub fn destroy() {
        DRIVERS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}
