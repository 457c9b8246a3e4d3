use bitflags::bitflags;

/// Open options for [`crate::Dataset`]
#[derive(Debug, Default)]
pub struct DatasetOptions<'a> {
    pub open_flags: GdalOpenFlags,
    /// Short names of the drivers to try, in registry order.
    pub allowed_drivers: Option<&'a [&'a str]>,
    /// Driver specific `KEY=VALUE` options.
    pub open_options: Option<&'a [&'a str]>,
}

bitflags! {
    /// Extended open flags used by [`Dataset::open_ex`](crate::Dataset::open_ex).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GdalOpenFlags: u32 {
        /// Open in read-only mode (default).
        const GDAL_OF_READONLY = 0x00;
        /// Open in update mode.
        const GDAL_OF_UPDATE = 0x01;
        /// Allow raster and vector drivers to be used.
        const GDAL_OF_ALL = 0x00;
        /// Allow raster drivers to be used.
        const GDAL_OF_RASTER = 0x02;
        /// Allow vector drivers to be used.
        const GDAL_OF_VECTOR = 0x04;
        /// Emit error message in case of failed open.
        const GDAL_OF_VERBOSE_ERROR = 0x40;
    }
}

impl Default for GdalOpenFlags {
    fn default() -> GdalOpenFlags {
        GdalOpenFlags::GDAL_OF_READONLY
    }
}

/// Access mode of an open dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadOnly,
    Update,
}

impl From<GdalOpenFlags> for Access {
    fn from(flags: GdalOpenFlags) -> Access {
        if flags.contains(GdalOpenFlags::GDAL_OF_UPDATE) {
            Access::Update
        } else {
            Access::ReadOnly
        }
    }
}
