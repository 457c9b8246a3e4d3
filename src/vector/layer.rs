use crate::errors::{GdalError, Result};
use crate::vector::defn::Defn;
use crate::vector::feature::Feature;

/// Sequential access to the features of a layer.
///
/// ```rust, no_run
/// use gdal_frmts::vector::LayerAccess;
///
/// fn print_fids<L: LayerAccess>(layer: &mut L) {
///     for feature in layer.features() {
///         println!("{:?}", feature.fid());
///     }
/// }
/// ```
pub trait LayerAccess {
    fn defn(&self) -> &Defn;

    /// Get the name of this layer.
    fn name(&self) -> String {
        self.defn().name().to_string()
    }

    /// Next feature, `None` once every feature was read.
    fn next_feature(&mut self) -> Result<Option<Feature>>;

    /// Rewinds to the first feature.
    fn reset_reading(&mut self) -> Result<()>;

    /// Coordinate system of the geometries, as WKT.
    fn spatial_ref(&self) -> Option<&str> {
        None
    }

    /// Number of features in the layer.
    ///
    /// Counts by reading every feature, then rewinds.
    fn feature_count(&mut self) -> Result<u64> {
        count_by_reading(self)
    }

    /// Iterate over the remaining features of this layer.
    ///
    /// Errors end the iteration and are sent to the error handler.
    fn features(&mut self) -> FeatureIterator<'_, Self>
    where
        Self: Sized,
    {
        FeatureIterator { layer: self }
    }
}

/// Counts features by reading them all, leaving the layer rewound.
pub(crate) fn count_by_reading<L: LayerAccess + ?Sized>(layer: &mut L) -> Result<u64> {
    layer.reset_reading()?;
    let mut count = 0;
    while layer.next_feature()?.is_some() {
        count += 1;
    }
    layer.reset_reading()?;
    Ok(count)
}

pub struct FeatureIterator<'a, L: LayerAccess> {
    layer: &'a mut L,
}

impl<L: LayerAccess> Iterator for FeatureIterator<'_, L> {
    type Item = Feature;

    #[inline]
    fn next(&mut self) -> Option<Feature> {
        self.layer
            .next_feature()
            .map_err(GdalError::report)
            .ok()
            .flatten()
    }
}
