use crate::errors;
use crate::errors::GdalError;

/// An affine transform.
///
/// A six-element array storing the coefficients of an [affine transform]
/// used in mapping coordinates between pixel/line `(P, L)` (raster) space,
/// and `(Xp,Yp)` (projection) space.
///
/// # Interpretation
///
/// A `GeoTransform`'s components have the following meanings:
///
///   * `GeoTransform[0]`: x-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[1]`: W-E pixel resolution (pixel width).
///   * `GeoTransform[2]`: row rotation (typically zero).
///   * `GeoTransform[3]`: y-coordinate of the upper-left corner of the upper-left pixel.
///   * `GeoTransform[4]`: column rotation (typically zero).
///   * `GeoTransform[5]`: N-S pixel resolution (pixel height), negative value for a North-up image.
///
/// ENVI `map info` records are turned into a `GeoTransform` when a dataset is opened,
/// and written back from it on flush.
///
/// # Usage
///  *  [`apply`](GeoTransformEx::apply): perform a `(P,L) -> (Xp,Yp)` transformation
///  *  [`invert`](GeoTransformEx::invert):  construct the inverse transformation coefficients
///     for computing `(Xp,Yp) -> (P,L)` transformations
///
/// # Example
///
/// ```rust
/// use gdal_frmts::{GeoTransform, GeoTransformEx};
/// let transform: GeoTransform = [768269.0, 1.0, 0.0, 4057292.0, 0.0, -1.0];
/// let (x, y) = transform.apply(0.0, 0.0);
/// assert_eq!((x, y), (768269.0, 4057292.0));
/// let inverse = transform.invert().unwrap();
/// let (p, l) = inverse.apply(x, y);
/// assert_eq!((p, l), (0.0, 0.0));
/// ```
///
/// [affine transform]: https://en.wikipedia.org/wiki/Affine_transformation
pub type GeoTransform = [f64; 6];

/// Extension methods on [`GeoTransform`]
pub trait GeoTransformEx {
    /// Apply GeoTransform to x/y coordinate.
    ///
    /// # Example
    ///
    /// See [`GeoTransform`](GeoTransform#example)
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64);

    /// Invert a [`GeoTransform`].
    ///
    /// Fails with [`GdalError::BadArgument`] when the transform is degenerate.
    ///
    /// # Example
    ///
    /// See [`GeoTransform`](GeoTransform#example)
    fn invert(&self) -> errors::Result<GeoTransform>;
}

impl GeoTransformEx for GeoTransform {
    fn apply(&self, pixel: f64, line: f64) -> (f64, f64) {
        let geo_x = self[0] + pixel * self[1] + line * self[2];
        let geo_y = self[3] + pixel * self[4] + line * self[5];
        (geo_x, geo_y)
    }

    fn invert(&self) -> errors::Result<GeoTransform> {
        // Fast path for north-up images.
        if self[2] == 0.0 && self[4] == 0.0 && self[1] != 0.0 && self[5] != 0.0 {
            return Ok([
                -self[0] / self[1],
                1.0 / self[1],
                0.0,
                -self[3] / self[5],
                0.0,
                1.0 / self[5],
            ]);
        }

        let det = self[1] * self[5] - self[2] * self[4];
        let magnitude = self[1]
            .abs()
            .max(self[2].abs())
            .max(self[4].abs().max(self[5].abs()));
        if det.abs() <= 1e-10 * magnitude * magnitude {
            return Err(GdalError::BadArgument(
                "Geo transform is uninvertible".to_string(),
            ));
        }
        let inv_det = 1.0 / det;

        let mut out = [0.0; 6];
        out[1] = self[5] * inv_det;
        out[4] = -self[4] * inv_det;
        out[2] = -self[2] * inv_det;
        out[5] = self[1] * inv_det;
        out[0] = (self[2] * self[3] - self[0] * self[5]) * inv_det;
        out[3] = (-self[1] * self[3] + self[0] * self[4]) * inv_det;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_and_invert_rotated() {
        let gt: GeoTransform = [100.0, 2.0, 0.5, 200.0, 0.25, -3.0];
        let inv = gt.invert().unwrap();
        let (x, y) = gt.apply(7.0, 11.0);
        let (p, l) = inv.apply(x, y);
        assert!((p - 7.0).abs() < 1e-9);
        assert!((l - 11.0).abs() < 1e-9);
    }

    #[test]
    fn singular() {
        let gt: GeoTransform = [0.0, 1.0, 2.0, 0.0, 2.0, 4.0];
        assert!(matches!(gt.invert(), Err(GdalError::BadArgument(_))));
    }
}
