//! Well-known binary geometry decoding.

use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::errors::{GdalError, Result};

const WKB_POINT: u32 = 1;
const WKB_LINE_STRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTI_POINT: u32 = 4;
const WKB_MULTI_LINE_STRING: u32 = 5;
const WKB_MULTI_POLYGON: u32 = 6;
const WKB_GEOMETRY_COLLECTION: u32 = 7;

/// Collections nested deeper than this are rejected.
const MAX_DEPTH: usize = 32;

struct WkbReader<'a> {
    data: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl<'a> WkbReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        WkbReader {
            data,
            pos: 0,
            little_endian: true,
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or_else(|| GdalError::InvalidWkb(format!("truncated at byte {}", self.pos)))?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_byte_order(&mut self) -> Result<()> {
        self.little_endian = match self.take::<1>()?[0] {
            0 => false,
            1 => true,
            other => {
                return Err(GdalError::InvalidWkb(format!(
                    "invalid byte order marker {other}"
                )))
            }
        };
        Ok(())
    }

    fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn read_f64(&mut self) -> Result<f64> {
        let bytes = self.take::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }

    /// Reads an element count, refusing counts the remaining bytes cannot hold.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize> {
        let count = self.read_u32()? as usize;
        let remaining = self.data.len() - self.pos;
        if count.saturating_mul(min_item_size) > remaining {
            return Err(GdalError::InvalidWkb(format!(
                "{count} elements do not fit in {remaining} bytes"
            )));
        }
        Ok(count)
    }

    fn read_coord(&mut self) -> Result<Coord<f64>> {
        let x = self.read_f64()?;
        let y = self.read_f64()?;
        Ok(Coord { x, y })
    }

    fn read_line_string(&mut self) -> Result<LineString<f64>> {
        let count = self.read_count(16)?;
        let coords = (0..count)
            .map(|_| self.read_coord())
            .collect::<Result<Vec<_>>>()?;
        Ok(LineString::new(coords))
    }

    fn read_polygon(&mut self) -> Result<Polygon<f64>> {
        let count = self.read_count(4)?;
        let mut rings = (0..count)
            .map(|_| self.read_line_string())
            .collect::<Result<Vec<_>>>()?;
        if rings.is_empty() {
            return Ok(Polygon::new(LineString::new(Vec::new()), Vec::new()));
        }
        let exterior = rings.remove(0);
        Ok(Polygon::new(exterior, rings))
    }

    /// Reads members of a multi geometry, each with its own header.
    fn read_members<T>(
        &mut self,
        depth: usize,
        expected: u32,
        unwrap: fn(Geometry<f64>) -> Option<T>,
    ) -> Result<Vec<T>> {
        let count = self.read_count(5)?;
        (0..count)
            .map(|_| {
                let member = self.read_geometry(depth + 1)?;
                unwrap(member).ok_or_else(|| {
                    GdalError::InvalidWkb(format!("member is not of type {expected}"))
                })
            })
            .collect()
    }

    fn read_geometry(&mut self, depth: usize) -> Result<Geometry<f64>> {
        if depth > MAX_DEPTH {
            return Err(GdalError::InvalidWkb("geometry nested too deeply".to_string()));
        }
        self.read_byte_order()?;
        let geometry_type = self.read_u32()?;
        let geometry = match geometry_type {
            WKB_POINT => Geometry::Point(Point(self.read_coord()?)),
            WKB_LINE_STRING => Geometry::LineString(self.read_line_string()?),
            WKB_POLYGON => Geometry::Polygon(self.read_polygon()?),
            WKB_MULTI_POINT => {
                let points = self.read_members(depth, WKB_POINT, |g| match g {
                    Geometry::Point(p) => Some(p),
                    _ => None,
                })?;
                Geometry::MultiPoint(MultiPoint(points))
            }
            WKB_MULTI_LINE_STRING => {
                let lines = self.read_members(depth, WKB_LINE_STRING, |g| match g {
                    Geometry::LineString(l) => Some(l),
                    _ => None,
                })?;
                Geometry::MultiLineString(MultiLineString(lines))
            }
            WKB_MULTI_POLYGON => {
                let polygons = self.read_members(depth, WKB_POLYGON, |g| match g {
                    Geometry::Polygon(p) => Some(p),
                    _ => None,
                })?;
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
            WKB_GEOMETRY_COLLECTION => {
                let members = self.read_members(depth, WKB_GEOMETRY_COLLECTION, Some)?;
                Geometry::GeometryCollection(GeometryCollection(members))
            }
            other => return Err(GdalError::UnsupportedGdalGeometryType(other)),
        };
        Ok(geometry)
    }
}

/// Decodes a WKB geometry. Trailing bytes are ignored.
pub fn geometry_from_wkb(data: &[u8]) -> Result<Geometry<f64>> {
    WkbReader::new(data).read_geometry(0)
}

/// Decodes MySQL's internal geometry format: a little endian SRID
/// followed by WKB.
pub fn geometry_from_mysql(data: &[u8]) -> Result<(u32, Geometry<f64>)> {
    if data.len() < 4 {
        return Err(GdalError::InvalidWkb(format!(
            "{} bytes are too short for a geometry",
            data.len()
        )));
    }
    let srid = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    Ok((srid, geometry_from_wkb(&data[4..])?))
}
