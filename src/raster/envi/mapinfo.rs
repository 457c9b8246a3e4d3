//! `map info` records: georeferencing of ENVI rasters.

use super::header::{leading_float, leading_int, split_list};
use crate::GeoTransform;

/// U.S. survey foot, in metres.
const US_FOOT: f64 = 0.3048006096012192;

/// State Plane zone numbers as `(usgs, esri)` pairs.
#[rustfmt::skip]
const STATE_PLANE_ZONES: &[(u32, u32)] = &[
    (101, 3101), (102, 3126), (201, 3151), (202, 3176), (203, 3201), (301, 3226),
    (302, 3251), (401, 3276), (402, 3301), (403, 3326), (404, 3351), (405, 3376),
    (406, 3401), (407, 3426), (501, 3451), (502, 3476), (503, 3501), (600, 3526),
    (700, 3551), (901, 3601), (902, 3626), (903, 3576), (1001, 3651), (1002, 3676),
    (1101, 3701), (1102, 3726), (1103, 3751), (1201, 3776), (1202, 3801), (1301, 3826),
    (1302, 3851), (1401, 3876), (1402, 3901), (1501, 3926), (1502, 3951), (1601, 3976),
    (1602, 4001), (1701, 4026), (1702, 4051), (1703, 6426), (1801, 4076), (1802, 4101),
    (1900, 4126), (2001, 4151), (2002, 4176), (2101, 4201), (2102, 4226), (2103, 4251),
    (2111, 6351), (2112, 6376), (2113, 6401), (2201, 4276), (2202, 4301), (2203, 4326),
    (2301, 4351), (2302, 4376), (2401, 4401), (2402, 4426), (2403, 4451), (2500, 0),
    (2501, 4476), (2502, 4501), (2503, 4526), (2600, 0), (2601, 4551), (2602, 4576),
    (2701, 4601), (2702, 4626), (2703, 4651), (2800, 4676), (2900, 4701), (3001, 4726),
    (3002, 4751), (3003, 4776), (3101, 4801), (3102, 4826), (3103, 4851), (3104, 4876),
    (3200, 4901), (3301, 4926), (3302, 4951), (3401, 4976), (3402, 5001), (3501, 5026),
    (3502, 5051), (3601, 5076), (3602, 5101), (3701, 5126), (3702, 5151), (3800, 5176),
    (3900, 0), (3901, 5201), (3902, 5226), (4001, 5251), (4002, 5276), (4100, 5301),
    (4201, 5326), (4202, 5351), (4203, 5376), (4204, 5401), (4205, 5426), (4301, 5451),
    (4302, 5476), (4303, 5501), (4400, 5526), (4501, 5551), (4502, 5576), (4601, 5601),
    (4602, 5626), (4701, 5651), (4702, 5676), (4801, 5701), (4802, 5726), (4803, 5751),
    (4901, 5776), (4902, 5801), (4903, 5826), (4904, 5851), (5001, 6101), (5002, 6126),
    (5003, 6151), (5004, 6176), (5005, 6201), (5006, 6226), (5007, 6251), (5008, 6276),
    (5009, 6301), (5010, 6326), (5101, 5876), (5102, 5901), (5103, 5926), (5104, 5951),
    (5105, 5976), (5201, 6001), (5200, 6026), (5200, 6076), (5201, 6051), (5202, 6051),
    (5300, 0), (5400, 0),
];

/// USGS State Plane zone of an ESRI zone number, 0 if unknown.
pub fn esri_to_usgs_zone(esri_zone: i64) -> u32 {
    STATE_PLANE_ZONES
        .iter()
        .find(|&&(_, esri)| esri != 0 && i64::from(esri) == esri_zone)
        .map_or(0, |&(usgs, _)| usgs)
}

/// Coordinate system named by a `map info` record.
#[derive(Debug, Clone, PartialEq)]
pub enum MapProjection {
    Utm { zone: u32, north: bool },
    StatePlane { usgs_zone: u32, nad83: bool },
    Local { name: String },
}

/// A parsed `map info = {...}` value.
#[derive(Debug, Clone, PartialEq)]
pub struct MapInfo {
    /// First field, e.g. `UTM` or `Arbitrary`.
    pub name: String,
    pub projection: MapProjection,
    pub geo_transform: GeoTransform,
    pub units_feet: bool,
    /// Fields after the pixel size, kept verbatim for writing back.
    extra: Vec<String>,
}

impl MapInfo {
    /// Parses a `map info` value. Needs at least seven fields.
    pub fn parse(value: &str) -> Option<MapInfo> {
        let fields = split_list(value)?;
        if fields.len() < 7 {
            return None;
        }
        let number = |i: usize| leading_float(&fields[i]);
        let geo_transform = [number(3), number(5), 0.0, number(4), 0.0, -number(6)];

        let name = fields[0].clone();
        let projection = if name.starts_with("UTM") && fields.len() >= 9 {
            MapProjection::Utm {
                zone: leading_int(&fields[7]).max(0) as u32,
                north: !fields[8].eq_ignore_ascii_case("South"),
            }
        } else if fields.len() >= 8
            && (name.starts_with("State Plane (NAD 27)")
                || name.starts_with("State Plane (NAD 83)"))
        {
            MapProjection::StatePlane {
                usgs_zone: esri_to_usgs_zone(leading_int(&fields[7])),
                nad83: name.starts_with("State Plane (NAD 83)"),
            }
        } else {
            MapProjection::Local { name: name.clone() }
        };
        let units_feet = fields
            .last()
            .is_some_and(|last| last.eq_ignore_ascii_case("units=Feet"));

        Some(MapInfo {
            name,
            projection,
            geo_transform,
            units_feet,
            extra: fields[7..].to_vec(),
        })
    }

    /// Record for a dataset georeferenced without a known coordinate system.
    pub fn arbitrary(geo_transform: GeoTransform) -> MapInfo {
        MapInfo {
            name: "Arbitrary".to_string(),
            projection: MapProjection::Local {
                name: "Arbitrary".to_string(),
            },
            geo_transform,
            units_feet: false,
            extra: Vec::new(),
        }
    }

    /// Same coordinate system, new geotransform.
    pub fn with_geo_transform(&self, geo_transform: GeoTransform) -> MapInfo {
        MapInfo {
            geo_transform,
            ..self.clone()
        }
    }

    /// The `{...}` header value. The tie point is always pixel (1, 1).
    pub fn to_header_value(&self) -> String {
        let gt = &self.geo_transform;
        let mut fields = vec![
            self.name.clone(),
            "1".to_string(),
            "1".to_string(),
            gt[0].to_string(),
            gt[3].to_string(),
            gt[1].to_string(),
            (-gt[5]).to_string(),
        ];
        fields.extend(self.extra.iter().cloned());
        format!("{{{}}}", fields.join(", "))
    }

    /// Coordinate system as WKT.
    pub fn to_wkt(&self) -> String {
        let unit = if self.units_feet {
            format!("UNIT[\"US survey foot\",{US_FOOT}]")
        } else {
            "UNIT[\"metre\",1]".to_string()
        };
        match &self.projection {
            MapProjection::Utm { zone, north } => utm_wkt(*zone, *north, &unit),
            MapProjection::StatePlane { usgs_zone, nad83 } if *usgs_zone != 0 => {
                state_plane_wkt(*usgs_zone, *nad83, &unit)
            }
            MapProjection::StatePlane { .. } => local_wkt(&self.name, self.units_feet, &unit),
            MapProjection::Local { name } => local_wkt(name, self.units_feet, &unit),
        }
    }
}

const WGS84: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",\
SPHEROID[\"WGS 84\",6378137,298.257223563]],PRIMEM[\"Greenwich\",0],\
UNIT[\"degree\",0.0174532925199433]]";

const NAD27: &str = "GEOGCS[\"NAD27\",DATUM[\"North_American_Datum_1927\",\
SPHEROID[\"Clarke 1866\",6378206.4,294.9786982138982]],PRIMEM[\"Greenwich\",0],\
UNIT[\"degree\",0.0174532925199433]]";

const NAD83: &str = "GEOGCS[\"NAD83\",DATUM[\"North_American_Datum_1983\",\
SPHEROID[\"GRS 1980\",6378137,298.257222101]],PRIMEM[\"Greenwich\",0],\
UNIT[\"degree\",0.0174532925199433]]";

fn utm_wkt(zone: u32, north: bool, unit: &str) -> String {
    let hemisphere = if north { "Northern" } else { "Southern" };
    let central_meridian = i64::from(zone) * 6 - 183;
    let false_northing = if north { 0 } else { 10_000_000 };
    format!(
        "PROJCS[\"UTM Zone {zone}, {hemisphere} Hemisphere\",{WGS84},\
PROJECTION[\"Transverse_Mercator\"],\
PARAMETER[\"latitude_of_origin\",0],\
PARAMETER[\"central_meridian\",{central_meridian}],\
PARAMETER[\"scale_factor\",0.9996],\
PARAMETER[\"false_easting\",500000],\
PARAMETER[\"false_northing\",{false_northing}],{unit}]"
    )
}

// Zone parameters are not tabulated: the zone is carried in the name only.
fn state_plane_wkt(usgs_zone: u32, nad83: bool, unit: &str) -> String {
    let (datum, geogcs) = if nad83 {
        ("NAD83", NAD83)
    } else {
        ("NAD27", NAD27)
    };
    format!("PROJCS[\"{datum} / State Plane zone {usgs_zone}\",{geogcs},{unit}]")
}

fn local_wkt(name: &str, feet: bool, unit: &str) -> String {
    if feet {
        format!("LOCAL_CS[\"{name}\",{unit}]")
    } else {
        format!("LOCAL_CS[\"{name}\"]")
    }
}
