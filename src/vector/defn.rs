use std::fmt::{Display, Formatter};

use crate::errors::{GdalError, Result};

/// Type of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Integer64,
    Real,
    String,
    Date,
    DateTime,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Integer => "Integer",
            FieldType::Integer64 => "Integer64",
            FieldType::Real => "Real",
            FieldType::String => "String",
            FieldType::Date => "Date",
            FieldType::DateTime => "DateTime",
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Geometry type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// The layer has no geometry.
    None,
    Unknown,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Looks up an OGC type name such as `MULTIPOLYGON` (case-insensitive).
    ///
    /// Names outside the standard OGC set are `Unknown`.
    pub fn from_name(name: &str) -> GeometryType {
        [
            GeometryType::Point,
            GeometryType::LineString,
            GeometryType::Polygon,
            GeometryType::MultiPoint,
            GeometryType::MultiLineString,
            GeometryType::MultiPolygon,
            GeometryType::GeometryCollection,
        ]
        .into_iter()
        .find(|ty| ty.name().eq_ignore_ascii_case(name.trim()))
        .unwrap_or(GeometryType::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::None => "NONE",
            GeometryType::Unknown => "GEOMETRY",
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }
}

/// Definition of one attribute field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefn {
    name: String,
    field_type: FieldType,
    width: i32,
    precision: i32,
}

impl FieldDefn {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        FieldDefn {
            name: name.to_string(),
            field_type,
            width: 0,
            precision: 0,
        }
    }

    pub fn set_width(&mut self, width: i32) {
        self.width = width;
    }

    pub fn set_precision(&mut self, precision: i32) {
        self.precision = precision;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Formatting width, 0 when unknown.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Digits after the decimal point, for `Real` fields.
    pub fn precision(&self) -> i32 {
        self.precision
    }
}

/// Layer definition
///
/// Defines the fields available for features in a layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defn {
    name: String,
    fields: Vec<FieldDefn>,
    geometry_type: GeometryType,
}

impl Defn {
    /// An empty definition without geometry.
    pub fn new(name: &str) -> Self {
        Defn {
            name: name.to_string(),
            fields: Vec::new(),
            geometry_type: GeometryType::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_field(&mut self, field: FieldDefn) {
        self.fields.push(field);
    }

    /// Iterate over the field schema of this layer.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDefn> {
        self.fields.iter()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, index: usize) -> Result<&FieldDefn> {
        self.fields
            .get(index)
            .ok_or(GdalError::InvalidFieldIndex {
                index,
                method_name: "field",
            })
    }

    /// Index of the field called `name` (case-insensitive).
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|field| field.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| GdalError::InvalidFieldName {
                field_name: name.to_string(),
                method_name: "field_index",
            })
    }

    /// Get the geometry type of the layer.
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn set_geometry_type(&mut self, geometry_type: GeometryType) {
        self.geometry_type = geometry_type;
    }
}
