use std::sync::Arc;

use super::{ColumnFlags, ColumnMeta, ColumnType, GeometryCatalog, ResultSet, Row};
use crate::config::{cpl_debug, warn};
use crate::errors::{CplErrorNum, Result};
use crate::vector::defn::{Defn, FieldDefn, FieldType, GeometryType};
use crate::vector::feature::{Feature, FieldValue};
use crate::vector::layer::{count_by_reading, LayerAccess};
use crate::vector::wkb::geometry_from_mysql;

/// Name of the layer built from a statement.
const LAYER_NAME: &str = "sql_statement";

/// Schema of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultDefinition {
    pub defn: Defn,
    /// Column providing feature ids.
    pub fid_column: Option<String>,
    /// Column holding geometries, and the table it comes from.
    pub geometry_column: Option<(String, String)>,
    pub srid: Option<i32>,
    /// Coordinate system of the geometry column, as WKT.
    pub srs_wkt: Option<String>,
}

fn width(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Attribute field for `column`, `None` for geometry and unsupported columns.
fn field_for_column(column: &ColumnMeta) -> Option<FieldDefn> {
    let (field_type, field_width, precision) = match column.field_type {
        ColumnType::Tiny | ColumnType::Short | ColumnType::Long | ColumnType::Int24 => {
            (FieldType::Integer, width(column.length), 0)
        }
        ColumnType::LongLong => (FieldType::Integer64, width(column.length), 0),
        ColumnType::Decimal | ColumnType::NewDecimal => {
            // The reported length counts the sign and the decimal point.
            let precision = width(u64::from(column.decimals));
            let point = if precision == 0 { 1 } else { 0 };
            let field_width = width(column.length)
                .saturating_sub(point)
                .saturating_sub(precision);
            (FieldType::Real, field_width, precision)
        }
        ColumnType::Float | ColumnType::Double => (FieldType::Real, width(column.length), 0),
        ColumnType::Date | ColumnType::NewDate => (FieldType::Date, width(column.length), 0),
        ColumnType::DateTime | ColumnType::Timestamp => {
            (FieldType::DateTime, width(column.length), 0)
        }
        ColumnType::Time | ColumnType::Year | ColumnType::String | ColumnType::VarString => {
            (FieldType::String, width(column.length), 0)
        }
        ColumnType::Blob => (FieldType::String, width(column.max_length), 0),
        _ => return None,
    };
    let mut field = FieldDefn::new(&column.name, field_type);
    field.set_width(field_width);
    field.set_precision(precision);
    Some(field)
}

fn lookup<T>(what: &str, result: Result<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|err| {
        cpl_debug("MySQL", &format!("{what} lookup failed: {err}"));
        None
    })
}

/// Builds the layer schema from the columns of a result set.
///
/// The feature id column is `ogc_fid` when present, otherwise the first
/// `NOT NULL` primary key column. It stays an attribute field too. The first
/// geometry column becomes the layer geometry; its type and coordinate
/// system come from `catalog`.
pub fn read_result_definition<C: GeometryCatalog + ?Sized>(
    columns: &[ColumnMeta],
    catalog: &mut C,
) -> Result<ResultDefinition> {
    let mut defn = Defn::new(LAYER_NAME);
    let mut geometry_column = None;
    for column in columns {
        if let Some(field) = field_for_column(column) {
            defn.add_field(field);
        } else if column.field_type == ColumnType::Geometry && geometry_column.is_none() {
            geometry_column = Some((column.name.clone(), column.table.clone()));
        }
    }

    let fid_column = columns
        .iter()
        .find(|column| column.name.eq_ignore_ascii_case("ogc_fid"))
        .or_else(|| {
            columns.iter().find(|column| {
                column
                    .flags
                    .contains(ColumnFlags::NOT_NULL | ColumnFlags::PRI_KEY)
            })
        })
        .map(|column| column.name.clone());

    let mut srid = None;
    let mut srs_wkt = None;
    if let Some((_, table)) = &geometry_column {
        let type_name = lookup("geometry type", catalog.geometry_type(table));
        defn.set_geometry_type(
            type_name
                .as_deref()
                .map_or(GeometryType::Unknown, GeometryType::from_name),
        );
        srid = lookup("srid", catalog.srid(table));
        if let Some(srid) = srid {
            srs_wkt = lookup("spatial_ref_sys", catalog.srs_text(srid));
        }
    }

    Ok(ResultDefinition {
        defn,
        fid_column,
        geometry_column,
        srid,
        srs_wkt,
    })
}

/// What to do with each cell of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellRole {
    Field(usize),
    Geometry,
    Ignored,
}

/// A read-only layer over the rows returned by a `SELECT` statement.
#[derive(Debug)]
pub struct MySqlResultLayer<R: ResultSet> {
    statement: String,
    result: R,
    definition: ResultDefinition,
    defn: Arc<Defn>,
    roles: Vec<CellRole>,
    fid_index: Option<usize>,
    next_shape_id: u64,
}

impl<R: ResultSet> MySqlResultLayer<R> {
    /// Wraps the result of `statement`.
    pub fn new<C: GeometryCatalog + ?Sized>(
        statement: &str,
        result: R,
        catalog: &mut C,
    ) -> Result<Self> {
        let definition = read_result_definition(result.columns(), catalog)?;
        let columns = result.columns();
        let mut next_field = 0;
        let roles = columns
            .iter()
            .map(|column| {
                if field_for_column(column).is_some() {
                    next_field += 1;
                    CellRole::Field(next_field - 1)
                } else if definition
                    .geometry_column
                    .as_ref()
                    .is_some_and(|(name, _)| *name == column.name)
                    && column.field_type == ColumnType::Geometry
                {
                    CellRole::Geometry
                } else {
                    CellRole::Ignored
                }
            })
            .collect();
        let fid_index = definition
            .fid_column
            .as_ref()
            .and_then(|fid| columns.iter().position(|column| column.name == *fid));
        cpl_debug(
            "MySQL",
            &format!(
                "result layer: {} fields, geometry {}, fid column {:?}",
                definition.defn.field_count(),
                definition.defn.geometry_type().name(),
                definition.fid_column
            ),
        );
        Ok(MySqlResultLayer {
            statement: statement.to_string(),
            defn: Arc::new(definition.defn.clone()),
            definition,
            result,
            roles,
            fid_index,
            next_shape_id: 0,
        })
    }

    /// The statement the rows come from.
    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn definition(&self) -> &ResultDefinition {
        &self.definition
    }

    pub fn fid_column(&self) -> Option<&str> {
        self.definition.fid_column.as_deref()
    }

    pub fn geometry_column(&self) -> Option<&str> {
        self.definition
            .geometry_column
            .as_ref()
            .map(|(name, _)| name.as_str())
    }

    pub fn srid(&self) -> Option<i32> {
        self.definition.srid
    }

    fn record_to_feature(&self, row: Row) -> Feature {
        let mut feature = Feature::new(self.defn.clone());
        feature.set_fid(Some(self.next_shape_id));
        for (index, (cell, role)) in row.into_iter().zip(&self.roles).enumerate() {
            let Some(cell) = cell else {
                continue;
            };
            if Some(index) == self.fid_index {
                if let Ok(fid) = String::from_utf8_lossy(&cell).trim().parse() {
                    feature.set_fid(Some(fid));
                }
            }
            match *role {
                CellRole::Geometry => match geometry_from_mysql(&cell) {
                    Ok((_, geometry)) => feature.set_geometry(Some(geometry)),
                    Err(err) => warn(
                        CplErrorNum::AppDefined,
                        &format!("feature {}: {err}", self.next_shape_id),
                    ),
                },
                CellRole::Field(field) => {
                    let field_type = self.defn.field(field).map(FieldDefn::field_type).ok();
                    let text = String::from_utf8_lossy(&cell);
                    let value = field_type.and_then(|ty| FieldValue::parse(ty, &text));
                    if value.is_none() {
                        cpl_debug("MySQL", &format!("unparsable value '{text}' left unset"));
                    }
                    if let Err(err) = feature.set_field_by_index(field, value) {
                        cpl_debug("MySQL", &format!("field {field} left unset: {err}"));
                    }
                }
                CellRole::Ignored => {}
            }
        }
        feature
    }
}

impl<R: ResultSet> LayerAccess for MySqlResultLayer<R> {
    fn defn(&self) -> &Defn {
        &self.defn
    }

    fn next_feature(&mut self) -> Result<Option<Feature>> {
        let Some(row) = self.result.fetch_row()? else {
            return Ok(None);
        };
        let feature = self.record_to_feature(row);
        self.next_shape_id += 1;
        Ok(Some(feature))
    }

    fn reset_reading(&mut self) -> Result<()> {
        self.next_shape_id = 0;
        self.result.rewind()
    }

    fn spatial_ref(&self) -> Option<&str> {
        self.definition.srs_wkt.as_deref()
    }

    /// Number of rows of the result set, counted by reading when the result
    /// set does not know it.
    fn feature_count(&mut self) -> Result<u64> {
        match self.result.row_count() {
            Some(count) => Ok(count),
            None => count_by_reading(self),
        }
    }
}
