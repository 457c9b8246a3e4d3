//! Layers over the result set of a MySQL `SELECT`.
//!
//! The connection is owned by the caller. A layer sees the rows through a
//! [`ResultSet`] and looks up geometry column metadata through a
//! [`GeometryCatalog`] (the `geometry_columns` and `spatial_ref_sys` tables).
//! [`MemoryResultSet`] and [`MemoryCatalog`] serve rows held in memory.

mod result_layer;

use std::collections::HashMap;

use bitflags::bitflags;

use crate::errors::{GdalError, Result};

pub use result_layer::{read_result_definition, MySqlResultLayer, ResultDefinition};

/// Column types as reported by the MySQL client library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    VarChar,
    Bit,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
}

impl ColumnType {
    /// Maps an `enum_field_types` code.
    pub fn from_code(code: u8) -> Option<ColumnType> {
        use ColumnType::*;
        Some(match code {
            0 => Decimal,
            1 => Tiny,
            2 => Short,
            3 => Long,
            4 => Float,
            5 => Double,
            6 => Null,
            7 => Timestamp,
            8 => LongLong,
            9 => Int24,
            10 => Date,
            11 => Time,
            12 => DateTime,
            13 => Year,
            14 => NewDate,
            15 => VarChar,
            16 => Bit,
            246 => NewDecimal,
            247 => Enum,
            248 => Set,
            249 => TinyBlob,
            250 => MediumBlob,
            251 => LongBlob,
            252 => Blob,
            253 => VarString,
            254 => String,
            255 => Geometry,
            _ => return None,
        })
    }
}

bitflags! {
    /// Column flags as reported by the MySQL client library.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u32 {
        const NOT_NULL = 1;
        const PRI_KEY = 2;
        const UNIQUE_KEY = 4;
        const MULTIPLE_KEY = 8;
        const BLOB = 16;
        const UNSIGNED = 32;
        const ZEROFILL = 64;
        const BINARY = 128;
    }
}

/// Description of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    /// Table the column comes from, empty for computed columns.
    pub table: String,
    pub field_type: ColumnType,
    /// Display width of the column.
    pub length: u64,
    /// Longest value in the result set.
    pub max_length: u64,
    pub decimals: u32,
    pub flags: ColumnFlags,
}

impl ColumnMeta {
    pub fn new(name: &str, table: &str, field_type: ColumnType) -> Self {
        ColumnMeta {
            name: name.to_string(),
            table: table.to_string(),
            field_type,
            length: 0,
            max_length: 0,
            decimals: 0,
            flags: ColumnFlags::empty(),
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = length;
        self
    }

    pub fn with_max_length(mut self, max_length: u64) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// One row: a cell per column, `None` for SQL `NULL`.
///
/// Cells hold the text protocol value, geometry cells the internal binary format.
pub type Row = Vec<Option<Vec<u8>>>;

/// The rows of an executed statement.
pub trait ResultSet {
    fn columns(&self) -> &[ColumnMeta];

    /// Number of rows, when known without reading them.
    fn row_count(&self) -> Option<u64> {
        None
    }

    fn fetch_row(&mut self) -> Result<Option<Row>>;

    /// Starts again from the first row, re-executing the statement if needed.
    fn rewind(&mut self) -> Result<()>;
}

/// Lookups in the geometry metadata tables.
pub trait GeometryCatalog {
    /// `type` of the table in `geometry_columns`.
    fn geometry_type(&mut self, table: &str) -> Result<Option<String>>;

    /// `srid` of the table in `geometry_columns`.
    fn srid(&mut self, table: &str) -> Result<Option<i32>>;

    /// `srtext` of `srid` in `spatial_ref_sys`.
    fn srs_text(&mut self, srid: i32) -> Result<Option<String>>;
}

/// A fully buffered result set.
#[derive(Debug, Clone, Default)]
pub struct MemoryResultSet {
    columns: Vec<ColumnMeta>,
    rows: Vec<Row>,
    cursor: usize,
}

impl MemoryResultSet {
    /// Fails if a row does not have one cell per column.
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(GdalError::BadArgument(format!(
                "row has {} cells for {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(MemoryResultSet {
            columns,
            rows,
            cursor: 0,
        })
    }
}

impl ResultSet for MemoryResultSet {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }

    fn fetch_row(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }
}

/// In-memory `geometry_columns` and `spatial_ref_sys` tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    geometry_columns: HashMap<String, (String, i32)>,
    spatial_ref_sys: HashMap<i32, String>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry_column(&mut self, table: &str, geometry_type: &str, srid: i32) {
        self.geometry_columns
            .insert(table.to_string(), (geometry_type.to_string(), srid));
    }

    pub fn add_spatial_ref(&mut self, srid: i32, srtext: &str) {
        self.spatial_ref_sys.insert(srid, srtext.to_string());
    }
}

impl GeometryCatalog for MemoryCatalog {
    fn geometry_type(&mut self, table: &str) -> Result<Option<String>> {
        Ok(self.geometry_columns.get(table).map(|(ty, _)| ty.clone()))
    }

    fn srid(&mut self, table: &str) -> Result<Option<i32>> {
        Ok(self.geometry_columns.get(table).map(|&(_, srid)| srid))
    }

    fn srs_text(&mut self, srid: i32) -> Result<Option<String>> {
        Ok(self.spatial_ref_sys.get(&srid).cloned())
    }
}

#[cfg(test)]
mod tests;
