use chrono::NaiveDate;
use geo_types::{Geometry, Point};

use super::*;
use crate::errors::GdalError;
use crate::vector::{FieldType, FieldValue, GeometryType, LayerAccess};

fn mysql_point(srid: u32, x: f64, y: f64) -> Vec<u8> {
    let mut data = srid.to_le_bytes().to_vec();
    data.push(1);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&x.to_le_bytes());
    data.extend_from_slice(&y.to_le_bytes());
    data
}

fn cell(text: &str) -> Option<Vec<u8>> {
    Some(text.as_bytes().to_vec())
}

fn roads_columns() -> Vec<ColumnMeta> {
    vec![
        ColumnMeta::new("id", "roads", ColumnType::Long)
            .with_length(11)
            .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::PRI_KEY),
        ColumnMeta::new("name", "roads", ColumnType::VarString).with_length(40),
        ColumnMeta::new("length", "roads", ColumnType::NewDecimal)
            .with_length(10)
            .with_decimals(2),
        ColumnMeta::new("opened", "roads", ColumnType::Date).with_length(10),
        ColumnMeta::new("shape", "roads", ColumnType::Geometry),
    ]
}

fn roads_result() -> MemoryResultSet {
    MemoryResultSet::new(
        roads_columns(),
        vec![
            vec![
                cell("10"),
                cell("Main street"),
                cell("12.50"),
                cell("2001-02-03"),
                Some(mysql_point(4326, 1.5, 2.5)),
            ],
            vec![cell("20"), None, cell("3.25"), cell("0000-00-00"), None],
        ],
    )
    .unwrap()
}

fn roads_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.add_geometry_column("roads", "LINESTRING", 4326);
    catalog.add_spatial_ref(4326, "GEOGCS[\"WGS 84\"]");
    catalog
}

/// Streams its rows without knowing their count.
struct StreamingResult(MemoryResultSet);

impl ResultSet for StreamingResult {
    fn columns(&self) -> &[ColumnMeta] {
        self.0.columns()
    }

    fn fetch_row(&mut self) -> Result<Option<Row>> {
        self.0.fetch_row()
    }

    fn rewind(&mut self) -> Result<()> {
        self.0.rewind()
    }
}

struct FailingCatalog;

impl GeometryCatalog for FailingCatalog {
    fn geometry_type(&mut self, _table: &str) -> Result<Option<String>> {
        Err(GdalError::BadArgument("no geometry_columns table".to_string()))
    }

    fn srid(&mut self, _table: &str) -> Result<Option<i32>> {
        Err(GdalError::BadArgument("no geometry_columns table".to_string()))
    }

    fn srs_text(&mut self, _srid: i32) -> Result<Option<String>> {
        Ok(None)
    }
}

#[test]
fn test_column_type_codes() {
    assert_eq!(ColumnType::from_code(3), Some(ColumnType::Long));
    assert_eq!(ColumnType::from_code(246), Some(ColumnType::NewDecimal));
    assert_eq!(ColumnType::from_code(255), Some(ColumnType::Geometry));
    assert_eq!(ColumnType::from_code(100), None);
}

#[test]
fn test_memory_result_set_checks_rows() {
    let columns = vec![ColumnMeta::new("a", "t", ColumnType::Long)];
    let err = MemoryResultSet::new(columns, vec![vec![cell("1"), cell("2")]]).unwrap_err();
    assert!(matches!(err, GdalError::BadArgument(_)));
}

#[test]
fn test_result_definition_fields() {
    let definition = read_result_definition(&roads_columns(), &mut roads_catalog()).unwrap();
    let defn = &definition.defn;
    assert_eq!(defn.name(), "sql_statement");
    assert_eq!(defn.field_count(), 4);

    let id = defn.field(0).unwrap();
    assert_eq!(id.name(), "id");
    assert_eq!(id.field_type(), FieldType::Integer);
    assert_eq!(id.width(), 11);

    let name = defn.field(1).unwrap();
    assert_eq!(name.field_type(), FieldType::String);
    assert_eq!(name.width(), 40);

    let length = defn.field(2).unwrap();
    assert_eq!(length.field_type(), FieldType::Real);
    assert_eq!(length.width(), 8);
    assert_eq!(length.precision(), 2);

    assert_eq!(defn.field(3).unwrap().field_type(), FieldType::Date);

    assert_eq!(definition.fid_column.as_deref(), Some("id"));
    assert_eq!(
        definition.geometry_column,
        Some(("shape".to_string(), "roads".to_string()))
    );
    assert_eq!(defn.geometry_type(), GeometryType::LineString);
    assert_eq!(definition.srid, Some(4326));
    assert_eq!(definition.srs_wkt.as_deref(), Some("GEOGCS[\"WGS 84\"]"));
}

#[test]
fn test_result_definition_type_mapping() {
    let columns = vec![
        ColumnMeta::new("whole", "", ColumnType::Decimal).with_length(6),
        ColumnMeta::new("big", "", ColumnType::LongLong).with_length(20),
        ColumnMeta::new("ratio", "", ColumnType::Double).with_length(22),
        ColumnMeta::new("stamp", "", ColumnType::Timestamp).with_length(19),
        ColumnMeta::new("at", "", ColumnType::Time).with_length(8),
        ColumnMeta::new("notes", "", ColumnType::Blob)
            .with_length(65535)
            .with_max_length(120),
        ColumnMeta::new("flags", "", ColumnType::Set),
    ];
    let definition = read_result_definition(&columns, &mut MemoryCatalog::new()).unwrap();
    let defn = &definition.defn;
    assert_eq!(defn.field_count(), 6);

    let whole = defn.field(0).unwrap();
    assert_eq!(whole.field_type(), FieldType::Real);
    assert_eq!(whole.width(), 5);
    assert_eq!(whole.precision(), 0);

    assert_eq!(defn.field(1).unwrap().field_type(), FieldType::Integer64);
    assert_eq!(defn.field(2).unwrap().width(), 22);
    assert_eq!(defn.field(3).unwrap().field_type(), FieldType::DateTime);
    assert_eq!(defn.field(4).unwrap().field_type(), FieldType::String);
    assert_eq!(defn.field(5).unwrap().width(), 120);
    assert!(defn.field_index("flags").is_err());

    assert_eq!(definition.fid_column, None);
    assert_eq!(definition.geometry_column, None);
    assert_eq!(defn.geometry_type(), GeometryType::None);
    assert_eq!(definition.srid, None);
}

#[test]
fn test_ogc_fid_preferred_over_primary_key() {
    let columns = vec![
        ColumnMeta::new("pk", "t", ColumnType::Long)
            .with_flags(ColumnFlags::NOT_NULL | ColumnFlags::PRI_KEY),
        ColumnMeta::new("OGC_FID", "t", ColumnType::Long),
    ];
    let definition = read_result_definition(&columns, &mut MemoryCatalog::new()).unwrap();
    assert_eq!(definition.fid_column.as_deref(), Some("OGC_FID"));

    // A nullable key does not qualify.
    let columns = vec![ColumnMeta::new("pk", "t", ColumnType::Long)
        .with_flags(ColumnFlags::PRI_KEY)];
    let definition = read_result_definition(&columns, &mut MemoryCatalog::new()).unwrap();
    assert_eq!(definition.fid_column, None);
}

#[test]
fn test_unregistered_geometry_column() {
    let columns = vec![ColumnMeta::new("geom", "shapes", ColumnType::Geometry)];
    let definition = read_result_definition(&columns, &mut MemoryCatalog::new()).unwrap();
    assert_eq!(definition.defn.geometry_type(), GeometryType::Unknown);
    assert_eq!(definition.srid, None);
    assert_eq!(definition.srs_wkt, None);

    let definition = read_result_definition(&columns, &mut FailingCatalog).unwrap();
    assert_eq!(definition.defn.geometry_type(), GeometryType::Unknown);
}

#[test]
fn test_result_layer_features() {
    let mut layer =
        MySqlResultLayer::new("SELECT * FROM roads", roads_result(), &mut roads_catalog()).unwrap();
    assert_eq!(layer.statement(), "SELECT * FROM roads");
    assert_eq!(layer.name(), "sql_statement");
    assert_eq!(layer.fid_column(), Some("id"));
    assert_eq!(layer.geometry_column(), Some("shape"));
    assert_eq!(layer.srid(), Some(4326));
    assert_eq!(layer.spatial_ref(), Some("GEOGCS[\"WGS 84\"]"));

    let first = layer.next_feature().unwrap().unwrap();
    assert_eq!(first.fid(), Some(10));
    assert_eq!(
        first.field("name").unwrap(),
        Some(FieldValue::StringValue("Main street".to_string()))
    );
    assert_eq!(first.field("length").unwrap(), Some(FieldValue::RealValue(12.5)));
    assert_eq!(first.field("id").unwrap(), Some(FieldValue::IntegerValue(10)));
    assert_eq!(
        first.field("opened").unwrap().unwrap().into_date(),
        NaiveDate::from_ymd_opt(2001, 2, 3)
    );
    assert_eq!(
        first.geometry(),
        Some(&Geometry::Point(Point::new(1.5, 2.5)))
    );

    let second = layer.next_feature().unwrap().unwrap();
    assert_eq!(second.fid(), Some(20));
    assert_eq!(second.field("name").unwrap(), None);
    assert_eq!(second.field("opened").unwrap(), None);
    assert_eq!(second.geometry(), None);

    assert!(layer.next_feature().unwrap().is_none());
}

#[test]
fn test_result_layer_reset_and_count() {
    let mut layer =
        MySqlResultLayer::new("SELECT * FROM roads", roads_result(), &mut roads_catalog()).unwrap();
    assert_eq!(layer.features().count(), 2);
    assert!(layer.next_feature().unwrap().is_none());

    layer.reset_reading().unwrap();
    assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(10));
    assert_eq!(layer.feature_count().unwrap(), 2);

    let streaming = StreamingResult(roads_result());
    let mut layer =
        MySqlResultLayer::new("SELECT * FROM roads", streaming, &mut roads_catalog()).unwrap();
    layer.next_feature().unwrap();
    assert_eq!(layer.feature_count().unwrap(), 2);
    // Counting rewinds.
    assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(10));
}

#[test]
fn test_sequential_fids_without_key() {
    let columns = vec![
        ColumnMeta::new("label", "", ColumnType::String).with_length(8),
        ColumnMeta::new("when", "", ColumnType::DateTime).with_length(19),
    ];
    let rows = vec![
        vec![cell("a"), cell("2020-01-02 03:04:05")],
        vec![cell("b"), cell("not a date")],
    ];
    let result = MemoryResultSet::new(columns, rows).unwrap();
    let mut layer = MySqlResultLayer::new("SELECT label", result, &mut MemoryCatalog::new()).unwrap();
    assert_eq!(layer.fid_column(), None);
    assert_eq!(layer.geometry_column(), None);
    assert_eq!(layer.spatial_ref(), None);

    let features: Vec<_> = layer.features().collect();
    assert_eq!(features[0].fid(), Some(0));
    assert_eq!(features[1].fid(), Some(1));
    let when = features[0].field("when").unwrap().unwrap().into_datetime().unwrap();
    assert_eq!(
        when.naive_utc(),
        NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    );
    assert_eq!(when.offset().local_minus_utc(), 0);
    assert_eq!(features[1].field("when").unwrap(), None);

    layer.reset_reading().unwrap();
    assert_eq!(layer.next_feature().unwrap().unwrap().fid(), Some(0));
}

#[test]
fn test_invalid_geometry_is_left_unset() {
    let columns = vec![ColumnMeta::new("shape", "roads", ColumnType::Geometry)];
    let result = MemoryResultSet::new(columns, vec![vec![Some(vec![0, 0, 0, 0, 1, 42])]]).unwrap();
    let mut layer = MySqlResultLayer::new("SELECT shape", result, &mut roads_catalog()).unwrap();
    let _nolog = crate::test_utils::SuppressGDALErrorLog::new();
    let feature = layer.next_feature().unwrap().unwrap();
    assert_eq!(feature.geometry(), None);
}
