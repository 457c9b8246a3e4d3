//! Vector data
//!
//! Layers are read through [`LayerAccess`]. Geometries are decoded into
//! [`geo_types`] values.
//!
//! ## Reading a MySQL result
//!
//! ```
//! use gdal_frmts::vector::mysql::{
//!     ColumnMeta, ColumnType, MemoryCatalog, MemoryResultSet, MySqlResultLayer,
//! };
//! use gdal_frmts::vector::LayerAccess;
//!
//! let columns = vec![ColumnMeta::new("name", "towns", ColumnType::VarString).with_length(32)];
//! let rows = vec![vec![Some(b"Lund".to_vec())]];
//! let result = MemoryResultSet::new(columns, rows).unwrap();
//! let mut layer = MySqlResultLayer::new("SELECT name FROM towns", result, &mut MemoryCatalog::new()).unwrap();
//! for feature in layer.features() {
//!     let name = feature.field("name").unwrap();
//!     println!("{}", name.unwrap().into_string().unwrap());
//! }
//! ```

pub use crate::vector::defn::{Defn, FieldDefn, FieldType, GeometryType};
pub use crate::vector::feature::{Feature, FieldValue};
pub use crate::vector::layer::{FeatureIterator, LayerAccess};

mod defn;
mod feature;
mod layer;
pub mod mysql;
pub mod wkb;
