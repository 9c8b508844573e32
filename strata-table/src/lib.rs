//! Schema-enforced, immutable tables over Arrow arrays.
//!
//! A table *definition* ([`TableSchema`]) is declared once with
//! [`SchemaBuilder`]: named, typed columns ([`Column`]), optionally nested
//! sub-tables, and scalar [`Attribute`]s. Instances ([`Table`]) are built
//! with a [`TableBuilder`], which coerces, null-checks and validates the
//! supplied data before anything is returned.
//!
//! Tables never change after construction. Column access hands out the
//! stored `ArrayRef`; slicing, filtering, sorting and lookups produce new
//! tables that share buffers with their source wherever the operation
//! allows.
//!
//! # Modules
//!
//! - [`types`]: logical column types and their Arrow mapping
//! - [`column`], [`attribute`]: declaration records
//! - [`schema`]: definitions, structural equality, path resolution
//! - [`builder`]: construction from raw columns
//! - [`table`]: the container, attributes and conversions
//! - [`index`]: hash indexes for point lookups

pub mod attribute;
pub mod builder;
pub mod column;
mod conform;
mod flatten;
pub mod index;
mod ops;
pub mod schema;
mod sort;
pub mod table;
pub mod types;
mod validate;

pub use attribute::{Attribute, AttributeKind, AttributeMap, AttributeValue};
pub use builder::{ColumnData, TableBuilder};
pub use column::Column;
pub use index::{ColumnIndex, IndexKey, Int64Index, StringIndex};
pub use schema::{
    PATH_SEPARATOR, SchemaBuilder, TableSchema, data_types_match, ensure_fields_match,
};
pub use sort::SortKey;
pub use table::{Rebuild, Table};
pub use types::{LogicalType, PrimitiveType};
