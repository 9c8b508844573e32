//! strata: schema-enforced, immutable typed tables over Apache Arrow.
//!
//! This crate is the entrypoint for the strata toolkit. It re-exports the
//! table model, the validator algebra and the file adapters from the
//! underlying `strata-*` crates.
//!
//! # Quick Start
//!
//! Declare a definition once, then build validated instances of it:
//!
//! ```rust
//! use strata::{Column, SchemaBuilder, SortKey, ge};
//!
//! let readings = SchemaBuilder::new("Readings")
//!     .column(Column::utf8("sensor"))
//!     .column(Column::float64("value").with_validator(ge(0.0)))
//!     .build()
//!     .unwrap();
//!
//! let table = readings
//!     .builder()
//!     .column("sensor", vec!["a", "b", "a"])
//!     .column("value", vec![1.5, 0.25, 3.0])
//!     .finish()
//!     .unwrap();
//!
//! let sorted = table.sort_by(&[SortKey::desc("value")]).unwrap();
//! assert_eq!(sorted.select("sensor", "a").unwrap().num_rows(), 2);
//! ```
//!
//! # Architecture
//!
//! - **Values and rules** (`strata-expr`): literals and validators.
//! - **Tables** (`strata-table`): definitions, construction, derivations
//!   and indexes.
//! - **Files** (`strata-io`): Parquet, Arrow IPC and CSV.
//! - **Errors** (`strata-result`): the shared error type.

pub use strata_expr::{
    Literal, Operator, Validator, and_, between, eq, ge, gt, is_in, le, lt, ne, not_, or_, range,
};
pub use strata_result::{Error, Result, RuleFailure, ValidationReport};
pub use strata_table::{
    Attribute, AttributeKind, AttributeValue, Column, ColumnData, ColumnIndex, Int64Index,
    LogicalType, PrimitiveType, Rebuild, SchemaBuilder, SortKey, StringIndex, Table,
    TableBuilder, TableSchema,
};

pub mod io {
    //! Reading and writing tables.
    //!
    //! See the `strata-io` crate for format details.

    pub use strata_io::*;
}
