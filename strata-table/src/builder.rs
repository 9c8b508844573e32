//! Constructing tables from raw column data.
//!
//! ```
//! use std::sync::Arc;
//! use arrow::array::Float64Array;
//! use strata_expr::Literal;
//! use strata_table::{Column, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new("Reading")
//!     .column(Column::float64("value"))
//!     .column(Column::utf8("unit"))
//!     .build()
//!     .unwrap();
//!
//! let table = schema
//!     .builder()
//!     .column("value", Float64Array::from(vec![1.5, 2.5]))
//!     .column("unit", Literal::from("mm"))
//!     .finish()
//!     .unwrap();
//! assert_eq!(table.num_rows(), 2);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Date64Array, FixedSizeListArray,
    Float32Array, Float64Array, Int8Array, Int16Array, Int32Array, Int64Array,
    LargeBinaryArray, LargeStringArray, ListArray, StringArray, StructArray, UInt8Array,
    UInt16Array, UInt32Array, UInt64Array, new_null_array,
};
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;
use strata_expr::Literal;
use strata_result::{Error, Result};
use tracing::{debug, trace, warn};

use crate::attribute::{AttributeMap, AttributeValue, prefixed};
use crate::column::Column;
use crate::conform::{check_nullability, conform_array};
use crate::schema::TableSchema;
use crate::table::Table;

/// Data supplied for one column at construction.
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// One value per row.
    Array(ArrayRef),
    /// A single value repeated for every row.
    Scalar(Literal),
    /// A sub-table for a nested column.
    Table(Table),
}

impl From<ArrayRef> for ColumnData {
    fn from(array: ArrayRef) -> Self {
        ColumnData::Array(array)
    }
}

impl From<Literal> for ColumnData {
    fn from(value: Literal) -> Self {
        ColumnData::Scalar(value)
    }
}

impl<E: Clone> From<&Table<E>> for ColumnData {
    fn from(table: &Table<E>) -> Self {
        ColumnData::Table(table.strip_extension())
    }
}

impl<E: Clone> From<Table<E>> for ColumnData {
    fn from(table: Table<E>) -> Self {
        ColumnData::Table(table.strip_extension())
    }
}

macro_rules! impl_from_array {
    ($($array:ty),* $(,)?) => {
        $(
            impl From<$array> for ColumnData {
                fn from(array: $array) -> Self {
                    ColumnData::Array(Arc::new(array))
                }
            }
        )*
    };
}

impl_from_array!(
    BooleanArray,
    Int8Array,
    Int16Array,
    Int32Array,
    Int64Array,
    UInt8Array,
    UInt16Array,
    UInt32Array,
    UInt64Array,
    Float32Array,
    Float64Array,
    StringArray,
    LargeStringArray,
    BinaryArray,
    LargeBinaryArray,
    Date32Array,
    Date64Array,
    ListArray,
    FixedSizeListArray,
    StructArray,
);

macro_rules! impl_from_vec {
    ($($native:ty => $array:ty),* $(,)?) => {
        $(
            impl From<Vec<$native>> for ColumnData {
                fn from(values: Vec<$native>) -> Self {
                    ColumnData::Array(Arc::new(<$array>::from(values)))
                }
            }

            impl From<Vec<Option<$native>>> for ColumnData {
                fn from(values: Vec<Option<$native>>) -> Self {
                    ColumnData::Array(Arc::new(<$array>::from(values)))
                }
            }
        )*
    };
}

impl_from_vec!(
    bool => BooleanArray,
    i8 => Int8Array,
    i16 => Int16Array,
    i32 => Int32Array,
    i64 => Int64Array,
    u8 => UInt8Array,
    u16 => UInt16Array,
    u32 => UInt32Array,
    u64 => UInt64Array,
    f32 => Float32Array,
    f64 => Float64Array,
    String => StringArray,
    &str => StringArray,
);

/// Builder for one instance of a definition.
///
/// Columns are supplied by name. Row count comes from the first array or
/// sub-table in schema order, or from [`TableBuilder::num_rows`] when every
/// supplied value is a scalar. Columns left out are filled from their
/// declared default, else with nulls when nullable. [`TableBuilder::finish`]
/// checks everything and either returns a complete table or an error;
/// nothing partial is ever produced.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    schema: Arc<TableSchema>,
    columns: Vec<(String, ColumnData)>,
    attributes: Vec<(String, AttributeValue)>,
    num_rows: Option<usize>,
    validate: bool,
}

impl TableBuilder {
    pub fn new(schema: &Arc<TableSchema>) -> Self {
        Self {
            schema: Arc::clone(schema),
            columns: Vec::new(),
            attributes: Vec::new(),
            num_rows: None,
            validate: true,
        }
    }

    /// Seed a builder from a record batch: columns are matched by name,
    /// declared attributes are decoded from the batch metadata. Extra batch
    /// columns are ignored.
    pub fn from_record_batch(schema: &Arc<TableSchema>, batch: &RecordBatch) -> Result<Self> {
        let mut builder = Self::new(schema).num_rows(batch.num_rows());
        for field in batch.schema().fields() {
            if schema.index_of(field.name()).is_none() {
                warn!(
                    definition = schema.name(),
                    column = %field.name(),
                    "ignoring column not declared by the definition"
                );
            }
        }
        for column in schema.columns() {
            if let Some(array) = batch.column_by_name(column.name()) {
                builder = builder.column(column.name(), Arc::clone(array));
            }
        }
        builder.attributes_from_metadata(batch.schema().metadata())
    }

    /// Decode every declared attribute present in `metadata`.
    pub fn attributes_from_metadata(mut self, metadata: &HashMap<String, String>) -> Result<Self> {
        for (path, declared) in self.schema.attribute_paths() {
            if let Some(raw) = metadata.get(&path) {
                let value = AttributeValue::decode(&path, declared.kind(), raw)?;
                self.attributes.push((path, value));
            }
        }
        Ok(self)
    }

    pub fn column(mut self, name: impl Into<String>, data: impl Into<ColumnData>) -> Self {
        self.columns.push((name.into(), data.into()));
        self
    }

    /// Set an attribute. Nested attributes are addressed by path, e.g.
    /// `"inner.id"`.
    pub fn attribute(mut self, path: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.push((path.into(), value.into()));
        self
    }

    pub fn num_rows(mut self, num_rows: usize) -> Self {
        self.num_rows = Some(num_rows);
        self
    }

    /// Run the definition's validators on the result (default `true`).
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn finish(self) -> Result<Table> {
        let TableBuilder {
            schema,
            columns: supplied,
            attributes: explicit,
            num_rows,
            validate,
        } = self;

        let mut by_name: FxHashMap<String, ColumnData> = FxHashMap::default();
        for (name, data) in supplied {
            if schema.index_of(&name).is_none() {
                return Err(Error::UnknownColumn(name));
            }
            if by_name.contains_key(&name) {
                return Err(Error::InvalidArgumentError(format!(
                    "column '{name}' supplied more than once"
                )));
            }
            by_name.insert(name, data);
        }

        let num_rows = match num_rows {
            Some(n) => n,
            None => infer_num_rows(&schema, &by_name)?,
        };

        let mut attributes = AttributeMap::new();
        let mut columns = Vec::with_capacity(schema.num_columns());
        for column in schema.columns() {
            let name = column.name();
            let array = match by_name.remove(name) {
                Some(ColumnData::Array(array)) => {
                    if array.len() != num_rows {
                        return Err(Error::RowCountMismatch {
                            column: name.to_string(),
                            expected: num_rows,
                            actual: array.len(),
                        });
                    }
                    conform_array(name, array, column)?
                }
                Some(ColumnData::Scalar(value)) => broadcast(column, &value, num_rows)?,
                Some(ColumnData::Table(table)) => {
                    let array = embed(column, &table, num_rows)?;
                    attributes.extend(prefixed(name, table.attributes()));
                    array
                }
                None => match column.default_value() {
                    Some(value) => broadcast(column, value, num_rows)?,
                    None if column.is_nullable() => new_null_array(&column.data_type(), num_rows),
                    None => {
                        return Err(Error::Nullability {
                            column: name.to_string(),
                            null_count: num_rows,
                        });
                    }
                },
            };
            trace!(column = name, data_type = %array.data_type(), "conformed column");
            columns.push(array);
        }

        for (path, value) in explicit {
            let declared = schema
                .attribute(&path)
                .ok_or_else(|| Error::UnknownAttribute(path.clone()))?;
            let value = value.coerce(&path, declared.kind())?;
            attributes.insert(path, value);
        }

        check_nullability(&schema, &columns, "", None)?;

        let table = Table::from_parts(schema, columns, num_rows, attributes);
        if validate {
            table.validate()?;
        }
        debug!(
            definition = table.schema().name(),
            rows = num_rows,
            columns = table.num_columns(),
            "constructed table"
        );
        Ok(table)
    }
}

fn infer_num_rows(schema: &TableSchema, supplied: &FxHashMap<String, ColumnData>) -> Result<usize> {
    if schema.num_columns() == 0 {
        return Ok(0);
    }
    schema
        .columns()
        .iter()
        .find_map(|c| match supplied.get(c.name()) {
            Some(ColumnData::Array(array)) => Some(array.len()),
            Some(ColumnData::Table(table)) => Some(table.num_rows()),
            _ => None,
        })
        .ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "cannot infer the row count of '{}' without an array or sub-table; set num_rows",
                schema.name()
            ))
        })
}

fn broadcast(column: &Column, value: &Literal, num_rows: usize) -> Result<ArrayRef> {
    if column.nested().is_some() && !value.is_null() {
        return Err(Error::coercion(
            column.name(),
            column.logical_type(),
            format!("scalar {value} cannot fill a nested column"),
        ));
    }
    value.to_array_of(column.name(), &column.data_type(), num_rows)
}

fn embed(column: &Column, table: &Table, num_rows: usize) -> Result<ArrayRef> {
    let name = column.name();
    let Some(nested) = column.nested() else {
        return Err(Error::coercion(
            name,
            column.logical_type(),
            format!("got a sub-table of '{}'", table.schema().name()),
        ));
    };
    if **table.schema() != **nested {
        return Err(Error::schema_mismatch(format!(
            "column '{name}' expects {nested}, got {}",
            table.schema()
        )));
    }
    if table.num_rows() != num_rows {
        return Err(Error::RowCountMismatch {
            column: name.to_string(),
            expected: num_rows,
            actual: table.num_rows(),
        });
    }
    check_nullability(nested, table.columns(), name, None)?;
    conform_array(name, Arc::new(table.to_struct_array()?), column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::schema::SchemaBuilder;
    use arrow::array::AsArray;
    use arrow::datatypes::{DataType, Float64Type};
    use strata_expr::ge;

    fn pair() -> Arc<TableSchema> {
        SchemaBuilder::new("Pair")
            .column(Column::float64("x"))
            .column(Column::float64("y"))
            .build()
            .unwrap()
    }

    #[test]
    fn null_in_non_nullable_column_fails() {
        let err = pair()
            .builder()
            .column("x", vec![Some(1.0), None])
            .column("y", vec![1.0, 2.0])
            .finish()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Nullability { ref column, null_count: 1 } if column == "x"
        ));
    }

    #[test]
    fn disagreeing_lengths_fail() {
        let err = pair()
            .builder()
            .column("x", vec![1.0, 2.0])
            .column("y", vec![1.0])
            .finish()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RowCountMismatch { ref column, expected: 2, actual: 1 } if column == "y"
        ));
    }

    #[test]
    fn fractional_floats_do_not_fit_integer_columns() {
        let counts = SchemaBuilder::new("Counts")
            .column(Column::int64("n"))
            .build()
            .unwrap();
        let err = counts
            .builder()
            .column("n", vec![1.5f64, 2.0])
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { ref column, .. } if column == "n"));
        let err = counts.builder().column("n", Literal::from(0.5)).num_rows(2).finish();
        assert!(matches!(err, Err(Error::TypeCoercion { .. })));
        let whole = counts.builder().column("n", vec![1.0f64, 2.0]).finish().unwrap();
        assert_eq!(whole.column("n").unwrap().data_type(), &DataType::Int64);

        let bounded = SchemaBuilder::new("Bounded")
            .column(Column::int64("n").with_validator(ge(0.5)))
            .build()
            .unwrap();
        let err = bounded.builder().column("n", vec![0i64, 1]).finish().unwrap_err();
        let report = err.validation_report().unwrap();
        assert_eq!(report.for_column("n").next().unwrap().rows, vec![0]);
    }

    #[test]
    fn scalars_broadcast_and_coerce() {
        let table = pair()
            .builder()
            .column("x", vec![1.0, 2.0, 3.0])
            .column("y", Literal::from(4))
            .finish()
            .unwrap();
        let y = table.column("y").unwrap().as_primitive::<Float64Type>();
        assert_eq!(y.values().as_ref(), &[4.0, 4.0, 4.0]);
    }

    #[test]
    fn all_scalar_input_needs_explicit_rows() {
        let builder = pair()
            .builder()
            .column("x", Literal::from(1.0))
            .column("y", Literal::from(2.0));
        assert!(matches!(
            builder.clone().finish(),
            Err(Error::InvalidArgumentError(_))
        ));
        assert_eq!(builder.num_rows(2).finish().unwrap().num_rows(), 2);
    }

    #[test]
    fn absent_columns_use_defaults_then_nulls() {
        let schema = SchemaBuilder::new("D")
            .column(Column::int64("id"))
            .column(Column::utf8("tag").with_default("none"))
            .column(Column::float64("score").nullable(true))
            .build()
            .unwrap();
        let table = schema.builder().column("id", vec![1i64, 2]).finish().unwrap();
        let tags: Vec<_> = table.column("tag").unwrap().as_string::<i32>().iter().collect();
        assert_eq!(tags, vec![Some("none"), Some("none")]);
        assert_eq!(table.column("score").unwrap().null_count(), 2);

        let err = schema.builder().column("tag", vec!["a"]).finish().unwrap_err();
        assert!(matches!(err, Error::Nullability { ref column, .. } if column == "id"));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = pair()
            .builder()
            .column("x", vec![1.0])
            .column("y", vec![1.0])
            .column("z", vec![1.0])
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(ref n) if n == "z"));

        let err = pair()
            .builder()
            .column("x", vec![1.0])
            .column("y", vec![1.0])
            .attribute("nope", 1)
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAttribute(ref n) if n == "nope"));
    }

    #[test]
    fn uncoercible_strings_fail() {
        let err = pair()
            .builder()
            .column("x", vec!["1.0", "abc"])
            .column("y", vec![1.0, 2.0])
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::TypeCoercion { ref column, .. } if column == "x"));
    }

    #[test]
    fn validation_can_be_skipped() {
        let schema = SchemaBuilder::new("V")
            .column(Column::int64("n").with_validator(ge(0)))
            .build()
            .unwrap();
        let builder = schema.builder().column("n", vec![-1i64, 3]);
        assert!(matches!(
            builder.clone().finish(),
            Err(Error::Validation(_))
        ));
        let table = builder.validate(false).finish().unwrap();
        assert!(!table.is_valid());
    }

    #[test]
    fn sub_tables_must_match_and_bring_attributes() {
        let inner = SchemaBuilder::new("Inner")
            .column(Column::int64("v"))
            .attribute(Attribute::int("id"))
            .build()
            .unwrap();
        let outer = SchemaBuilder::new("Outer")
            .column(Column::utf8("label"))
            .column(inner.as_column("inner"))
            .build()
            .unwrap();
        let sub = inner
            .builder()
            .column("v", vec![1i64, 2])
            .attribute("id", 7)
            .finish()
            .unwrap();
        let table = outer
            .builder()
            .column("label", vec!["a", "b"])
            .column("inner", &sub)
            .finish()
            .unwrap();
        assert_eq!(table.attribute("inner.id").unwrap(), AttributeValue::Int(7));

        let err = outer
            .builder()
            .column("label", vec!["a", "b"])
            .column("inner", &table)
            .finish()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
    }
}
