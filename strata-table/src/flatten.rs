//! Flattened views: nested columns exploded into dotted top-level columns.
//!
//! Row-oriented formats such as CSV cannot hold struct columns, so a table
//! of
//!
//! ```text
//! Outer(label: Utf8, pair: Table<Pair(x: Float64, y: Float64)>)
//! ```
//!
//! flattens to the columns `label`, `pair.x`, `pair.y`. The reverse
//! direction rebuilds the structs from the dotted names. A null struct
//! flattens to nulls in every child column; on the way back, a row whose
//! children are all null becomes a null struct when the column is nullable.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StructArray, new_null_array};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use strata_result::Result;

use crate::attribute::encode_attributes;
use crate::builder::TableBuilder;
use crate::column::Column;
use crate::conform::{check_nullability, child_path, conform_array, struct_child};
use crate::schema::TableSchema;
use crate::table::Table;

impl<E> Table<E> {
    /// Record batch with every nested column replaced by its leaf columns,
    /// named by dotted path. Attributes travel in the schema metadata.
    pub fn flattened(&self) -> Result<RecordBatch> {
        let mut fields = Vec::new();
        let mut arrays = Vec::new();
        flatten_into(
            "",
            self.schema(),
            self.columns(),
            false,
            &mut fields,
            &mut arrays,
        )?;
        let schema = Schema::new_with_metadata(fields, encode_attributes(self.attributes()));
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(schema),
            arrays,
            &options,
        )?)
    }
}

impl TableSchema {
    /// Leaf fields of the flattened layout, in column order.
    pub fn flattened_fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        leaf_fields("", self, false, &mut fields);
        fields
    }
}

fn leaf_fields(prefix: &str, schema: &TableSchema, parent_nullable: bool, out: &mut Vec<Field>) {
    for column in schema.columns() {
        let path = child_path(prefix, column.name());
        let nullable = parent_nullable || column.is_nullable();
        match column.nested() {
            None => out.push(Field::new(path, column.data_type(), nullable)),
            Some(nested) => leaf_fields(&path, nested, nullable, out),
        }
    }
}

impl Table {
    /// Rebuild a table from a flattened record batch and validate it.
    pub fn from_flattened(schema: &Arc<TableSchema>, batch: &RecordBatch) -> Result<Self> {
        TableBuilder::from_flattened(schema, batch)?.finish()
    }
}

impl TableBuilder {
    /// Seed a builder from a flattened record batch. Nested columns whose
    /// leaves are all missing are treated as not supplied.
    pub fn from_flattened(schema: &Arc<TableSchema>, batch: &RecordBatch) -> Result<Self> {
        let mut builder = Self::new(schema).num_rows(batch.num_rows());
        for column in schema.columns() {
            if let Some(array) = unflatten("", column, batch)? {
                builder = builder.column(column.name(), array);
            }
        }
        builder.attributes_from_metadata(batch.schema().metadata())
    }
}

/// Leaf fields and arrays under `prefix`. A leaf is nullable when it or any
/// enclosing column is.
fn flatten_into(
    prefix: &str,
    schema: &TableSchema,
    columns: &[ArrayRef],
    parent_nullable: bool,
    fields: &mut Vec<Field>,
    arrays: &mut Vec<ArrayRef>,
) -> Result<()> {
    for (column, array) in schema.columns().iter().zip(columns) {
        let path = child_path(prefix, column.name());
        let nullable = parent_nullable || column.is_nullable();
        match column.nested() {
            None => {
                fields.push(Field::new(path, column.data_type(), nullable));
                arrays.push(Arc::clone(array));
            }
            Some(nested) => {
                let values = array.as_struct();
                let children = (0..nested.num_columns())
                    .map(|idx| struct_child(values, idx))
                    .collect::<Result<Vec<_>>>()?;
                flatten_into(&path, nested, &children, nullable, fields, arrays)?;
            }
        }
    }
    Ok(())
}

/// The array for `column` reassembled from the dotted columns of `batch`,
/// or `None` if none of its leaves are present.
pub(crate) fn unflatten(
    prefix: &str,
    column: &Column,
    batch: &RecordBatch,
) -> Result<Option<ArrayRef>> {
    let path = child_path(prefix, column.name());
    let Some(nested) = column.nested() else {
        return batch
            .column_by_name(&path)
            .map(|array| conform_array(&path, Arc::clone(array), column))
            .transpose();
    };
    let mut children = Vec::with_capacity(nested.num_columns());
    let mut present = false;
    for child in nested.columns() {
        match unflatten(&path, child, batch)? {
            Some(array) => {
                present = true;
                children.push(array);
            }
            None => children.push(new_null_array(&child.data_type(), batch.num_rows())),
        }
    }
    if !present {
        return Ok(None);
    }
    let nulls = if column.is_nullable() {
        rows_with_any_value(&children)
    } else {
        None
    };
    check_nullability(nested, &children, &path, nulls.as_ref())?;
    let array = StructArray::try_new(nested.arrow_fields().clone(), children, nulls)?;
    Ok(Some(Arc::new(array)))
}

/// Validity of rows where at least one child is non-null; `None` when every
/// row has a value.
fn rows_with_any_value(children: &[ArrayRef]) -> Option<NullBuffer> {
    let mut valid = None;
    for child in children {
        let nulls = child.logical_nulls()?;
        valid = Some(match valid {
            None => nulls.inner().clone(),
            Some(acc) => &acc | nulls.inner(),
        });
    }
    let valid = NullBuffer::new(valid?);
    (valid.null_count() > 0).then_some(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeValue};
    use crate::schema::SchemaBuilder;

    fn schemas() -> (Arc<TableSchema>, Arc<TableSchema>) {
        let pair = SchemaBuilder::new("Pair")
            .column(Column::float64("x"))
            .column(Column::float64("y"))
            .attribute(Attribute::int("id"))
            .build()
            .unwrap();
        let outer = SchemaBuilder::new("Outer")
            .column(Column::utf8("label"))
            .column(pair.as_column("pair").nullable(true))
            .build()
            .unwrap();
        (pair, outer)
    }

    #[test]
    fn nested_columns_flatten_to_dotted_names() {
        let (pair, outer) = schemas();
        let inner = pair
            .builder()
            .column("x", vec![1.0, 2.0])
            .column("y", vec![3.0, 4.0])
            .attribute("id", 9)
            .finish()
            .unwrap();
        let table = outer
            .builder()
            .column("label", vec!["a", "b"])
            .column("pair", &inner)
            .finish()
            .unwrap();
        let flat = table.flattened().unwrap();
        let names: Vec<&str> = flat
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        assert_eq!(names, vec!["label", "pair.x", "pair.y"]);
        assert!(flat.schema_ref().field(1).is_nullable());
        assert_eq!(
            outer.flattened_fields(),
            flat.schema_ref()
                .fields()
                .iter()
                .map(|f| f.as_ref().clone())
                .collect::<Vec<_>>()
        );
        assert_eq!(
            flat.schema_ref().metadata().get("pair.id").map(String::as_str),
            Some("9")
        );

        let back = Table::from_flattened(&outer, &flat).unwrap();
        assert_eq!(back, table);
        assert_eq!(back.attribute("pair.id").unwrap(), AttributeValue::Int(9));
    }

    #[test]
    fn null_structs_survive_the_round_trip() {
        let (pair, outer) = schemas();
        let values = StructArray::new(
            pair.arrow_fields().clone(),
            vec![
                Arc::new(arrow::array::Float64Array::from(vec![1.0, 0.0])) as ArrayRef,
                Arc::new(arrow::array::Float64Array::from(vec![2.0, 0.0])) as ArrayRef,
            ],
            Some(NullBuffer::from(vec![true, false])),
        );
        let table = outer
            .builder()
            .column("label", vec!["a", "b"])
            .column("pair", values)
            .finish()
            .unwrap();
        let flat = table.flattened().unwrap();
        assert_eq!(flat.column(1).null_count(), 1);
        let back = Table::from_flattened(&outer, &flat).unwrap();
        assert!(back.column("pair").unwrap().is_null(1));
        assert!(back.column("pair").unwrap().is_valid(0));
    }
}
