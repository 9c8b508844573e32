//! Bringing raw arrays into the shape a definition declares.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StructArray};
use arrow::buffer::NullBuffer;
use arrow::compute::is_null;
use arrow::compute::kernels::nullif::nullif;
use strata_expr::cast_strict;
use strata_result::{Error, Result};

use crate::column::Column;
use crate::schema::{PATH_SEPARATOR, TableSchema, ensure_fields_match};

pub(crate) fn child_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}{PATH_SEPARATOR}{name}")
    }
}

/// Coerce `array` to the Arrow type of `column`.
///
/// Arrays already of the right type are returned as-is (same allocation).
/// Struct arrays for nested columns must match the nested definition
/// structurally; everything else goes through a strict cast.
pub(crate) fn conform_array(path: &str, array: ArrayRef, column: &Column) -> Result<ArrayRef> {
    let expected = column.data_type();
    if array.data_type() == &expected {
        return Ok(array);
    }
    if let Some(nested) = column.nested() {
        let Some(values) = array.as_struct_opt() else {
            return Err(Error::coercion(
                path,
                column.logical_type(),
                format!("expected a struct array, found {}", array.data_type()),
            ));
        };
        ensure_fields_match(nested.arrow_fields(), values.fields())
            .map_err(|e| Error::schema_mismatch(format!("column '{path}': {e}")))?;
        let children = nested
            .columns()
            .iter()
            .zip(values.columns())
            .map(|(child, array)| {
                conform_array(&child_path(path, child.name()), Arc::clone(array), child)
            })
            .collect::<Result<Vec<_>>>()?;
        check_nullability(nested, &children, path, values.nulls())?;
        let rebuilt = StructArray::try_new(
            nested.arrow_fields().clone(),
            children,
            values.nulls().cloned(),
        )?;
        return Ok(Arc::new(rebuilt));
    }
    cast_strict(path, &array, &expected).map_err(|e| match e {
        Error::TypeCoercion { reason, .. } => Error::coercion(path, column.logical_type(), reason),
        other => other,
    })
}

/// Fail if a non-nullable column holds nulls at rows where every enclosing
/// struct is valid.
pub(crate) fn check_nullability(
    schema: &TableSchema,
    columns: &[ArrayRef],
    prefix: &str,
    parent: Option<&NullBuffer>,
) -> Result<()> {
    for (column, array) in schema.columns().iter().zip(columns) {
        let path = child_path(prefix, column.name());
        if !column.is_nullable() {
            let null_count = match (parent, array.logical_nulls()) {
                (_, None) => 0,
                (None, Some(nulls)) => nulls.null_count(),
                (Some(parent), Some(nulls)) => {
                    (parent.inner() & &!nulls.inner()).count_set_bits()
                }
            };
            if null_count > 0 {
                return Err(Error::Nullability {
                    column: path,
                    null_count,
                });
            }
        }
        if let Some(nested) = column.nested() {
            let values = array.as_struct();
            let merged = NullBuffer::union(parent, values.nulls());
            check_nullability(nested, values.columns(), &path, merged.as_ref())?;
        }
    }
    Ok(())
}

/// Child `index` of a struct column, null wherever the struct itself is
/// null.
pub(crate) fn struct_child(values: &StructArray, index: usize) -> Result<ArrayRef> {
    let child = Arc::clone(values.column(index));
    if values.null_count() == 0 {
        return Ok(child);
    }
    Ok(nullif(&child, &is_null(values)?)?)
}
