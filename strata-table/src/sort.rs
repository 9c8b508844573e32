//! Multi-key stable sorting.

use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray, UInt32Array};
use arrow::compute::{SortColumn, SortOptions, lexsort_to_indices};
use strata_result::{Error, Result};
use tracing::trace;

use crate::column::Column;
use crate::conform::{child_path, struct_child};
use crate::table::Table;

/// One sort key: a column path plus direction and null placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
    pub nulls_first: bool,
}

impl SortKey {
    /// Ascending, nulls last.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            nulls_first: false,
        }
    }

    /// Descending, nulls last.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
            nulls_first: false,
        }
    }

    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = nulls_first;
        self
    }

    fn options(&self) -> SortOptions {
        SortOptions {
            descending: self.descending,
            nulls_first: self.nulls_first,
        }
    }
}

impl<E: Clone> Table<E> {
    /// Reorder rows by `keys`, most significant first.
    ///
    /// The sort is stable: rows that tie on every key keep their original
    /// relative order. A key naming a nested column sorts by that column's
    /// children in declared order. List columns have no ordering and fail
    /// with [`Error::NotSortable`].
    ///
    /// The result always owns new buffers, even when the input is already
    /// in order.
    pub fn sort_by(&self, keys: &[SortKey]) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::InvalidArgumentError(
                "sort_by needs at least one key".into(),
            ));
        }
        let num_rows = u32::try_from(self.num_rows()).map_err(|_| {
            Error::InvalidArgumentError(format!(
                "cannot sort {} rows; the limit is {}",
                self.num_rows(),
                u32::MAX
            ))
        })?;

        let mut sort_columns = Vec::new();
        for key in keys {
            let resolved = self.schema().resolve_path(&key.column)?;
            let Some(&(_, column)) = resolved.last() else {
                return Err(Error::UnknownColumn(key.column.clone()));
            };
            if !column.logical_type().is_orderable() {
                return Err(Error::NotSortable {
                    column: key.column.clone(),
                    data_type: column.logical_type().to_string(),
                });
            }
            let values = self.column_path(&key.column)?;
            expand_key(&key.column, column, values, key.options(), &mut sort_columns)?;
        }
        // Row position as the last key keeps ties in input order.
        sort_columns.push(SortColumn {
            values: Arc::new(UInt32Array::from_iter_values(0..num_rows)),
            options: None,
        });
        trace!(
            definition = self.schema().name(),
            keys = keys.len(),
            sort_columns = sort_columns.len(),
            "sorting table"
        );
        let positions = lexsort_to_indices(&sort_columns, None)?;
        self.gather(&positions)
    }
}

/// Push the sort columns for one key, expanding struct columns into their
/// children. Children inherit the parent's null slots.
fn expand_key(
    path: &str,
    column: &Column,
    values: ArrayRef,
    options: SortOptions,
    out: &mut Vec<SortColumn>,
) -> Result<()> {
    match column.nested() {
        None => {
            out.push(SortColumn {
                values,
                options: Some(options),
            });
        }
        Some(nested) => {
            let parent = values.as_struct();
            for (idx, child) in nested.columns().iter().enumerate() {
                let child_values = struct_child(parent, idx)?;
                expand_key(
                    &child_path(path, child.name()),
                    child,
                    child_values,
                    options,
                    out,
                )?;
            }
        }
    }
    Ok(())
}
