//! Row-level derivations: slice, take, filter, select and concat.
//!
//! Each returns a new table of the same definition built through
//! [`Table::with_columns`]. Contiguous selections are served as zero-copy
//! slices; scattered ones copy through the `take` / `filter` kernels.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, UInt32Array};
use arrow::compute::{concat, filter, prep_null_mask_filter, take};
use strata_expr::{Literal, Validator, equality_mask};
use strata_result::{Error, Result};

use crate::conform::conform_array;
use crate::table::Table;

impl<E: Clone> Table<E> {
    /// Rows `offset..offset + len`, clamped to the table bounds.
    ///
    /// Buffers are shared with `self`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Self> {
        let offset = offset.min(self.num_rows());
        let len = len.min(self.num_rows() - offset);
        let columns = self.columns().iter().map(|c| c.slice(offset, len)).collect();
        self.with_columns_and_rows(columns, len)
    }

    /// One-row view of row `index`.
    pub fn row(&self, index: usize) -> Result<Self> {
        if index >= self.num_rows() {
            return Err(Error::InvalidArgumentError(format!(
                "row {index} out of bounds for {} rows",
                self.num_rows()
            )));
        }
        self.slice(index, 1)
    }

    /// Iterate one-row views in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = Self> + '_ {
        (0..self.num_rows()).filter_map(move |i| self.slice(i, 1).ok())
    }

    /// Rows at `indices`, in the given order. Indices may repeat.
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let mut positions = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= self.num_rows() {
                return Err(Error::InvalidArgumentError(format!(
                    "row {i} out of bounds for {} rows",
                    self.num_rows()
                )));
            }
            positions.push(u32::try_from(i).map_err(|_| {
                Error::InvalidArgumentError(format!("row {i} exceeds the u32 index range"))
            })?);
        }
        self.take_positions(&UInt32Array::from(positions))
    }

    pub(crate) fn take_positions(&self, positions: &UInt32Array) -> Result<Self> {
        if let Some((start, len)) = contiguous_run(positions) {
            return self.slice(start, len);
        }
        self.gather(positions)
    }

    /// Copy the rows at `positions` into new buffers.
    pub(crate) fn gather(&self, positions: &UInt32Array) -> Result<Self> {
        let columns = self
            .columns()
            .iter()
            .map(|c| take(c.as_ref(), positions, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.with_columns_and_rows(columns, positions.len())
    }

    /// Rows where `mask` is `true`; null mask slots drop the row.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Self> {
        if mask.len() != self.num_rows() {
            return Err(Error::RowCountMismatch {
                column: "<mask>".to_string(),
                expected: self.num_rows(),
                actual: mask.len(),
            });
        }
        let mask = if mask.null_count() > 0 {
            prep_null_mask_filter(mask)
        } else {
            mask.clone()
        };
        let selected = mask.true_count();
        if selected == 0 {
            return self.slice(0, 0);
        }
        let first = mask.values().set_indices().next().unwrap_or(0);
        if mask.values().slice(first, selected).count_set_bits() == selected {
            return self.slice(first, selected);
        }
        let columns = self
            .columns()
            .iter()
            .map(|c| filter(c.as_ref(), &mask))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.with_columns_and_rows(columns, selected)
    }

    /// Rows whose value at `path` satisfies `validator`. Null values are
    /// excluded.
    pub fn filter_by(&self, path: &str, validator: &Validator) -> Result<Self> {
        let values = self.column_path(path)?;
        self.filter(&validator.evaluate(&values)?)
    }

    /// Rows whose value at `path` equals `value`.
    ///
    /// [`Literal::Null`] selects the rows where the column is null. A value
    /// that matches nothing yields an empty table.
    pub fn select(&self, path: &str, value: impl Into<Literal>) -> Result<Self> {
        let values = self.column_path(path)?;
        self.filter(&equality_mask(&values, &value.into())?)
    }

    /// Append `tables` row-wise. Every schema must be structurally equal to
    /// the first; the result keeps the first table's attributes and
    /// extension.
    pub fn concat(tables: &[Self]) -> Result<Self> {
        let Some((first, rest)) = tables.split_first() else {
            return Err(Error::InvalidArgumentError(
                "concat needs at least one table".into(),
            ));
        };
        if rest.is_empty() {
            return Ok(first.clone());
        }
        for other in rest {
            if !first.is_schema_compatible(other) {
                return Err(Error::schema_mismatch(format!(
                    "cannot concatenate {} with {}",
                    first.schema(),
                    other.schema()
                )));
            }
        }
        let mut columns = Vec::with_capacity(first.num_columns());
        for (idx, column) in first.schema().columns().iter().enumerate() {
            let parts = tables
                .iter()
                .map(|t| conform_array(column.name(), Arc::clone(&t.columns()[idx]), column))
                .collect::<Result<Vec<ArrayRef>>>()?;
            let refs: Vec<&dyn Array> = parts.iter().map(|a| a.as_ref()).collect();
            columns.push(concat(&refs)?);
        }
        let num_rows = tables.iter().map(|t| t.num_rows()).sum();
        first.with_columns_and_rows(columns, num_rows)
    }
}

/// `(start, len)` when `positions` is an ascending run of consecutive rows.
fn contiguous_run(positions: &UInt32Array) -> Option<(usize, usize)> {
    if positions.null_count() > 0 {
        return None;
    }
    let values = positions.values();
    let Some(&start) = values.first() else {
        return Some((0, 0));
    };
    values
        .iter()
        .enumerate()
        .all(|(i, &p)| p as usize == start as usize + i)
        .then_some((start as usize, values.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::schema::{SchemaBuilder, TableSchema};
    use arrow::array::AsArray;
    use arrow::datatypes::Int64Type;
    use strata_expr::gt;

    fn schema() -> Arc<TableSchema> {
        SchemaBuilder::new("T")
            .column(Column::int64("n"))
            .column(Column::utf8("s").nullable(true))
            .build()
            .unwrap()
    }

    fn sample() -> Table {
        schema()
            .builder()
            .column("n", vec![0i64, 1, 2, 3, 4])
            .column("s", vec![Some("a"), None, Some("b"), Some("a"), None])
            .finish()
            .unwrap()
    }

    fn ns(table: &Table) -> Vec<i64> {
        table
            .column("n")
            .unwrap()
            .as_primitive::<Int64Type>()
            .values()
            .to_vec()
    }

    #[test]
    fn slice_is_clamped_and_shares_buffers() {
        let table = sample();
        let tail = table.slice(3, 100).unwrap();
        assert_eq!(ns(&tail), vec![3, 4]);
        assert_eq!(table.slice(9, 2).unwrap().num_rows(), 0);
        let a = table.column("n").unwrap().as_primitive::<Int64Type>();
        let b = tail.column("n").unwrap().as_primitive::<Int64Type>();
        assert!(std::ptr::eq(a.values()[3..].as_ptr(), b.values().as_ptr()));
    }

    #[test]
    fn take_reorders_and_repeats() {
        let table = sample();
        assert_eq!(ns(&table.take(&[4, 0, 0]).unwrap()), vec![4, 0, 0]);
        assert!(table.take(&[5]).is_err());
    }

    #[test]
    fn select_matches_values_and_nulls() {
        let table = sample();
        assert_eq!(ns(&table.select("s", "a").unwrap()), vec![0, 3]);
        assert_eq!(ns(&table.select("s", Literal::Null).unwrap()), vec![1, 4]);
        let none = table.select("s", "zzz").unwrap();
        assert_eq!(none.num_rows(), 0);
        assert_eq!(none.schema(), table.schema());
        assert!(matches!(
            table.select("nope", 1),
            Err(Error::UnknownColumn(_))
        ));
    }

    #[test]
    fn filter_by_validator() {
        let table = sample();
        assert_eq!(ns(&table.filter_by("n", &gt(2)).unwrap()), vec![3, 4]);
        let mask = BooleanArray::from(vec![true, false]);
        assert!(matches!(
            table.filter(&mask),
            Err(Error::RowCountMismatch { .. })
        ));
    }

    #[test]
    fn concat_appends_rows() {
        let table = sample();
        let joined = Table::concat(&[table.slice(0, 2).unwrap(), table.slice(4, 1).unwrap()])
            .unwrap();
        assert_eq!(ns(&joined), vec![0, 1, 4]);

        let other = SchemaBuilder::new("U")
            .column(Column::int64("n"))
            .build()
            .unwrap()
            .builder()
            .column("n", vec![1i64])
            .finish()
            .unwrap();
        assert!(matches!(
            Table::concat(&[table, other]),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn rows_iterate_as_views() {
        let rows: Vec<Vec<i64>> = sample().iter_rows().map(|r| ns(&r)).collect();
        assert_eq!(rows, vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn empty_table_operations_succeed() {
        let empty = Table::empty(&schema());
        assert_eq!(empty.select("s", "a").unwrap().num_rows(), 0);
        assert_eq!(empty.slice(0, 10).unwrap().num_rows(), 0);
        assert_eq!(empty.filter_by("n", &gt(0)).unwrap().num_rows(), 0);
        assert_eq!(empty.take(&[]).unwrap().num_rows(), 0);
    }

    #[test]
    fn select_on_a_column_without_nulls() {
        let table = sample();
        let hit = table.select("n", 3).unwrap();
        let n = hit.column("n").unwrap().as_primitive::<Int64Type>();
        assert_eq!(n.values().as_ref(), &[3]);
        assert_eq!(table.select("n", 1.5).unwrap().num_rows(), 0);
        assert_eq!(table.select("n", 2.0).unwrap().num_rows(), 1);
    }
}
