//! Point-lookup indexes over a single column.
//!
//! An index is built with one scan of the column and maps each distinct
//! non-null key to the ascending positions of the rows holding it. It keeps
//! a buffer-sharing snapshot of the table it was built from and is never
//! updated: tables are immutable, so an index built against a table stays
//! correct for that table. Derived tables need their own index.
//!
//! ```
//! use strata_table::{Column, SchemaBuilder, StringIndex};
//!
//! let schema = SchemaBuilder::new("People")
//!     .column(Column::utf8("name"))
//!     .column(Column::int64("age"))
//!     .build()
//!     .unwrap();
//! let people = schema
//!     .builder()
//!     .column("name", vec!["ann", "bob", "ann"])
//!     .column("age", vec![31i64, 40, 7])
//!     .finish()
//!     .unwrap();
//!
//! let by_name = StringIndex::new(&people, "name").unwrap();
//! assert_eq!(by_name.lookup("ann").unwrap().unwrap().num_rows(), 2);
//! assert!(by_name.lookup("eve").unwrap().is_none());
//! ```

use std::borrow::Borrow;
use std::hash::Hash;

use arrow::array::{Array, ArrayRef, AsArray, GenericStringArray, OffsetSizeTrait, UInt32Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use rustc_hash::FxHashMap;
use strata_result::{Error, Result};
use tracing::debug;

use crate::table::Table;

/// Row positions per key.
pub type Positions<K> = FxHashMap<K, Vec<u32>>;

/// Key types an index can be built over.
pub trait IndexKey: Hash + Eq + Clone + Send + Sync + 'static {
    /// Scan `values` once, grouping row positions by key. Null slots are
    /// skipped.
    fn positions(column: &str, values: &ArrayRef) -> Result<Positions<Self>>;
}

impl IndexKey for String {
    fn positions(column: &str, values: &ArrayRef) -> Result<Positions<Self>> {
        match values.data_type() {
            DataType::Utf8 => Ok(string_positions(values.as_string::<i32>())),
            DataType::LargeUtf8 => Ok(string_positions(values.as_string::<i64>())),
            other => Err(Error::coercion(
                column,
                "Utf8 or LargeUtf8",
                format!("cannot index {other} by string key"),
            )),
        }
    }
}

fn string_positions<O: OffsetSizeTrait>(values: &GenericStringArray<O>) -> Positions<String> {
    let mut map: Positions<String> = FxHashMap::default();
    for (row, value) in values.iter().enumerate() {
        let Some(value) = value else { continue };
        match map.get_mut(value) {
            Some(rows) => rows.push(row as u32),
            None => {
                map.insert(value.to_string(), vec![row as u32]);
            }
        }
    }
    map
}

impl IndexKey for i64 {
    fn positions(column: &str, values: &ArrayRef) -> Result<Positions<Self>> {
        let widened = match values.data_type() {
            DataType::Int64 => values.clone(),
            DataType::Int8 | DataType::Int16 | DataType::Int32 => cast(values, &DataType::Int64)?,
            other => {
                return Err(Error::coercion(
                    column,
                    "a signed integer type",
                    format!("cannot index {other} by integer key"),
                ));
            }
        };
        let mut map: Positions<i64> = FxHashMap::default();
        for (row, value) in widened.as_primitive::<Int64Type>().iter().enumerate() {
            if let Some(value) = value {
                map.entry(value).or_default().push(row as u32);
            }
        }
        Ok(map)
    }
}

/// Hash index from the values of one column to the rows holding them.
#[derive(Clone)]
pub struct ColumnIndex<K: IndexKey, E = ()> {
    source: Table<E>,
    column: String,
    positions: Positions<K>,
}

/// Index over a `Utf8` / `LargeUtf8` column.
pub type StringIndex<E = ()> = ColumnIndex<String, E>;

/// Index over a signed integer column.
pub type Int64Index<E = ()> = ColumnIndex<i64, E>;

impl<K: IndexKey, E: Clone> ColumnIndex<K, E> {
    /// Index `column` (a dotted path for nested columns) of `table`.
    pub fn new(table: &Table<E>, column: &str) -> Result<Self> {
        if u32::try_from(table.num_rows()).is_err() {
            return Err(Error::InvalidArgumentError(format!(
                "cannot index {} rows; the limit is {}",
                table.num_rows(),
                u32::MAX
            )));
        }
        let values = table.column_path(column)?;
        let positions = K::positions(column, &values)?;
        debug!(
            definition = table.schema().name(),
            column,
            rows = table.num_rows(),
            keys = positions.len(),
            "built column index"
        );
        Ok(Self {
            source: table.clone(),
            column: column.to_string(),
            positions,
        })
    }

    /// Rows whose key equals `key`, in original order, or `None` if the key
    /// does not occur. A run of adjacent rows comes back as a zero-copy
    /// slice of the source.
    pub fn lookup<Q>(&self, key: &Q) -> Result<Option<Table<E>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(rows) = self.positions.get(key) else {
            return Ok(None);
        };
        let positions = UInt32Array::from(rows.clone());
        self.source.take_positions(&positions).map(Some)
    }

    /// Ascending row positions for `key`.
    pub fn rows_for<Q>(&self, key: &Q) -> Option<&[u32]>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.get(key).map(Vec::as_slice)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.positions.contains_key(key)
    }

    /// Distinct keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.positions.keys()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Path of the indexed column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The table the index was built against.
    pub fn source(&self) -> &Table<E> {
        &self.source
    }
}

impl<K: IndexKey, E> std::fmt::Debug for ColumnIndex<K, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnIndex")
            .field("source", &self.source.to_string())
            .field("column", &self.column)
            .field("keys", &self.positions.len())
            .finish()
    }
}
