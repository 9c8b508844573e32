//! The immutable table container.

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StructArray, new_empty_array};
use arrow::datatypes::Schema;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use strata_result::{Error, Result};

use crate::attribute::{AttributeMap, AttributeValue, encode_attributes, strip_prefix};
use crate::builder::TableBuilder;
use crate::conform::struct_child;
use crate::schema::{PATH_SEPARATOR, TableSchema, data_types_match};

/// Recomputes a table's extension value after its buffers were replaced.
///
/// Receives the previous extension value and the new column set.
pub type Rebuild<E> = Arc<dyn Fn(&E, &[ArrayRef]) -> E + Send + Sync>;

/// An immutable, schema-conforming set of columns.
///
/// Every column has exactly `num_rows` slots and the Arrow type its
/// descriptor declares; non-nullable columns hold no nulls. Columns are
/// shared (`Arc`) and never modified in place: every operation returns a new
/// table, sharing buffers with its source wherever the operation allows.
///
/// `E` is caller-defined state carried alongside the columns. Derivations
/// carry it over unchanged, or recompute it with the function installed by
/// [`Table::with_rebuild`]. All derivations funnel through
/// [`Table::with_columns`].
#[derive(Clone)]
pub struct Table<E = ()> {
    schema: Arc<TableSchema>,
    columns: Vec<ArrayRef>,
    num_rows: usize,
    attributes: AttributeMap,
    extension: E,
    rebuild: Option<Rebuild<E>>,
}

impl Table {
    /// Assemble a table from parts that are already known to conform.
    pub(crate) fn from_parts(
        schema: Arc<TableSchema>,
        columns: Vec<ArrayRef>,
        num_rows: usize,
        attributes: AttributeMap,
    ) -> Self {
        Self {
            schema,
            columns,
            num_rows,
            attributes,
            extension: (),
            rebuild: None,
        }
    }

    /// Zero-row table of `schema`.
    pub fn empty(schema: &Arc<TableSchema>) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|c| new_empty_array(&c.data_type()))
            .collect();
        Self::from_parts(Arc::clone(schema), columns, 0, AttributeMap::new())
    }

    /// Build from one array per column, in schema order, and validate.
    pub fn from_arrays(schema: &Arc<TableSchema>, arrays: Vec<ArrayRef>) -> Result<Self> {
        if arrays.len() != schema.num_columns() {
            return Err(Error::InvalidArgumentError(format!(
                "'{}' has {} columns, got {} arrays",
                schema.name(),
                schema.num_columns(),
                arrays.len()
            )));
        }
        let mut builder = TableBuilder::new(schema);
        for (column, array) in schema.columns().iter().zip(arrays) {
            builder = builder.column(column.name(), array);
        }
        builder.finish()
    }

    /// Build from a record batch whose columns are matched to the schema
    /// by name. Attributes are read back from the batch metadata.
    pub fn from_record_batch(schema: &Arc<TableSchema>, batch: &RecordBatch) -> Result<Self> {
        TableBuilder::from_record_batch(schema, batch)?.finish()
    }
}

impl<E> Table<E> {
    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    /// The stored array for top-level column `name`; no copy is made.
    pub fn column(&self, name: &str) -> Result<&ArrayRef> {
        let (idx, _) = self.schema.require(name)?;
        Ok(&self.columns[idx])
    }

    /// The array at a dotted path such as `"pair.x"`.
    ///
    /// Rows where an enclosing struct is null read as null. When no
    /// enclosing struct has nulls the child array is returned without
    /// copying.
    pub fn column_path(&self, path: &str) -> Result<ArrayRef> {
        let resolved = self.schema.resolve_path(path)?;
        let mut array = Arc::clone(&self.columns[resolved[0].0]);
        for &(idx, _) in &resolved[1..] {
            array = struct_child(array.as_struct(), idx)?;
        }
        Ok(array)
    }

    pub fn extension(&self) -> &E {
        &self.extension
    }

    /// Set attribute values, keyed by path (`"inner.id"` for nested ones).
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Value of the attribute at `path`: the instance value if set, else
    /// the declared default.
    pub fn attribute(&self, path: &str) -> Result<AttributeValue> {
        if let Some(value) = self.attributes.get(path) {
            return Ok(value.clone());
        }
        self.schema
            .attribute(path)
            .and_then(|a| a.default_value())
            .cloned()
            .ok_or_else(|| Error::UnknownAttribute(path.to_string()))
    }

    /// Columns packed into a single struct array (buffers shared).
    pub fn to_struct_array(&self) -> Result<StructArray> {
        Ok(StructArray::try_new(
            self.schema.arrow_fields().clone(),
            self.columns.clone(),
            None,
        )?)
    }

    /// Columns as a record batch; attributes travel in the schema metadata.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Schema::new_with_metadata(
            self.schema.arrow_fields().clone(),
            encode_attributes(&self.attributes),
        );
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(schema),
            self.columns.clone(),
            &options,
        )?)
    }

    /// The same data without extension state.
    pub fn strip_extension(&self) -> Table {
        Table::from_parts(
            Arc::clone(&self.schema),
            self.columns.clone(),
            self.num_rows,
            self.attributes.clone(),
        )
    }

    /// Zero-copy view of a nested column as a table of its own definition.
    ///
    /// Accepts dotted paths. The sub-table carries the attributes stored
    /// under the column's prefix. Rows where an enclosing struct is null
    /// read as null in every column of the sub-table; buffers are copied
    /// only for those columns.
    pub fn subtable(&self, path: &str) -> Result<Table> {
        let mut current = self.strip_extension();
        for segment in path.split(PATH_SEPARATOR) {
            current = current.nested_table(segment, path)?;
        }
        Ok(current)
    }

    fn nested_table(&self, name: &str, path: &str) -> Result<Table> {
        let (idx, column) = self
            .schema
            .require(name)
            .map_err(|_| Error::UnknownColumn(path.to_string()))?;
        let nested = column.nested().ok_or_else(|| {
            Error::InvalidArgumentError(format!("column '{path}' is not a nested table"))
        })?;
        let values = self.columns[idx].as_struct();
        let columns = (0..values.num_columns())
            .map(|child| struct_child(values, child))
            .collect::<Result<Vec<_>>>()?;
        Ok(Table::from_parts(
            Arc::clone(nested),
            columns,
            self.num_rows,
            strip_prefix(name, &self.attributes),
        ))
    }

    /// `true` if `other` has a structurally equal schema.
    pub fn is_schema_compatible<F>(&self, other: &Table<F>) -> bool {
        Arc::ptr_eq(&self.schema, &other.schema) || *self.schema == *other.schema
    }
}

impl<E: Clone> Table<E> {
    /// Attach extension state, replacing any previous value and rebuild
    /// function.
    pub fn with_extension<F>(self, extension: F) -> Table<F> {
        Table {
            schema: self.schema,
            columns: self.columns,
            num_rows: self.num_rows,
            attributes: self.attributes,
            extension,
            rebuild: None,
        }
    }

    /// Install the function used to recompute the extension value whenever
    /// a derivation replaces the column set.
    pub fn with_rebuild<F>(mut self, rebuild: F) -> Self
    where
        F: Fn(&E, &[ArrayRef]) -> E + Send + Sync + 'static,
    {
        self.rebuild = Some(Arc::new(rebuild));
        self
    }

    /// Replace the column set, keeping schema, attributes and extension.
    ///
    /// This is the single point through which every derivation (slice,
    /// filter, take, sort, concat) produces its result. The columns must
    /// already conform: one per schema column, equal lengths, matching
    /// types. Nullability is not re-checked; derivations only rearrange
    /// existing rows.
    pub fn with_columns(&self, columns: Vec<ArrayRef>) -> Result<Self> {
        let num_rows = columns.first().map_or(self.num_rows, |c| c.len());
        self.with_columns_and_rows(columns, num_rows)
    }

    pub(crate) fn with_columns_and_rows(
        &self,
        columns: Vec<ArrayRef>,
        num_rows: usize,
    ) -> Result<Self> {
        if columns.len() != self.schema.num_columns() {
            return Err(Error::InvalidArgumentError(format!(
                "'{}' has {} columns, got {}",
                self.schema.name(),
                self.schema.num_columns(),
                columns.len()
            )));
        }
        for (column, array) in self.schema.columns().iter().zip(&columns) {
            if array.len() != num_rows {
                return Err(Error::RowCountMismatch {
                    column: column.name().to_string(),
                    expected: num_rows,
                    actual: array.len(),
                });
            }
            if !data_types_match(&column.data_type(), array.data_type()) {
                return Err(Error::schema_mismatch(format!(
                    "column '{}' expected {}, found {}",
                    column.name(),
                    column.data_type(),
                    array.data_type()
                )));
            }
        }
        let extension = match &self.rebuild {
            Some(rebuild) => rebuild(&self.extension, &columns),
            None => self.extension.clone(),
        };
        Ok(Self {
            schema: Arc::clone(&self.schema),
            columns,
            num_rows,
            attributes: self.attributes.clone(),
            extension,
            rebuild: self.rebuild.clone(),
        })
    }

    /// A copy with attribute `path` set; all column buffers are shared.
    pub fn with_attribute(&self, path: &str, value: impl Into<AttributeValue>) -> Result<Self> {
        let declared = self
            .schema
            .attribute(path)
            .ok_or_else(|| Error::UnknownAttribute(path.to_string()))?;
        let value = value.into().coerce(path, declared.kind())?;
        let mut out = self.clone();
        out.attributes.insert(path.to_string(), value);
        Ok(out)
    }
}

/// Tables are equal when their schemas are structurally equal and they hold
/// the same attributes and values. Extension state is not compared.
impl<E> PartialEq for Table<E> {
    fn eq(&self, other: &Self) -> bool {
        self.is_schema_compatible(other)
            && self.num_rows == other.num_rows
            && self.attributes == other.attributes
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.as_ref() == b.as_ref())
    }
}

impl<E: fmt::Debug> fmt::Debug for Table<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("schema", &self.schema.to_string())
            .field("num_rows", &self.num_rows)
            .field("attributes", &self.attributes)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl<E> fmt::Display for Table<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(size={})", self.schema.name(), self.num_rows)
    }
}
