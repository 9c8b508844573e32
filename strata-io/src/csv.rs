//! Flattened CSV files.
//!
//! CSV has no nesting and no schema, so tables travel in their flattened
//! layout: nested columns become dotted leaf columns (`pair.x`, `pair.y`).
//! Attributes can ride along as constant columns named by their path. On
//! the way back the header is matched against the definition's leaves, each
//! leaf is parsed as its declared type, and the nested columns and
//! attributes are reassembled.
//!
//! Empty fields read back as nulls, so an empty string does not survive a
//! round trip. List and binary columns have no CSV text form and fail to
//! encode.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, StringArray};
use arrow::compute::concat_batches;
use arrow::csv::WriterBuilder;
use arrow::csv::reader::{Format, ReaderBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use strata_result::{Error, Result};
use strata_table::{Table, TableBuilder, TableSchema};
use tracing::{debug, warn};

use crate::config::DEFAULT_BATCH_SIZE;

/// Configuration for writing CSV files.
#[derive(Debug, Clone)]
pub struct CsvWriteOptions {
    /// Write a header row with column names when true. [`read_csv`] needs
    /// the header.
    pub include_header: bool,
    /// Delimiter to use between fields.
    pub delimiter: u8,
    /// Append one constant column per attribute set on the table. Declared
    /// defaults are not written; they apply again on read.
    pub include_attributes: bool,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            include_header: true,
            delimiter: b',',
            include_attributes: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    pub batch_size: usize,
    pub validate: bool,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            batch_size: DEFAULT_BATCH_SIZE,
            validate: true,
        }
    }
}

impl CsvReadOptions {
    fn to_format(&self) -> Format {
        let mut format = Format::default().with_header(true);
        if self.delimiter != b',' {
            format = format.with_delimiter(self.delimiter);
        }
        format
    }
}

/// Write the flattened form of `table` to `path`.
pub fn write_csv<E>(
    table: &Table<E>,
    path: impl AsRef<Path>,
    options: &CsvWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let mut batch = table.flattened()?;
    if options.include_attributes {
        batch = with_attribute_columns(table, batch)?;
    }
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new()
        .with_header(options.include_header)
        .with_delimiter(options.delimiter)
        .build(BufWriter::new(file));
    writer.write(&batch)?;
    writer.into_inner().flush()?;
    debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "wrote csv file"
    );
    Ok(())
}

fn with_attribute_columns<E>(table: &Table<E>, batch: RecordBatch) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = batch
        .schema_ref()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .collect();
    let mut columns = batch.columns().to_vec();
    for (path, _) in table.schema().attribute_paths() {
        let Some(value) = table.attributes().get(&path) else {
            continue;
        };
        let encoded = value.encode();
        let values = StringArray::from_iter_values(std::iter::repeat_n(encoded, table.num_rows()));
        fields.push(Field::new(path, DataType::Utf8, false));
        columns.push(Arc::new(values) as ArrayRef);
    }
    let schema = Schema::new_with_metadata(fields, batch.schema_ref().metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Read a flattened CSV file into a table of `schema`.
///
/// Every leaf column of the definition must appear in the header. Header
/// columns naming a declared attribute restore that attribute; anything
/// else is ignored.
pub fn read_csv(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &CsvReadOptions,
) -> Result<Table> {
    let path = path.as_ref();
    let format = options.to_format();
    let mut file = File::open(path)?;
    let (header, _) = format.infer_schema(&mut file, Some(0))?;
    file.rewind()?;

    let read_schema = Arc::new(read_schema(schema, &header)?);
    let reader = ReaderBuilder::new(Arc::clone(&read_schema))
        .with_format(format)
        .with_batch_size(options.batch_size.max(1))
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let combined = concat_batches(&read_schema, &batches)?;
    debug!(
        path = %path.display(),
        rows = combined.num_rows(),
        "read csv file"
    );

    let metadata = attribute_values(schema, &combined)?;
    let batch = combined.with_schema(Arc::new(
        read_schema.as_ref().clone().with_metadata(metadata),
    ))?;
    TableBuilder::from_flattened(schema, &batch)?
        .validate(options.validate)
        .finish()
}

/// Parse schema for the file's header: declared leaves get their declared
/// type, everything else is read as text.
fn read_schema(definition: &TableSchema, header: &Schema) -> Result<Schema> {
    let leaves = definition.flattened_fields();
    for leaf in &leaves {
        if header.index_of(leaf.name()).is_err() {
            return Err(Error::schema_mismatch(format!(
                "CSV header has no column '{}' required by '{}'",
                leaf.name(),
                definition.name()
            )));
        }
    }
    let fields = header
        .fields()
        .iter()
        .map(|column| {
            let name = column.name();
            match leaves.iter().find(|leaf| leaf.name() == name) {
                Some(leaf) => leaf.clone().with_nullable(true),
                None => {
                    if definition.attribute(name).is_none() {
                        warn!(
                            definition = definition.name(),
                            column = %name,
                            "ignoring CSV column not declared by the definition"
                        );
                    }
                    Field::new(name, DataType::Utf8, true)
                }
            }
        })
        .collect::<Vec<_>>();
    Ok(Schema::new(fields))
}

/// Encoded attribute values from the constant attribute columns of
/// `batch`. A column that is not constant is rejected.
fn attribute_values(
    definition: &TableSchema,
    batch: &RecordBatch,
) -> Result<HashMap<String, String>> {
    let mut metadata = HashMap::new();
    for (path, _) in definition.attribute_paths() {
        let Some(column) = batch.column_by_name(&path) else {
            continue;
        };
        let values = column.as_string::<i32>();
        let mut present = values.iter().flatten();
        let Some(first) = present.next() else {
            continue;
        };
        if present.any(|value| value != first) {
            return Err(Error::Codec(format!(
                "attribute column '{path}' holds more than one value"
            )));
        }
        if values.null_count() > 0 {
            return Err(Error::Codec(format!(
                "attribute column '{path}' has missing values"
            )));
        }
        metadata.insert(path, first.to_string());
    }
    Ok(metadata)
}
