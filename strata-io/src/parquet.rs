//! Parquet files.
//!
//! The writer embeds the Arrow schema (with the table attributes in its
//! metadata), so a read restores the exact logical types, nullability and
//! attribute values. Reads project the definition's columns by name and
//! skip anything else the file holds.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::Schema;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::ArrowWriter;
use parquet::arrow::ProjectionMask;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use strata_result::{Error, Result};
use strata_table::{Table, TableSchema};
use tracing::debug;

use crate::codec::{ExtensionCodec, attach};
use crate::config::{ReadOptions, WriterConfig};
use crate::load::{assemble, build, build_with_codec, verify_columns};

/// Write `table` to a Parquet file at `path`, replacing any existing file.
pub fn write_parquet<E>(
    table: &Table<E>,
    path: impl AsRef<Path>,
    config: &WriterConfig,
) -> Result<()> {
    write_batch(&table.to_record_batch()?, path.as_ref(), config)
}

/// [`write_parquet`], also storing the extension value through `codec`.
pub fn write_parquet_with_codec<E, C>(
    table: &Table<E>,
    path: impl AsRef<Path>,
    config: &WriterConfig,
    codec: &C,
) -> Result<()>
where
    C: ExtensionCodec<E> + ?Sized,
{
    let batch = table.to_record_batch()?;
    let metadata = attach(codec, table.extension(), batch.schema_ref().metadata().clone())?;
    let fields = batch.schema_ref().fields().clone();
    let batch = batch.with_schema(Arc::new(Schema::new_with_metadata(fields, metadata)))?;
    write_batch(&batch, path.as_ref(), config)
}

fn write_batch(batch: &RecordBatch, path: &Path, config: &WriterConfig) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(config.compression)
        .set_max_row_group_size(config.max_row_group_size)
        .build();
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| Error::Codec(format!("failed to create Parquet writer: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| Error::Codec(format!("failed to write batch to Parquet: {e}")))?;
    writer
        .close()
        .map_err(|e| Error::Codec(format!("failed to close Parquet writer: {e}")))?;
    debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        "wrote parquet file"
    );
    Ok(())
}

/// Read a Parquet file into a table of `schema`.
pub fn read_parquet(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
) -> Result<Table> {
    let batch = read_batch(schema, path.as_ref(), options)?;
    build(schema, &batch, options.validate)
}

/// [`read_parquet`], also restoring the extension value through `codec`.
pub fn read_parquet_with_codec<E, C>(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
    codec: &C,
) -> Result<Table<E>>
where
    E: Clone + 'static,
    C: ExtensionCodec<E> + ?Sized,
{
    let batch = read_batch(schema, path.as_ref(), options)?;
    build_with_codec(schema, &batch, options.validate, codec)
}

fn read_batch(definition: &TableSchema, path: &Path, options: &ReadOptions) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::Codec(format!("failed to open Parquet file: {e}")))?;
    let roots = verify_columns(definition, builder.schema())?;
    let metadata = builder.schema().metadata().clone();
    let mask = ProjectionMask::roots(builder.parquet_schema(), roots);
    let reader = builder
        .with_projection(mask)
        .with_batch_size(options.batch_size)
        .build()
        .map_err(|e| Error::Codec(format!("failed to build Parquet reader: {e}")))?;
    let decoded = reader.schema();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(
        path = %path.display(),
        batches = batches.len(),
        "read parquet file"
    );
    assemble(&decoded, &batches, metadata)
}
