//! Steps shared by every reader: schema verification, batch assembly and
//! table construction.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::{Field, Fields, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use strata_result::{Error, Result};
use strata_table::{Table, TableBuilder, TableSchema, ensure_fields_match};
use tracing::debug;

use crate::codec::{ExtensionCodec, extract};

/// Positions of the definition's columns within `file`, after checking
/// that each one structurally matches its declaration. Columns the
/// definition does not know are left out.
pub(crate) fn verify_columns(definition: &TableSchema, file: &Schema) -> Result<Vec<usize>> {
    let mut indices = Vec::with_capacity(definition.num_columns());
    let mut found = Vec::with_capacity(definition.num_columns());
    for column in definition.columns() {
        let idx = file.index_of(column.name()).map_err(|_| {
            Error::schema_mismatch(format!(
                "file has no column '{}' required by '{}'",
                column.name(),
                definition.name()
            ))
        })?;
        indices.push(idx);
        found.push(Arc::clone(&file.fields()[idx]));
    }
    ensure_fields_match(definition.arrow_fields(), &Fields::from(found))?;
    let extra = file.fields().len() - indices.len();
    if extra > 0 {
        debug!(
            definition = definition.name(),
            extra, "file carries columns outside the definition"
        );
    }
    Ok(indices)
}

/// One batch holding every decoded row, with `metadata` on its schema.
///
/// Top-level fields are relaxed to nullable so that stray nulls surface as
/// a nullability error from the table builder instead of an Arrow error.
pub(crate) fn assemble(
    decoded: &SchemaRef,
    batches: &[RecordBatch],
    metadata: HashMap<String, String>,
) -> Result<RecordBatch> {
    let fields: Vec<Field> = decoded
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_nullable(true))
        .collect();
    let schema = Arc::new(Schema::new_with_metadata(fields, metadata));
    Ok(concat_batches(&schema, batches)?)
}

pub(crate) fn build(
    definition: &Arc<TableSchema>,
    batch: &RecordBatch,
    validate: bool,
) -> Result<Table> {
    let table = TableBuilder::from_record_batch(definition, batch)?
        .validate(validate)
        .finish()?;
    debug!(
        definition = definition.name(),
        rows = table.num_rows(),
        "loaded table"
    );
    Ok(table)
}

/// [`build`], then decode the extension value from the batch metadata.
pub(crate) fn build_with_codec<E, C>(
    definition: &Arc<TableSchema>,
    batch: &RecordBatch,
    validate: bool,
    codec: &C,
) -> Result<Table<E>>
where
    E: Clone + 'static,
    C: ExtensionCodec<E> + ?Sized,
{
    let extension = codec.decode(&extract(batch.schema_ref().metadata()))?;
    let table = build(definition, batch, validate)?.with_extension(extension);
    Ok(match codec.rebuild() {
        Some(rebuild) => table.with_rebuild(move |prev: &E, columns| rebuild(prev, columns)),
        None => table,
    })
}
