//! Arrow IPC files (Feather v2).
//!
//! [`read_ipc`] decodes through a buffered file reader and copies column
//! data into fresh buffers. [`read_ipc_mmap`] maps the file instead and
//! decodes in place: the returned columns point straight into the mapping,
//! which stays alive for as long as any of those buffers do. The file
//! handle itself is closed before the function returns.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use arrow::buffer::Buffer;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::ipc::convert::fb_to_schema;
use arrow::ipc::reader::{FileDecoder, FileReader, read_footer_length};
use arrow::ipc::writer::FileWriter;
use arrow::ipc::{Block, root_as_footer};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use memmap2::Mmap;
use strata_result::{Error, Result};
use strata_table::{Table, TableSchema};
use tracing::debug;

use crate::codec::{ExtensionCodec, attach};
use crate::config::ReadOptions;
use crate::load::{assemble, build, build_with_codec, verify_columns};

/// Magic bytes plus footer length that close every IPC file.
const TRAILER_LEN: usize = 10;

/// Write `table` to an Arrow IPC file at `path`, replacing any existing
/// file.
pub fn write_ipc<E>(table: &Table<E>, path: impl AsRef<Path>) -> Result<()> {
    write_batch(&table.to_record_batch()?, path.as_ref())
}

/// [`write_ipc`], also storing the extension value through `codec`.
pub fn write_ipc_with_codec<E, C>(
    table: &Table<E>,
    path: impl AsRef<Path>,
    codec: &C,
) -> Result<()>
where
    C: ExtensionCodec<E> + ?Sized,
{
    let batch = table.to_record_batch()?;
    let metadata = attach(codec, table.extension(), batch.schema_ref().metadata().clone())?;
    let fields = batch.schema_ref().fields().clone();
    let batch = batch.with_schema(Arc::new(Schema::new_with_metadata(fields, metadata)))?;
    write_batch(&batch, path.as_ref())
}

fn write_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(BufWriter::new(file), batch.schema_ref())?;
    writer.write(batch)?;
    writer.finish()?;
    debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        "wrote ipc file"
    );
    Ok(())
}

/// Read an Arrow IPC file into a table of `schema`.
pub fn read_ipc(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
) -> Result<Table> {
    let batch = read_buffered(schema, path.as_ref())?;
    build(schema, &batch, options.validate)
}

/// [`read_ipc`], also restoring the extension value through `codec`.
pub fn read_ipc_with_codec<E, C>(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
    codec: &C,
) -> Result<Table<E>>
where
    E: Clone + 'static,
    C: ExtensionCodec<E> + ?Sized,
{
    let batch = read_buffered(schema, path.as_ref())?;
    build_with_codec(schema, &batch, options.validate, codec)
}

/// Memory-map an Arrow IPC file and decode it without copying column data.
///
/// The file must not be modified or truncated while tables read from it
/// are alive.
pub fn read_ipc_mmap(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
) -> Result<Table> {
    let batch = read_mapped(schema, path.as_ref())?;
    build(schema, &batch, options.validate)
}

/// [`read_ipc_mmap`], also restoring the extension value through `codec`.
pub fn read_ipc_mmap_with_codec<E, C>(
    schema: &Arc<TableSchema>,
    path: impl AsRef<Path>,
    options: &ReadOptions,
    codec: &C,
) -> Result<Table<E>>
where
    E: Clone + 'static,
    C: ExtensionCodec<E> + ?Sized,
{
    let batch = read_mapped(schema, path.as_ref())?;
    build_with_codec(schema, &batch, options.validate, codec)
}

fn read_buffered(definition: &TableSchema, path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let reader = FileReader::try_new(BufReader::new(file), None)?;
    let decoded = reader.schema();
    verify_columns(definition, &decoded)?;
    let metadata = decoded.metadata().clone();
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    debug!(
        path = %path.display(),
        batches = batches.len(),
        "read ipc file"
    );
    assemble(&decoded, &batches, metadata)
}

fn read_mapped(definition: &TableSchema, path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only; callers keep the file unchanged
    // while buffers decoded from it are alive.
    let mmap = unsafe { Mmap::map(&file)? };
    drop(file);
    let buffer = Buffer::from(Bytes::from_owner(mmap));
    let decoder = MappedFile::open(buffer)?;
    verify_columns(definition, &decoder.schema)?;
    let batches = decoder.batches()?;
    debug!(
        path = %path.display(),
        batches = batches.len(),
        "read mapped ipc file"
    );
    let metadata = decoder.schema.metadata().clone();
    assemble(&decoder.schema, &batches, metadata)
}

/// Footer-driven decoder over a mapped IPC file.
struct MappedFile {
    buffer: Buffer,
    schema: SchemaRef,
    decoder: FileDecoder,
    blocks: Vec<Block>,
}

impl MappedFile {
    fn open(buffer: Buffer) -> Result<Self> {
        if buffer.len() < TRAILER_LEN {
            return Err(Error::Codec(format!(
                "IPC file is {} bytes, too short for a footer",
                buffer.len()
            )));
        }
        let trailer_start = buffer.len() - TRAILER_LEN;
        let trailer: [u8; TRAILER_LEN] = buffer[trailer_start..]
            .try_into()
            .map_err(|_| Error::codec("truncated IPC trailer"))?;
        let footer_len = read_footer_length(trailer)?;
        let footer_start = trailer_start
            .checked_sub(footer_len)
            .ok_or_else(|| Error::codec("IPC footer length exceeds file size"))?;
        let footer = root_as_footer(&buffer[footer_start..trailer_start])
            .map_err(|e| Error::Codec(format!("invalid IPC footer: {e}")))?;
        let fb_schema = footer
            .schema()
            .ok_or_else(|| Error::codec("IPC footer has no schema"))?;
        let schema = Arc::new(fb_to_schema(fb_schema));
        let mut decoder = FileDecoder::new(Arc::clone(&schema), footer.version());
        for block in footer.dictionaries().iter().flatten() {
            decoder.read_dictionary(block, &block_data(&buffer, block))?;
        }
        let blocks = footer
            .recordBatches()
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default();
        Ok(Self {
            buffer,
            schema,
            decoder,
            blocks,
        })
    }

    fn batches(&self) -> Result<Vec<RecordBatch>> {
        let mut out = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            if let Some(batch) = self
                .decoder
                .read_record_batch(block, &block_data(&self.buffer, block))?
            {
                out.push(batch);
            }
        }
        Ok(out)
    }
}

/// The metadata and body of one block, as a view of `buffer`.
fn block_data(buffer: &Buffer, block: &Block) -> Buffer {
    let len = block.metaDataLength() as usize + block.bodyLength() as usize;
    buffer.slice_with_length(block.offset() as usize, len)
}
