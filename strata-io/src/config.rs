//! Reader and writer settings.

use parquet::basic::Compression;

/// Default rows per Parquet row group.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 8192;

/// Default rows per decoded batch.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Parquet writer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriterConfig {
    pub compression: Compression,
    pub max_row_group_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            max_row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }
}

impl WriterConfig {
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }
}

/// Options shared by the Parquet and IPC readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Run the definition's validators on the loaded table.
    pub validate: bool,
    pub batch_size: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            validate: true,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ReadOptions {
    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}
