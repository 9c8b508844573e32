//! File adapters for strata tables.
//!
//! Three formats are supported:
//!
//! - **Parquet** ([`write_parquet`], [`read_parquet`]): compressed columnar
//!   storage; reads project the definition's columns by name.
//! - **Arrow IPC** ([`write_ipc`], [`read_ipc`], [`read_ipc_mmap`]): the
//!   Feather v2 file format. The mapped reader decodes in place and shares
//!   the mapping with the returned columns.
//! - **CSV** ([`write_csv`], [`read_csv`]): the flattened layout, with
//!   attributes as optional constant columns.
//!
//! Every reader checks the file against the target definition and returns
//! [`strata_result::Error::SchemaMismatch`] on any structural difference,
//! then builds the table through the usual construction path: nullability
//! is enforced and validators run unless the read options disable them.
//!
//! Attributes are stored in the file's schema metadata. Extension state is
//! only stored when an [`ExtensionCodec`] is supplied to one of the
//! `*_with_codec` functions.

pub mod codec;
pub mod config;
pub mod csv;
pub mod ipc;
mod load;
pub mod parquet;

pub use codec::{EXTENSION_KEY_PREFIX, ExtensionCodec};
pub use config::{ReadOptions, WriterConfig};
pub use csv::{CsvReadOptions, CsvWriteOptions, read_csv, write_csv};
pub use ipc::{
    read_ipc, read_ipc_mmap, read_ipc_mmap_with_codec, read_ipc_with_codec, write_ipc,
    write_ipc_with_codec,
};
pub use self::parquet::{
    read_parquet, read_parquet_with_codec, write_parquet, write_parquet_with_codec,
};
