use std::{fmt, io};
use thiserror::Error;

use crate::report::ValidationReport;

/// Unified error type for all strata operations.
///
/// The variants fall into three groups:
///
/// - **Definition-time** ([`Error::Schema`]): a table definition is malformed
///   (duplicate column names, composition cycles, reserved characters). These
///   are static properties of the definition and surface when the schema is
///   built, never per instance.
/// - **Construction-time** ([`Error::TypeCoercion`], [`Error::Nullability`],
///   [`Error::RowCountMismatch`], [`Error::Validation`]): raw column data does
///   not conform to the definition. Construction fails fast and no partial
///   table is returned.
/// - **Operation-time** ([`Error::SchemaMismatch`], [`Error::NotSortable`],
///   lookup failures, I/O and codec failures).
///
/// # Thread Safety
///
/// `Error` implements `Send` and `Sync`, so it can be handed across threads
/// along with the immutable tables that produced it.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while opening, reading, writing or mapping a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error reported by the Arrow array engine.
    ///
    /// Kernels (cast, filter, take, concat, sort) surface their failures
    /// through this variant when no more specific variant applies.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A file codec (Parquet, IPC, CSV) failed to encode or decode data.
    #[error("codec error: {0}")]
    Codec(String),

    /// The table definition itself is invalid.
    ///
    /// Raised while building a schema: duplicate column or attribute names,
    /// names containing the path separator, or a nested composition that
    /// embeds a definition inside itself.
    #[error("schema error: {0}")]
    Schema(String),

    /// A supplied value cannot be coerced to the column's declared type.
    ///
    /// For example, a non-numeric string supplied for a float column, or a
    /// string value supplied for an integer attribute.
    #[error("cannot coerce '{column}' to {expected}: {reason}")]
    TypeCoercion {
        column: String,
        expected: String,
        reason: String,
    },

    /// A non-nullable column received null values, or was omitted entirely
    /// without a default.
    #[error("column '{column}' is not nullable but has {null_count} null value(s)")]
    Nullability { column: String, null_count: usize },

    /// Columns disagree on row count at construction, or a mask / index
    /// array does not line up with the table it is applied to.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// One or more validator rules failed on realized data.
    ///
    /// The report lists every failure, not just the first.
    #[error("{0}")]
    Validation(ValidationReport),

    /// Two schemas are not structurally equal where equality is required:
    /// combining two tables, embedding a sub-table, or reading a file whose
    /// embedded schema differs from the target definition.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A sort key's logical type has no defined ordering.
    #[error("column '{column}' of type {data_type} has no defined ordering")]
    NotSortable { column: String, data_type: String },

    /// A column name or dotted path does not exist in the schema.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// An attribute is neither set on the instance nor declared with a
    /// default, or is not declared on the definition at all.
    #[error("unknown or unset attribute '{0}'")]
    UnknownAttribute(String),

    /// Invalid argument passed to a strata API.
    #[error("Invalid argument: {0}")]
    InvalidArgumentError(String),
}

impl Error {
    /// Create a codec error from any displayable error.
    ///
    /// ```
    /// use strata_result::Error;
    ///
    /// let err = Error::codec("bad magic");
    /// assert!(matches!(err, Error::Codec(msg) if msg == "bad magic"));
    /// ```
    #[inline]
    pub fn codec<E: fmt::Display>(err: E) -> Self {
        Error::Codec(err.to_string())
    }

    /// Create a type coercion error for `column`.
    #[inline]
    pub fn coercion(
        column: impl Into<String>,
        expected: impl fmt::Display,
        reason: impl fmt::Display,
    ) -> Self {
        Error::TypeCoercion {
            column: column.into(),
            expected: expected.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a schema mismatch error from any displayable message.
    #[inline]
    pub fn schema_mismatch<M: fmt::Display>(msg: M) -> Self {
        Error::SchemaMismatch(msg.to_string())
    }

    /// Returns the validation report if this is a [`Error::Validation`].
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            Error::Validation(report) => Some(report),
            _ => None,
        }
    }
}
