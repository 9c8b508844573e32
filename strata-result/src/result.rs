use crate::error::Error;

/// Result type alias used throughout strata.
///
/// Every fallible operation in the schema, table, index and I/O layers
/// returns this type.
pub type Result<T> = std::result::Result<T, Error>;
