//! Persisting table extension state.
//!
//! Extension values are arbitrary Rust types, so the file adapters do not
//! store them unless the caller supplies an [`ExtensionCodec`]. The codec
//! turns the value into string pairs that ride in the file's schema
//! metadata under [`EXTENSION_KEY_PREFIX`], next to the table attributes.

use std::collections::HashMap;

use strata_result::Result;
use strata_table::Rebuild;

/// Prefix of every metadata key written for extension state.
pub const EXTENSION_KEY_PREFIX: &str = "strata.ext.";

/// Encodes and decodes the extension value of a `Table<E>`.
pub trait ExtensionCodec<E> {
    /// Key/value pairs describing `extension`. Keys are stored prefixed.
    fn encode(&self, extension: &E) -> Result<HashMap<String, String>>;

    /// Rebuild the value from the pairs written by [`Self::encode`], with
    /// the prefix removed.
    fn decode(&self, metadata: &HashMap<String, String>) -> Result<E>;

    /// Rebuild function to install on tables read through this codec.
    fn rebuild(&self) -> Option<Rebuild<E>> {
        None
    }
}

/// `metadata` extended with the encoded extension.
pub(crate) fn attach<E, C>(
    codec: &C,
    extension: &E,
    mut metadata: HashMap<String, String>,
) -> Result<HashMap<String, String>>
where
    C: ExtensionCodec<E> + ?Sized,
{
    for (key, value) in codec.encode(extension)? {
        metadata.insert(format!("{EXTENSION_KEY_PREFIX}{key}"), value);
    }
    Ok(metadata)
}

/// Pairs under the extension prefix, prefix removed.
pub(crate) fn extract(metadata: &HashMap<String, String>) -> HashMap<String, String> {
    metadata
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(EXTENSION_KEY_PREFIX)
                .map(|rest| (rest.to_string(), value.clone()))
        })
        .collect()
}
