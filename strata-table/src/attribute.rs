//! Scalar, per-instance attributes.
//!
//! Attributes are declared on a definition like columns but hold a single
//! value per table instead of one per row. Instances keep them in a map
//! keyed by path: attributes of an embedded sub-table live under
//! `"<column>.<name>"`. On export they travel in the Arrow schema metadata,
//! encoded as strings.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use strata_result::{Error, Result};

/// Value kinds an attribute may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Int,
    Float,
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::String => write!(f, "string"),
            AttributeKind::Int => write!(f, "int"),
            AttributeKind::Float => write!(f, "float"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Int(v.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Float(_) => AttributeKind::Float,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to `kind`. Integers widen to floats; nothing else converts.
    pub fn coerce(self, key: &str, kind: AttributeKind) -> Result<Self> {
        match (self, kind) {
            (v, k) if v.kind() == k => Ok(v),
            (AttributeValue::Int(v), AttributeKind::Float) => Ok(AttributeValue::Float(v as f64)),
            (v, k) => Err(Error::coercion(
                key,
                k,
                format!("attribute value {v} is a {}", v.kind()),
            )),
        }
    }

    /// String form stored in schema metadata.
    pub fn encode(&self) -> String {
        match self {
            AttributeValue::String(s) => s.clone(),
            AttributeValue::Int(v) => v.to_string(),
            // `{:?}` keeps a decimal point so the value reads back as a float
            AttributeValue::Float(v) => format!("{v:?}"),
        }
    }

    pub fn decode(key: &str, kind: AttributeKind, raw: &str) -> Result<Self> {
        match kind {
            AttributeKind::String => Ok(AttributeValue::String(raw.to_string())),
            AttributeKind::Int => raw
                .trim()
                .parse()
                .map(AttributeValue::Int)
                .map_err(|e| Error::coercion(key, kind, format!("'{raw}': {e}"))),
            AttributeKind::Float => raw
                .trim()
                .parse()
                .map(AttributeValue::Float)
                .map_err(|e| Error::coercion(key, kind, format!("'{raw}': {e}"))),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s:?}"),
            AttributeValue::Int(v) => write!(f, "{v}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Attribute declaration on a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    kind: AttributeKind,
    default: Option<AttributeValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::String)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, AttributeKind::Float)
    }

    /// Value reported when an instance leaves the attribute unset.
    ///
    /// A default of the wrong kind is rejected when the schema is built.
    pub fn with_default(mut self, value: impl Into<AttributeValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn default_value(&self) -> Option<&AttributeValue> {
        self.default.as_ref()
    }

    pub(crate) fn set_default(&mut self, value: Option<AttributeValue>) {
        self.default = value;
    }
}

/// Attribute values set on an instance, keyed by path.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Metadata entries for every value in `attributes`.
pub fn encode_attributes(attributes: &AttributeMap) -> HashMap<String, String> {
    attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.encode()))
        .collect()
}

/// Re-key `attributes` under `prefix.`.
pub(crate) fn prefixed(prefix: &str, attributes: &AttributeMap) -> AttributeMap {
    attributes
        .iter()
        .map(|(k, v)| (format!("{prefix}.{k}"), v.clone()))
        .collect()
}

/// Entries of `attributes` under `prefix.`, with the prefix removed.
pub(crate) fn strip_prefix(prefix: &str, attributes: &AttributeMap) -> AttributeMap {
    let lead = format!("{prefix}.");
    attributes
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(&lead).map(|rest| (rest.to_string(), v.clone())))
        .collect()
}
