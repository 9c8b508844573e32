//! Untyped scalar values.
//!
//! A [`Literal`] has not yet been coerced into a specific Arrow type. This
//! lets callers write `gt(0)` against a `Float64` column or broadcast `"a"`
//! into a `LargeUtf8` column; the coercion happens once the target
//! [`DataType`] is known.

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Float64Array, Int64Array, Scalar, StringArray,
    UInt64Array, new_null_array,
};
use arrow::compute::kernels::cmp;
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::DataType;
use strata_result::{Error, Result};

/// A literal value that has not yet been coerced into a specific native
/// type.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i128),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

macro_rules! impl_from_for_literal {
    ($variant:ident, $($t:ty),*) => {
        $(
            impl From<$t> for Literal {
                fn from(v: $t) -> Self {
                    Literal::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_literal!(Integer, i8, i16, i32, i64, i128, u8, u16, u32, u64);
impl_from_for_literal!(Float, f32, f64);
impl_from_for_literal!(Boolean, bool);
impl_from_for_literal!(String, String);
impl_from_for_literal!(Binary, Vec<u8>);

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::String(v.to_string())
    }
}

impl From<&[u8]> for Literal {
    fn from(v: &[u8]) -> Self {
        Literal::Binary(v.to_vec())
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(v: Option<T>) -> Self {
        v.map_or(Literal::Null, Into::into)
    }
}

/// Strict casting: values that cannot be represented in the target type
/// are errors rather than silently becoming null.
pub fn strict_cast_options() -> CastOptions<'static> {
    CastOptions {
        safe: false,
        ..Default::default()
    }
}

/// Cast `array` to `data_type` without losing information.
///
/// On top of [`strict_cast_options`], floating point values bound for an
/// integer type must be whole numbers: `1.5` is an error, not `1`.
/// `context` names the destination and is only used in error messages.
pub fn cast_strict(context: &str, array: &ArrayRef, data_type: &DataType) -> Result<ArrayRef> {
    let cast = cast_with_options(array, data_type, &strict_cast_options())
        .map_err(|e| Error::coercion(context, data_type, e))?;
    if array.data_type().is_floating() && data_type.is_integer() {
        let back = cast_with_options(&cast, array.data_type(), &strict_cast_options())?;
        let truncated = cmp::distinct(array, &back)?.true_count();
        if truncated > 0 {
            return Err(Error::coercion(
                context,
                data_type,
                format!("{truncated} value(s) have a fractional part"),
            ));
        }
    }
    Ok(cast)
}

impl Literal {
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Boolean(_) => "boolean",
            Literal::Integer(_) => "integer",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
            Literal::Binary(_) => "binary",
        }
    }

    /// Repeat the literal `len` times in its natural Arrow type.
    ///
    /// Integers use `Int64` when they fit, then `UInt64`.
    pub fn to_array(&self, len: usize) -> Result<ArrayRef> {
        let array: ArrayRef = match self {
            Literal::Null => new_null_array(&DataType::Null, len),
            Literal::Boolean(v) => Arc::new(BooleanArray::from(vec![*v; len])),
            Literal::Integer(v) => {
                if let Ok(v) = i64::try_from(*v) {
                    Arc::new(Int64Array::from_value(v, len))
                } else if let Ok(v) = u64::try_from(*v) {
                    Arc::new(UInt64Array::from_value(v, len))
                } else {
                    return Err(Error::coercion(
                        "<literal>",
                        "Int64 or UInt64",
                        format!("integer {v} out of range"),
                    ));
                }
            }
            Literal::Float(v) => Arc::new(Float64Array::from_value(*v, len)),
            Literal::String(v) => Arc::new(StringArray::from_iter_values(
                std::iter::repeat_n(v.as_str(), len),
            )),
            Literal::Binary(v) => Arc::new(BinaryArray::from_iter_values(std::iter::repeat_n(
                v.as_slice(),
                len,
            ))),
        };
        Ok(array)
    }

    /// Repeat the literal `len` times, coerced to `data_type`.
    ///
    /// `context` names the column (or attribute) the value is destined for
    /// and is only used in error messages.
    pub fn to_array_of(&self, context: &str, data_type: &DataType, len: usize) -> Result<ArrayRef> {
        if self.is_null() {
            return Ok(new_null_array(data_type, len));
        }
        let natural = self.to_array(len)?;
        if natural.data_type() == data_type {
            return Ok(natural);
        }
        cast_strict(context, &natural, data_type)
    }

    /// A single-element scalar of `data_type`, for use with the comparison
    /// kernels.
    pub fn to_scalar(&self, context: &str, data_type: &DataType) -> Result<Scalar<ArrayRef>> {
        Ok(Scalar::new(self.to_array_of(context, data_type, 1)?))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(v) => write!(f, "{v}"),
            Literal::Integer(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "{v:?}"),
            Literal::Binary(v) => write!(f, "0x{}", hex(v)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
