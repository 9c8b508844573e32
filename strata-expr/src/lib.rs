//! Literal values and the validator algebra used by strata tables.
//!
//! Validators are declared on column descriptors and evaluated column-wide
//! with Arrow compute kernels; see [`validator`] for the combinators.

pub mod literal;
pub mod validator;

pub use literal::{Literal, cast_strict, strict_cast_options};
pub use validator::{
    Operator, Validator, and_, between, eq, equality_mask, ge, gt, is_in, le, lt, ne, not_, or_,
    range,
};
