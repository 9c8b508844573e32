//! Error types and result definitions for strata.
//!
//! This crate provides the unified error type ([`Error`]) and result alias
//! ([`Result<T>`]) used by every strata crate, along with the
//! [`ValidationReport`] carried by validation failures.
//!
//! # Error Categories
//!
//! - **Definition errors** ([`Error::Schema`]): malformed table definitions
//! - **Conformance errors** ([`Error::TypeCoercion`], [`Error::Nullability`],
//!   [`Error::RowCountMismatch`]): raw data that does not fit a definition
//! - **Rule violations** ([`Error::Validation`]): validator failures, reported
//!   exhaustively
//! - **Compatibility errors** ([`Error::SchemaMismatch`]): tables or files whose
//!   schemas differ where equality is required
//! - **Ordering errors** ([`Error::NotSortable`])
//! - **Lookup failures** ([`Error::UnknownColumn`], [`Error::UnknownAttribute`])
//! - **Engine and codec errors** ([`Error::Arrow`], [`Error::Codec`], [`Error::Io`])

pub mod error;
pub mod report;
pub mod result;

pub use error::Error;
pub use report::{RuleFailure, ValidationReport};
pub use result::Result;
