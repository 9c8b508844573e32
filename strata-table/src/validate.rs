//! Validation engine.
//!
//! Every validated column is evaluated over the whole table and every
//! failure is collected before reporting; nothing short-circuits. Nested
//! columns recurse into their definition's validators, skipping rows whose
//! enclosing struct is null.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::buffer::NullBuffer;
use strata_result::{Error, Result, ValidationReport};
use tracing::{debug, warn};

use crate::conform::child_path;
use crate::schema::TableSchema;
use crate::table::Table;

impl<E> Table<E> {
    /// Evaluate every validator and fail with a report listing all rule
    /// failures.
    pub fn validate(&self) -> Result<()> {
        let report = self.validation_report()?;
        if report.is_empty() {
            Ok(())
        } else {
            debug!(
                definition = self.schema().name(),
                failures = report.len(),
                "validation failed"
            );
            Err(Error::Validation(report))
        }
    }

    /// Same evaluation as [`Table::validate`], reduced to a flag.
    ///
    /// A validator that cannot be evaluated against its column (for
    /// instance a literal that does not coerce to the column type) counts
    /// as a failure.
    pub fn is_valid(&self) -> bool {
        match self.validation_report() {
            Ok(report) => report.is_empty(),
            Err(e) => {
                warn!(
                    definition = self.schema().name(),
                    error = %e,
                    "validator could not be evaluated"
                );
                false
            }
        }
    }

    /// Every rule failure in the table; empty when the table is valid.
    pub fn validation_report(&self) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        collect_failures(self.schema(), self.columns(), "", None, &mut report)?;
        Ok(report)
    }
}

fn collect_failures(
    schema: &TableSchema,
    columns: &[ArrayRef],
    prefix: &str,
    skip: Option<&NullBuffer>,
    report: &mut ValidationReport,
) -> Result<()> {
    for (column, array) in schema.columns().iter().zip(columns) {
        let path = child_path(prefix, column.name());
        if let Some(validator) = column.validator() {
            report.extend(validator.failures(&path, array, skip)?);
        }
        if let Some(nested) = column.nested() {
            let values = array.as_struct();
            let merged = NullBuffer::union(skip, values.nulls());
            collect_failures(nested, values.columns(), &path, merged.as_ref(), report)?;
        }
    }
    Ok(())
}
