//! Validation failure reports.
//!
//! A [`ValidationReport`] is the payload of [`crate::Error::Validation`]. It
//! is produced by evaluating every validated column of a table and records
//! each failing rule together with the rows that violated it.

use std::fmt;

/// A single failed rule on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    /// Dotted path of the column, e.g. `"pair.x"` for a nested column.
    pub column: String,
    /// Human-readable rendering of the rule that failed.
    pub rule: String,
    /// Row positions (ascending) where the rule failed.
    pub rows: Vec<usize>,
}

impl RuleFailure {
    pub fn new(column: impl Into<String>, rule: impl Into<String>, rows: Vec<usize>) -> Self {
        Self {
            column: column.into(),
            rule: rule.into(),
            rows,
        }
    }
}

/// Every rule failure found while validating a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    failures: Vec<RuleFailure>,
}

impl ValidationReport {
    pub fn new(failures: Vec<RuleFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[RuleFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<RuleFailure> {
        self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Failures recorded against `column`.
    pub fn for_column<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a RuleFailure> {
        self.failures.iter().filter(move |f| f.column == column)
    }

    pub fn extend(&mut self, failures: impl IntoIterator<Item = RuleFailure>) {
        self.failures.extend(failures);
    }
}

// Keep error messages bounded for very large tables.
const MAX_ROWS_DISPLAYED: usize = 10;

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed with {} failure(s)", self.failures.len())?;
        for failure in &self.failures {
            let shown: Vec<String> = failure
                .rows
                .iter()
                .take(MAX_ROWS_DISPLAYED)
                .map(|r| r.to_string())
                .collect();
            let more = failure.rows.len().saturating_sub(MAX_ROWS_DISPLAYED);
            write!(
                f,
                "; column '{}' failed `{}` at rows [{}",
                failure.column,
                failure.rule,
                shown.join(", ")
            )?;
            if more > 0 {
                write!(f, ", ... {more} more")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_truncates_long_row_lists() {
        let report = ValidationReport::new(vec![RuleFailure::new(
            "x",
            "x > 0",
            (0..25).collect(),
        )]);
        let text = report.to_string();
        assert!(text.contains("... 15 more"), "{text}");
        assert!(text.starts_with("validation failed with 1 failure(s)"));
    }

    #[test]
    fn for_column_filters_failures() {
        let report = ValidationReport::new(vec![
            RuleFailure::new("a", "a > 0", vec![0]),
            RuleFailure::new("b", "b > 0", vec![1]),
            RuleFailure::new("a", "a < 9", vec![2]),
        ]);
        let rules: Vec<&str> = report.for_column("a").map(|f| f.rule.as_str()).collect();
        assert_eq!(rules, vec!["a > 0", "a < 9"]);
    }
}
