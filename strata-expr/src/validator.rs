//! Column validators.
//!
//! A [`Validator`] is a predicate over a column's values, built from leaf
//! comparisons ([`eq`], [`gt`], [`between`], [`is_in`], ...) and combined with
//! [`and_`], [`or_`] and [`not_`]. Evaluation is vectorized: each leaf is a
//! single comparison kernel call over the whole column and combinators use
//! the Kleene boolean kernels, so the cost is linear in the column length
//! with no per-row interpretation.
//!
//! Null values never fail a validator. Nullability is a property of the
//! column descriptor and is enforced separately.

use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Datum, Scalar};
use arrow::buffer::{BooleanBuffer, NullBuffer};
use arrow::compute::kernels::cmp;
use arrow::compute::{and_kleene, cast, is_null, not, or_kleene, prep_null_mask_filter};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use strata_result::{Result, RuleFailure};

use crate::literal::Literal;

/// Comparison operators over a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Equals(Literal),
    NotEquals(Literal),
    GreaterThan(Literal),
    GreaterThanOrEquals(Literal),
    LessThan(Literal),
    LessThanOrEquals(Literal),
    Range {
        lower: Bound<Literal>,
        upper: Bound<Literal>,
    },
    In(Vec<Literal>),
}

/// Logical expression over operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    And(Vec<Validator>),
    Or(Vec<Validator>),
    Not(Box<Validator>),
    Pred(Operator),
}

/// `value == target`
pub fn eq(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::Equals(target.into()))
}

/// `value != target`
pub fn ne(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::NotEquals(target.into()))
}

/// `value > target`
pub fn gt(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::GreaterThan(target.into()))
}

/// `value >= target`
pub fn ge(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::GreaterThanOrEquals(target.into()))
}

/// `value < target`
pub fn lt(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::LessThan(target.into()))
}

/// `value <= target`
pub fn le(target: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::LessThanOrEquals(target.into()))
}

/// `lower <= value <= upper`
pub fn between(lower: impl Into<Literal>, upper: impl Into<Literal>) -> Validator {
    Validator::Pred(Operator::Range {
        lower: Bound::Included(lower.into()),
        upper: Bound::Included(upper.into()),
    })
}

/// Range with arbitrary bounds.
pub fn range(lower: Bound<Literal>, upper: Bound<Literal>) -> Validator {
    Validator::Pred(Operator::Range { lower, upper })
}

/// `value` is one of `values`.
pub fn is_in<I, L>(values: I) -> Validator
where
    I: IntoIterator<Item = L>,
    L: Into<Literal>,
{
    Validator::Pred(Operator::In(values.into_iter().map(Into::into).collect()))
}

/// Every rule must hold. Nested conjunctions are flattened, so grouping does
/// not change the result or the report.
pub fn and_(rules: impl IntoIterator<Item = Validator>) -> Validator {
    let mut flat = Vec::new();
    for rule in rules {
        match rule {
            Validator::And(children) => flat.extend(children),
            other => flat.push(other),
        }
    }
    Validator::And(flat)
}

/// At least one rule must hold. Nested disjunctions are flattened.
pub fn or_(rules: impl IntoIterator<Item = Validator>) -> Validator {
    let mut flat = Vec::new();
    for rule in rules {
        match rule {
            Validator::Or(children) => flat.extend(children),
            other => flat.push(other),
        }
    }
    Validator::Or(flat)
}

/// The rule must not hold.
pub fn not_(rule: Validator) -> Validator {
    Validator::Not(Box::new(rule))
}

impl Validator {
    #[inline]
    pub fn and(self, other: Validator) -> Validator {
        and_([self, other])
    }

    #[inline]
    pub fn or(self, other: Validator) -> Validator {
        or_([self, other])
    }

    /// Evaluate the rule over a whole column.
    ///
    /// The result has one slot per value: `true` where the rule holds,
    /// `false` where it does not, null where the outcome is unknown (null
    /// input).
    pub fn evaluate(&self, values: &ArrayRef) -> Result<BooleanArray> {
        match self {
            Validator::Pred(op) => evaluate_operator(op, values),
            Validator::And(children) => {
                let mut acc = BooleanArray::from(vec![true; values.len()]);
                for child in children {
                    acc = and_kleene(&acc, &child.evaluate(values)?)?;
                }
                Ok(acc)
            }
            Validator::Or(children) => {
                let mut acc = BooleanArray::from(vec![false; values.len()]);
                for child in children {
                    acc = or_kleene(&acc, &child.evaluate(values)?)?;
                }
                Ok(acc)
            }
            Validator::Not(inner) => Ok(not(&inner.evaluate(values)?)?),
        }
    }

    /// `true` iff no non-null value fails the rule.
    pub fn is_satisfied(&self, values: &ArrayRef) -> Result<bool> {
        let mask = self.evaluate(values)?;
        Ok(failing_rows(&mask, values, None).is_empty())
    }

    /// Every failure of this rule over `values`, attributed to the most
    /// specific sub-rule.
    ///
    /// Conjunctions report each failing conjunct separately; disjunctions,
    /// negations and leaves report themselves. Rows that are null in
    /// `values`, or null in `skip` (e.g. rows whose enclosing struct is
    /// null), are never reported.
    pub fn failures(
        &self,
        column: &str,
        values: &ArrayRef,
        skip: Option<&NullBuffer>,
    ) -> Result<Vec<RuleFailure>> {
        let mut out = Vec::new();
        self.collect_failures(column, values, skip, &mut out)?;
        Ok(out)
    }

    fn collect_failures(
        &self,
        column: &str,
        values: &ArrayRef,
        skip: Option<&NullBuffer>,
        out: &mut Vec<RuleFailure>,
    ) -> Result<()> {
        if let Validator::And(children) = self {
            for child in children {
                child.collect_failures(column, values, skip, out)?;
            }
            return Ok(());
        }
        let mask = self.evaluate(values)?;
        let rows = failing_rows(&mask, values, skip);
        if !rows.is_empty() {
            out.push(RuleFailure::new(column, self.to_string(), rows));
        }
        Ok(())
    }
}

fn evaluate_operator(op: &Operator, values: &ArrayRef) -> Result<BooleanArray> {
    let compare = |kernel: Kernel, lit: &Literal| -> Result<BooleanArray> {
        let (values, scalar) = operands(values, lit, "validator literal")?;
        Ok(kernel(&values, &scalar)?)
    };
    let mask = match op {
        Operator::Equals(lit) => compare(cmp::eq, lit)?,
        Operator::NotEquals(lit) => compare(cmp::neq, lit)?,
        Operator::GreaterThan(lit) => compare(cmp::gt, lit)?,
        Operator::GreaterThanOrEquals(lit) => compare(cmp::gt_eq, lit)?,
        Operator::LessThan(lit) => compare(cmp::lt, lit)?,
        Operator::LessThanOrEquals(lit) => compare(cmp::lt_eq, lit)?,
        Operator::Range { lower, upper } => {
            let lower = match lower {
                Bound::Included(lit) => Some(compare(cmp::gt_eq, lit)?),
                Bound::Excluded(lit) => Some(compare(cmp::gt, lit)?),
                Bound::Unbounded => None,
            };
            let upper = match upper {
                Bound::Included(lit) => Some(compare(cmp::lt_eq, lit)?),
                Bound::Excluded(lit) => Some(compare(cmp::lt, lit)?),
                Bound::Unbounded => None,
            };
            match (lower, upper) {
                (Some(l), Some(u)) => and_kleene(&l, &u)?,
                (Some(mask), None) | (None, Some(mask)) => mask,
                (None, None) => {
                    BooleanArray::new(BooleanBuffer::new_set(values.len()), values.logical_nulls())
                }
            }
        }
        Operator::In(targets) => {
            let mut acc =
                BooleanArray::new(BooleanBuffer::new_unset(values.len()), values.logical_nulls());
            for lit in targets {
                acc = or_kleene(&acc, &compare(cmp::eq, lit)?)?;
            }
            acc
        }
    };
    Ok(mask)
}

type Kernel = fn(&dyn Datum, &dyn Datum) -> std::result::Result<BooleanArray, ArrowError>;

/// Column and scalar to hand to a comparison kernel.
///
/// The literal is coerced to the column's type when that is exact. A float
/// that is not a whole number of an integer column's type compares against
/// the column widened to `Float64` instead, so `ge(0.5)` rejects `0`.
fn operands(
    values: &ArrayRef,
    lit: &Literal,
    context: &str,
) -> Result<(ArrayRef, Scalar<ArrayRef>)> {
    match lit.to_scalar(context, values.data_type()) {
        Ok(scalar) => Ok((Arc::clone(values), scalar)),
        Err(_) if matches!(lit, Literal::Float(_)) && values.data_type().is_integer() => {
            let widened = cast(values, &DataType::Float64)?;
            Ok((widened, Scalar::new(lit.to_array(1)?)))
        }
        Err(e) => Err(e),
    }
}

/// Rows equal to `value`; [`Literal::Null`] matches null slots.
///
/// Unlike validator evaluation, the result has no null slots: rows that are
/// null and `value` is not null are `false`.
pub fn equality_mask(values: &ArrayRef, value: &Literal) -> Result<BooleanArray> {
    if value.is_null() {
        return Ok(is_null(values)?);
    }
    let (values, scalar) = operands(values, value, "selection value")?;
    let hits = cmp::eq(&values, &scalar)?;
    if hits.null_count() == 0 {
        return Ok(hits);
    }
    Ok(prep_null_mask_filter(&hits))
}

/// Rows where `mask` is `false`, the value is present, and the row is not
/// masked out by `skip`.
pub(crate) fn failing_rows(
    mask: &BooleanArray,
    values: &ArrayRef,
    skip: Option<&NullBuffer>,
) -> Vec<usize> {
    let mut failing = !mask.values();
    for nulls in [mask.nulls().cloned(), values.logical_nulls(), skip.cloned()]
        .into_iter()
        .flatten()
    {
        failing = &failing & nulls.inner();
    }
    failing.set_indices().collect()
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals(v) => write!(f, "== {v}"),
            Operator::NotEquals(v) => write!(f, "!= {v}"),
            Operator::GreaterThan(v) => write!(f, "> {v}"),
            Operator::GreaterThanOrEquals(v) => write!(f, ">= {v}"),
            Operator::LessThan(v) => write!(f, "< {v}"),
            Operator::LessThanOrEquals(v) => write!(f, "<= {v}"),
            Operator::Range { lower, upper } => {
                match lower {
                    Bound::Included(v) => write!(f, "[{v}, ")?,
                    Bound::Excluded(v) => write!(f, "({v}, ")?,
                    Bound::Unbounded => write!(f, "(-inf, ")?,
                }
                match upper {
                    Bound::Included(v) => write!(f, "{v}]"),
                    Bound::Excluded(v) => write!(f, "{v})"),
                    Bound::Unbounded => write!(f, "+inf)"),
                }
            }
            Operator::In(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "in [{}]", rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validator::Pred(op) => write!(f, "{op}"),
            Validator::Not(inner) => write!(f, "not ({inner})"),
            Validator::And(children) => write_joined(f, children, " and "),
            Validator::Or(children) => write_joined(f, children, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Validator], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}
