//! The fixed catalogue of operators an expression tree may use.

use crate::{eval::EvaluationError, value::Value};
use smol_str::SmolStr;
use std::{
    f64::consts::PI,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Identifiers which always resolve to a constant instead of a variable.
const RESERVED_NAMES: &[(&str, f64)] = &[("pi", PI)];

/// Look up the constant bound to a reserved identifier (e.g. `pi`).
pub fn reserved_name(name: &str) -> Option<f64> {
    RESERVED_NAMES
        .iter()
        .find(|(reserved, _)| *reserved == name)
        .map(|(_, value)| *value)
}

/// Every operation a [`crate::Node`] can apply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperatorTag {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    /// The two-argument arctangent, `atan2(left, right)`.
    Atan,
    Neg,
    Identity,
    Sin,
    Cos,
    Tan,
    Abs,
    Exp,
    Sqrt,
    /// `(values - values[ref]) / values[ref]`.
    RelativePercentage,
    /// `values - values[ref]`.
    Delta,
}

impl OperatorTag {
    pub const ALL: [OperatorTag; 16] = [
        OperatorTag::Add,
        OperatorTag::Sub,
        OperatorTag::Mul,
        OperatorTag::Div,
        OperatorTag::Pow,
        OperatorTag::Atan,
        OperatorTag::Neg,
        OperatorTag::Identity,
        OperatorTag::Sin,
        OperatorTag::Cos,
        OperatorTag::Tan,
        OperatorTag::Abs,
        OperatorTag::Exp,
        OperatorTag::Sqrt,
        OperatorTag::RelativePercentage,
        OperatorTag::Delta,
    ];

    /// The name used for this operator in serialized records.
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorTag::Add => "add",
            OperatorTag::Sub => "sub",
            OperatorTag::Mul => "mul",
            OperatorTag::Div => "div",
            OperatorTag::Pow => "pow",
            OperatorTag::Atan => "atan",
            OperatorTag::Neg => "neg",
            OperatorTag::Identity => "id",
            OperatorTag::Sin => "sin",
            OperatorTag::Cos => "cos",
            OperatorTag::Tan => "tan",
            OperatorTag::Abs => "abs",
            OperatorTag::Exp => "exp",
            OperatorTag::Sqrt => "sqrt",
            OperatorTag::RelativePercentage => "b100",
            OperatorTag::Delta => "delta",
        }
    }

    /// How many operands the operator consumes.
    pub fn arity(self) -> usize {
        match lookup(self) {
            Operator::Binary(_) => 2,
            Operator::Unary(_) | Operator::Referenced(_) => 1,
        }
    }
}

impl Display for OperatorTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorTag {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperatorTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownOperator { name: s.into() })
    }
}

/// The function bound to an [`OperatorTag`].
#[derive(Copy, Clone)]
pub enum Operator {
    /// Applied to each element of its operand.
    Unary(fn(f64) -> f64),
    /// Applied pairwise, broadcasting scalars against series.
    Binary(fn(f64, f64) -> f64),
    /// Compares a series against one of its own rows, picked by the
    /// [`Reference`] passed in at evaluation time.
    Referenced(fn(&Value, &Reference) -> Result<Value, EvaluationError>),
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Unary(_) => f.write_str("Operator::Unary"),
            Operator::Binary(_) => f.write_str("Operator::Binary"),
            Operator::Referenced(_) => f.write_str("Operator::Referenced"),
        }
    }
}

/// Get the function bound to an [`OperatorTag`].
pub fn lookup(tag: OperatorTag) -> Operator {
    match tag {
        OperatorTag::Add => Operator::Binary(|a, b| a + b),
        OperatorTag::Sub => Operator::Binary(|a, b| a - b),
        OperatorTag::Mul => Operator::Binary(|a, b| a * b),
        OperatorTag::Div => Operator::Binary(|a, b| a / b),
        OperatorTag::Pow => Operator::Binary(f64::powf),
        OperatorTag::Atan => Operator::Binary(f64::atan2),
        OperatorTag::Neg => Operator::Unary(|a| -a),
        OperatorTag::Identity => Operator::Unary(|a| a),
        OperatorTag::Sin => Operator::Unary(f64::sin),
        OperatorTag::Cos => Operator::Unary(f64::cos),
        OperatorTag::Tan => Operator::Unary(f64::tan),
        OperatorTag::Abs => Operator::Unary(f64::abs),
        OperatorTag::Exp => Operator::Unary(f64::exp),
        OperatorTag::Sqrt => Operator::Unary(f64::sqrt),
        OperatorTag::RelativePercentage => {
            Operator::Referenced(relative_percentage)
        },
        OperatorTag::Delta => Operator::Referenced(delta),
    }
}

/// Which row(s) of a series the reference operators compare against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Compare every element against the same row.
    Row(usize),
    /// Compare element `i` against row `rows[i]`.
    Rows(Vec<usize>),
}

impl From<usize> for Reference {
    fn from(row: usize) -> Self { Reference::Row(row) }
}

impl From<Vec<usize>> for Reference {
    fn from(rows: Vec<usize>) -> Self { Reference::Rows(rows) }
}

/// The difference between each value and its reference.
pub fn delta(
    values: &Value,
    reference: &Reference,
) -> Result<Value, EvaluationError> {
    let reference_values = reference_values(values, reference, "delta")?;
    values.zip_with(&reference_values, |v, r| v - r)
}

/// The variation of each value relative to its reference.
pub fn relative_percentage(
    values: &Value,
    reference: &Reference,
) -> Result<Value, EvaluationError> {
    let reference_values = reference_values(values, reference, "b100")?;
    values.zip_with(&reference_values, |v, r| (v - r) / r)
}

fn reference_values(
    values: &Value,
    reference: &Reference,
    operator: &'static str,
) -> Result<Value, EvaluationError> {
    let series = match values {
        Value::Series(series) => series,
        Value::Scalar(_) => {
            return Err(EvaluationError::ScalarReference { operator })
        },
    };

    let row = |index: usize| {
        series.get(index).copied().ok_or(
            EvaluationError::ReferenceOutOfBounds {
                index,
                len: series.len(),
            },
        )
    };

    match reference {
        Reference::Row(index) => row(*index).map(Value::Scalar),
        Reference::Rows(indices) => {
            if indices.len() != series.len() {
                return Err(EvaluationError::ShapeMismatch {
                    left: series.len(),
                    right: indices.len(),
                });
            }

            indices
                .iter()
                .map(|&index| row(index))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::from)
        },
    }
}

/// An operator name which isn't in the catalogue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown operator \"{name}\"")]
pub struct UnknownOperator {
    pub name: SmolStr,
}

/// An operator was given the wrong number of operands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("\"{operator}\" takes {expected} operand(s), not {found}")]
pub struct ArityMismatch {
    pub operator: OperatorTag,
    pub expected: usize,
    pub found: usize,
}

impl ArityMismatch {
    pub(crate) fn check(
        operator: OperatorTag,
        found: usize,
    ) -> Result<(), ArityMismatch> {
        let expected = operator.arity();

        if expected == found {
            Ok(())
        } else {
            Err(ArityMismatch {
                operator,
                expected,
                found,
            })
        }
    }
}
