//! The result of evaluating an expression.

use crate::eval::EvaluationError;
use approx::{AbsDiffEq, RelativeEq};
use nalgebra::DVector as Vector;

/// Either a single number or a column of numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Vector<f64>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(value) => Some(*value),
            Value::Series(_) => None,
        }
    }

    pub fn as_series(&self) -> Option<&Vector<f64>> {
        match self {
            Value::Series(series) => Some(series),
            Value::Scalar(_) => None,
        }
    }

    /// The number of rows, or `None` for a scalar.
    pub fn len(&self) -> Option<usize> {
        self.as_series().map(|series| series.len())
    }

    /// Apply `func` to every element.
    pub fn map<F>(&self, func: F) -> Value
    where
        F: Fn(f64) -> f64,
    {
        match self {
            Value::Scalar(value) => Value::Scalar(func(*value)),
            Value::Series(series) => Value::Series(series.map(func)),
        }
    }

    /// Combine two values element by element, broadcasting a scalar across
    /// the other operand's rows.
    pub fn zip_with<F>(
        &self,
        other: &Value,
        func: F,
    ) -> Result<Value, EvaluationError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let got = match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => {
                Value::Scalar(func(*left, *right))
            },
            (Value::Series(left), Value::Scalar(right)) => {
                Value::Series(left.map(|l| func(l, *right)))
            },
            (Value::Scalar(left), Value::Series(right)) => {
                Value::Series(right.map(|r| func(*left, r)))
            },
            (Value::Series(left), Value::Series(right)) => {
                if left.len() != right.len() {
                    return Err(EvaluationError::ShapeMismatch {
                        left: left.len(),
                        right: right.len(),
                    });
                }

                Value::Series(left.zip_map(right, func))
            },
        };

        Ok(got)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Value::Scalar(value) }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::Series(Vector::from_vec(values))
    }
}

impl From<&[f64]> for Value {
    fn from(values: &[f64]) -> Self {
        Value::Series(Vector::from_column_slice(values))
    }
}

impl From<Vector<f64>> for Value {
    fn from(values: Vector<f64>) -> Self { Value::Series(values) }
}

impl AbsDiffEq for Value {
    type Epsilon = f64;

    fn default_epsilon() -> f64 { f64::default_epsilon() }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => {
                left.abs_diff_eq(right, epsilon)
            },
            (Value::Series(left), Value::Series(right)) => {
                left.len() == right.len() && left.abs_diff_eq(right, epsilon)
            },
            _ => false,
        }
    }
}

impl RelativeEq for Value {
    fn default_max_relative() -> f64 { f64::default_max_relative() }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: f64,
        max_relative: f64,
    ) -> bool {
        match (self, other) {
            (Value::Scalar(left), Value::Scalar(right)) => {
                left.relative_eq(right, epsilon, max_relative)
            },
            (Value::Series(left), Value::Series(right)) => {
                left.len() == right.len()
                    && left.relative_eq(right, epsilon, max_relative)
            },
            _ => false,
        }
    }
}
