//! Evaluating a [`Node`] against some [`Bindings`].

use crate::{
    bindings::Bindings,
    operators::{self, Operator, Reference},
    tree::Node,
    value::Value,
};
use smol_str::SmolStr;

/// Evaluate an expression tree, looking variables up in `bindings`.
///
/// Children are always evaluated before their parent. IEEE special values
/// (e.g. the `inf` from `1/0`) are returned as-is rather than treated as
/// errors.
pub fn evaluate<B>(node: &Node, bindings: &B) -> Result<Value, EvaluationError>
where
    B: Bindings + ?Sized,
{
    log::trace!("Evaluating {}", node);
    evaluate_node(node, bindings, None)
}

/// Like [`evaluate()`], but also supplying the row(s) which reference
/// operators (`delta`, `b100`) compare against.
pub fn evaluate_with_reference<B>(
    node: &Node,
    bindings: &B,
    reference: &Reference,
) -> Result<Value, EvaluationError>
where
    B: Bindings + ?Sized,
{
    log::trace!("Evaluating {} relative to {:?}", node, reference);
    evaluate_node(node, bindings, Some(reference))
}

fn evaluate_node<B>(
    node: &Node,
    bindings: &B,
    reference: Option<&Reference>,
) -> Result<Value, EvaluationError>
where
    B: Bindings + ?Sized,
{
    match node {
        Node::Constant(value) => Ok(Value::Scalar(*value)),
        Node::Variable(name) => bindings.lookup(name).cloned().ok_or_else(|| {
            EvaluationError::UnboundVariable { name: name.clone() }
        }),
        Node::Unary(unary) => {
            let operand = evaluate_node(unary.operand(), bindings, reference)?;

            match operators::lookup(unary.operator()) {
                Operator::Unary(func) => Ok(operand.map(func)),
                Operator::Referenced(func) => match reference {
                    Some(reference) => func(&operand, reference),
                    None => Err(EvaluationError::MissingReference {
                        operator: unary.operator().as_str(),
                    }),
                },
                Operator::Binary(_) => unreachable!(
                    "Unary nodes are checked for arity on construction"
                ),
            }
        },
        Node::Binary(binary) => {
            let left = evaluate_node(binary.left(), bindings, reference)?;
            let right = evaluate_node(binary.right(), bindings, reference)?;

            match operators::lookup(binary.operator()) {
                Operator::Binary(func) => left.zip_with(&right, func),
                Operator::Unary(_) | Operator::Referenced(_) => unreachable!(
                    "Binary nodes are checked for arity on construction"
                ),
            }
        },
    }
}

/// Possible errors that may occur while evaluating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("no value was provided for \"{name}\"")]
    UnboundVariable { name: SmolStr },
    #[error(
        "can't combine a series of length {left} with one of length {right}"
    )]
    ShapeMismatch { left: usize, right: usize },
    #[error("\"{operator}\" needs a reference row to compare against")]
    MissingReference { operator: &'static str },
    #[error("reference row {index} is out of bounds for {len} rows")]
    ReferenceOutOfBounds { index: usize, len: usize },
    #[error("\"{operator}\" can only be applied to a series, not a scalar")]
    ScalarReference { operator: &'static str },
}
