//! Turning a generic [`Syntax`] tree into an expression tree.

use crate::{
    config::Limits,
    operators::{self, ArityMismatch, OperatorTag},
    syntax::{BinaryOperator, Syntax, UnaryOperator},
    tree::Node,
};
use smol_str::SmolStr;

/// Translate a [`Syntax`] tree into a [`Node`] using the default [`Limits`].
pub fn translate(syntax: &Syntax) -> Result<Node, TranslateError> {
    Translator::default().translate(syntax)
}

/// Converts the syntax a parser understands into the subset of it an
/// expression tree can represent.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Translator {
    limits: Limits,
}

impl Translator {
    pub fn new() -> Self { Translator::default() }

    pub fn with_limits(self, limits: Limits) -> Self { Translator { limits } }

    pub fn translate(&self, syntax: &Syntax) -> Result<Node, TranslateError> {
        self.translate_node(syntax, 1)
    }

    fn translate_node(
        &self,
        syntax: &Syntax,
        depth: usize,
    ) -> Result<Node, TranslateError> {
        if depth > self.limits.max_depth {
            return Err(TranslateError::TooDeep {
                limit: self.limits.max_depth,
            });
        }

        log::debug!("Translating a {} at depth {}", syntax.kind(), depth);

        match syntax {
            Syntax::Literal(value) => Ok(Node::constant(*value)),
            Syntax::Identifier(name) => {
                let node = match operators::reserved_name(name) {
                    Some(value) => Node::constant(value),
                    None => Node::variable(name.clone()),
                };

                Ok(node)
            },
            Syntax::BinaryOp { op, left, right } => {
                let operator =
                    binary_operator(*op).ok_or_else(|| unsupported(syntax))?;
                let left = self.translate_node(left, depth + 1)?;
                let right = self.translate_node(right, depth + 1)?;

                Ok(Node::binary(left, right, operator)?)
            },
            Syntax::UnaryOp { op, operand } => {
                let operator =
                    unary_operator(*op).ok_or_else(|| unsupported(syntax))?;
                let operand = self.translate_node(operand, depth + 1)?;

                Ok(Node::unary(operand, operator)?)
            },
            Syntax::Call { name, arguments } => {
                self.translate_call(name, arguments, depth)
            },
            Syntax::Compare { .. }
            | Syntax::BoolOp { .. }
            | Syntax::Assign { .. }
            | Syntax::Statements(_) => Err(unsupported(syntax)),
        }
    }

    fn translate_call(
        &self,
        name: &SmolStr,
        arguments: &[Syntax],
        depth: usize,
    ) -> Result<Node, TranslateError> {
        let operator = match function(name) {
            Some(operator) if operator.arity() == arguments.len() => operator,
            _ => {
                log::debug!(
                    "Rejecting a call to \"{}\" with {} argument(s)",
                    name,
                    arguments.len()
                );
                return Err(TranslateError::UnsupportedCall {
                    name: name.clone(),
                    arguments: arguments.len(),
                });
            },
        };

        let mut operands = Vec::with_capacity(arguments.len());
        for argument in arguments {
            operands.push(self.translate_node(argument, depth + 1)?);
        }

        let mut operands = operands.into_iter();
        let node = match (operands.next(), operands.next()) {
            (Some(operand), None) => Node::unary(operand, operator)?,
            (Some(left), Some(right)) => Node::binary(left, right, operator)?,
            _ => unreachable!("The arity check guarantees 1 or 2 arguments"),
        };

        Ok(node)
    }
}

fn unsupported(syntax: &Syntax) -> TranslateError {
    log::debug!("Rejecting unsupported syntax: {}", syntax.kind());

    TranslateError::UnsupportedSyntax {
        kind: syntax.kind(),
    }
}

fn binary_operator(op: BinaryOperator) -> Option<OperatorTag> {
    match op {
        BinaryOperator::Add => Some(OperatorTag::Add),
        BinaryOperator::Sub => Some(OperatorTag::Sub),
        BinaryOperator::Mul => Some(OperatorTag::Mul),
        BinaryOperator::Div => Some(OperatorTag::Div),
        BinaryOperator::Pow => Some(OperatorTag::Pow),
        BinaryOperator::FloorDiv | BinaryOperator::Mod => None,
    }
}

fn unary_operator(op: UnaryOperator) -> Option<OperatorTag> {
    match op {
        UnaryOperator::Minus => Some(OperatorTag::Neg),
        UnaryOperator::Plus => Some(OperatorTag::Identity),
        UnaryOperator::Not => None,
    }
}

/// Find the operator a function call refers to, ignoring case.
fn function(name: &str) -> Option<OperatorTag> {
    let tag = match name.to_ascii_lowercase().as_str() {
        "sin" => OperatorTag::Sin,
        "cos" => OperatorTag::Cos,
        "tan" => OperatorTag::Tan,
        "atan" | "arctan" | "arctan2" => OperatorTag::Atan,
        "abs" => OperatorTag::Abs,
        "exp" => OperatorTag::Exp,
        "sqrt" => OperatorTag::Sqrt,
        "delta" => OperatorTag::Delta,
        "b100" | "relative_percentage" => OperatorTag::RelativePercentage,
        _ => return None,
    };

    Some(tag)
}

/// Possible errors that may occur while translating.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TranslateError {
    #[error("{kind} isn't supported in an expression")]
    UnsupportedSyntax { kind: &'static str },
    #[error("can't call \"{name}\" with {arguments} argument(s)")]
    UnsupportedCall { name: SmolStr, arguments: usize },
    #[error(transparent)]
    Arity(#[from] ArityMismatch),
    #[error("the expression is more than {limit} levels deep")]
    TooDeep { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;
    use std::f64::consts::PI;

    fn translate_str(src: &str) -> Result<Node, TranslateError> {
        translate(&parse(src).unwrap())
    }

    fn unary(operand: Node, operator: OperatorTag) -> Node {
        Node::unary(operand, operator).unwrap()
    }

    fn binary(left: Node, right: Node, operator: OperatorTag) -> Node {
        Node::binary(left, right, operator).unwrap()
    }

    #[test]
    fn translate_valid_expressions() {
        let x = || Node::variable("x");
        let inputs = vec![
            ("1", Node::constant(1.0)),
            ("x", x()),
            ("pi", Node::constant(PI)),
            ("x + 1", x() + Node::constant(1.0)),
            ("x - 1", x() - Node::constant(1.0)),
            ("x * 1", x() * Node::constant(1.0)),
            ("x / 1", x() / Node::constant(1.0)),
            ("x ** 2", binary(x(), Node::constant(2.0), OperatorTag::Pow)),
            ("-x", -x()),
            ("+x", unary(x(), OperatorTag::Identity)),
            ("sin(x)", unary(x(), OperatorTag::Sin)),
            ("COS(x)", unary(x(), OperatorTag::Cos)),
            ("Tan(x)", unary(x(), OperatorTag::Tan)),
            ("abs(x)", unary(x(), OperatorTag::Abs)),
            ("exp(x)", unary(x(), OperatorTag::Exp)),
            ("sqrt(x)", unary(x(), OperatorTag::Sqrt)),
            ("delta(x)", unary(x(), OperatorTag::Delta)),
            ("b100(x)", unary(x(), OperatorTag::RelativePercentage)),
            (
                "relative_percentage(x)",
                unary(x(), OperatorTag::RelativePercentage),
            ),
            ("atan(x, 1)", binary(x(), Node::constant(1.0), OperatorTag::Atan)),
            (
                "arctan2(1, x)",
                binary(Node::constant(1.0), x(), OperatorTag::Atan),
            ),
            (
                "2 * (a + pi) - sin(b)",
                Node::constant(2.0)
                    * (Node::variable("a") + Node::constant(PI))
                    - unary(Node::variable("b"), OperatorTag::Sin),
            ),
        ];

        for (src, should_be) in inputs {
            let got = translate_str(src).unwrap();

            assert_eq!(got, should_be, "{}", src);
        }
    }

    #[test]
    fn unsupported_syntax_is_named() {
        let inputs = vec![
            ("x % 2", "modulo"),
            ("x // 2", "floor division"),
            ("not x", "logical not"),
            ("x < 2", "comparison"),
            ("x and y", "boolean operation"),
            ("x = 2", "assignment"),
            ("x; y", "multiple statements"),
            ("1 + (x == 2)", "comparison"),
        ];

        for (src, kind) in inputs {
            let got = translate_str(src).unwrap_err();

            let should_be = TranslateError::UnsupportedSyntax { kind };
            assert_eq!(got, should_be, "{}", src);
        }
    }

    #[test]
    fn unsupported_calls() {
        let inputs = vec![
            ("foo(x)", "foo", 1),
            ("sin(x, y)", "sin", 2),
            ("sin()", "sin", 0),
            ("atan(x)", "atan", 1),
            ("log(x)", "log", 1),
        ];

        for (src, name, arguments) in inputs {
            let got = translate_str(src).unwrap_err();

            assert_eq!(
                got,
                TranslateError::UnsupportedCall {
                    name: name.into(),
                    arguments,
                },
                "{}",
                src
            );
        }
    }

    #[test]
    fn reserved_names_are_case_sensitive() {
        assert_eq!(translate_str("PI").unwrap(), Node::variable("PI"));
    }

    #[test]
    fn deep_trees_are_rejected() {
        let mut syntax = Syntax::Identifier("x".into());
        for _ in 0..20 {
            syntax = Syntax::UnaryOp {
                op: UnaryOperator::Minus,
                operand: Box::new(syntax),
            };
        }
        let translator =
            Translator::new().with_limits(Limits::default().with_max_depth(10));

        let got = translator.translate(&syntax).unwrap_err();

        assert_eq!(got, TranslateError::TooDeep { limit: 10 });
        assert!(Translator::new().translate(&syntax).is_ok());
    }

    #[test]
    fn long_chains_dont_hit_the_nesting_limit() {
        let src = vec!["x"; 500].join(" + ");

        let got = translate_str(&src).unwrap();

        assert_eq!(got.depth(), 500);
    }
}
