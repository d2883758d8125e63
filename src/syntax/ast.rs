use smol_str::SmolStr;
use std::mem;

/// A generic parsed expression, before it has been checked against what an
/// expression tree can represent.
#[derive(Debug, Clone, PartialEq)]
pub enum Syntax {
    Literal(f64),
    Identifier(SmolStr),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Syntax>,
    },
    /// A call to a named function, e.g. `sin(x)`.
    Call {
        name: SmolStr,
        arguments: Vec<Syntax>,
    },
    Compare {
        op: ComparisonOperator,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    /// `and` / `or`.
    BoolOp {
        op: BooleanOperator,
        left: Box<Syntax>,
        right: Box<Syntax>,
    },
    Assign {
        target: SmolStr,
        value: Box<Syntax>,
    },
    /// Several `;`-separated statements.
    Statements(Vec<Syntax>),
}

impl Syntax {
    /// A human-friendly name for this kind of syntax.
    pub fn kind(&self) -> &'static str {
        match self {
            Syntax::Literal(_) => "literal",
            Syntax::Identifier(_) => "identifier",
            Syntax::BinaryOp { op, .. } => op.name(),
            Syntax::UnaryOp { op, .. } => op.name(),
            Syntax::Call { .. } => "function call",
            Syntax::Compare { .. } => "comparison",
            Syntax::BoolOp { .. } => "boolean operation",
            Syntax::Assign { .. } => "assignment",
            Syntax::Statements(_) => "multiple statements",
        }
    }

    pub(crate) fn binary(
        op: BinaryOperator,
        left: Syntax,
        right: Syntax,
    ) -> Self {
        Syntax::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub(crate) fn unary(op: UnaryOperator, operand: Syntax) -> Self {
        Syntax::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    fn is_leaf(&self) -> bool {
        matches!(self, Syntax::Literal(_) | Syntax::Identifier(_))
    }

    /// Move every non-leaf child onto `pending`, leaving placeholders behind.
    fn take_children(&mut self, pending: &mut Vec<Syntax>) {
        match self {
            Syntax::Literal(_) | Syntax::Identifier(_) => {},
            Syntax::BinaryOp { left, right, .. }
            | Syntax::Compare { left, right, .. }
            | Syntax::BoolOp { left, right, .. } => {
                take_boxed(left, pending);
                take_boxed(right, pending);
            },
            Syntax::UnaryOp { operand: child, .. }
            | Syntax::Assign { value: child, .. } => take_boxed(child, pending),
            Syntax::Call {
                arguments: children,
                ..
            }
            | Syntax::Statements(children) => pending.append(children),
        }
    }
}

fn take_boxed(child: &mut Box<Syntax>, pending: &mut Vec<Syntax>) {
    if !child.is_leaf() {
        pending.push(mem::replace(&mut **child, Syntax::Literal(0.0)));
    }
}

// A chain like "x + x + ... + x" is as deep as it is long, so the tree is
// torn down with an explicit stack instead of recursing once per level.
impl Drop for Syntax {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);

        while let Some(mut syntax) = pending.pop() {
            syntax.take_children(&mut pending);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOperator {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOperator::Add => "addition",
            BinaryOperator::Sub => "subtraction",
            BinaryOperator::Mul => "multiplication",
            BinaryOperator::Div => "division",
            BinaryOperator::FloorDiv => "floor division",
            BinaryOperator::Mod => "modulo",
            BinaryOperator::Pow => "exponentiation",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOperator {
    Minus,
    Plus,
    Not,
}

impl UnaryOperator {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOperator::Minus => "negation",
            UnaryOperator::Plus => "unary plus",
            UnaryOperator::Not => "logical not",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_very_deep_tree() {
        let mut syntax = Syntax::Identifier("x".into());

        for i in 0..1_000_000 {
            syntax = match i % 3 {
                0 => Syntax::binary(
                    BinaryOperator::Add,
                    syntax,
                    Syntax::Literal(1.0),
                ),
                1 => Syntax::unary(UnaryOperator::Minus, syntax),
                _ => Syntax::Call {
                    name: "f".into(),
                    arguments: vec![syntax],
                },
            };
        }

        drop(syntax);
    }

    #[test]
    fn kind_names_the_operator() {
        let syntax = Syntax::binary(
            BinaryOperator::Mod,
            Syntax::Identifier("x".into()),
            Syntax::Literal(2.0),
        );

        assert_eq!(syntax.kind(), "modulo");
    }
}
