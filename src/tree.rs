use crate::{
    bindings::Bindings,
    eval::{self, EvaluationError},
    operators::{ArityMismatch, OperatorTag, Reference},
    value::Value,
    Error,
};
use smol_str::SmolStr;
use std::{
    fmt::{self, Display, Formatter},
    ops::{Add, Div, Mul, Neg, Sub},
    str::FromStr,
};

/// An expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(f64),
    /// A value looked up by name when the tree is evaluated.
    Variable(SmolStr),
    /// An operator applied to a single operand.
    Unary(UnaryNode),
    /// An operator applied to two operands.
    Binary(BinaryNode),
}

impl Node {
    pub fn constant(value: f64) -> Self { Node::Constant(value) }

    pub fn variable<S: Into<SmolStr>>(name: S) -> Self {
        Node::Variable(name.into())
    }

    /// Apply a single-operand operator, failing if `operator` doesn't take
    /// exactly one operand.
    pub fn unary(
        operand: Node,
        operator: OperatorTag,
    ) -> Result<Self, ArityMismatch> {
        ArityMismatch::check(operator, 1)?;

        Ok(Node::Unary(UnaryNode {
            operand: Box::new(operand),
            operator,
        }))
    }

    /// Apply a two-operand operator, failing if `operator` doesn't take
    /// exactly two operands.
    pub fn binary(
        left: Node,
        right: Node,
        operator: OperatorTag,
    ) -> Result<Self, ArityMismatch> {
        ArityMismatch::check(operator, 2)?;

        Ok(Node::Binary(BinaryNode {
            left: Box::new(left),
            right: Box::new(right),
            operator,
        }))
    }

    pub fn is_constant(&self) -> bool { matches!(self, Node::Constant(_)) }

    /// Evaluate this tree. See [`crate::evaluate()`].
    pub fn evaluate<B>(&self, bindings: &B) -> Result<Value, EvaluationError>
    where
        B: Bindings + ?Sized,
    {
        eval::evaluate(self, bindings)
    }

    /// Evaluate this tree, letting reference operators compare against
    /// `reference`. See [`crate::evaluate_with_reference()`].
    pub fn evaluate_with_reference<B>(
        &self,
        bindings: &B,
        reference: &Reference,
    ) -> Result<Value, EvaluationError>
    where
        B: Bindings + ?Sized,
    {
        eval::evaluate_with_reference(self, bindings, reference)
    }

    /// Iterate over the direct children of this node.
    pub fn children(&self) -> impl Iterator<Item = &Node> + '_ {
        let (first, second) = match self {
            Node::Constant(_) | Node::Variable(_) => (None, None),
            Node::Unary(unary) => (Some(unary.operand()), None),
            Node::Binary(binary) => (Some(binary.left()), Some(binary.right())),
        };

        first.into_iter().chain(second)
    }

    /// The names of every variable this expression reads, sorted and without
    /// duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut to_visit = vec![self];

        while let Some(node) = to_visit.pop() {
            if let Node::Variable(name) = node {
                names.push(name.as_str());
            }
            to_visit.extend(node.children());
        }

        names.sort_unstable();
        names.dedup();
        names
    }

    /// Does this expression read the variable called `name`?
    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Node::Variable(variable) => variable == name,
            _ => self.children().any(|child| child.depends_on(name)),
        }
    }

    /// The number of levels in the tree (a lone leaf has a depth of 1).
    pub fn depth(&self) -> usize {
        1 + self.children().map(Node::depth).max().unwrap_or(0)
    }
}

/// The payload of a [`Node::Unary`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryNode {
    operand: Box<Node>,
    operator: OperatorTag,
}

impl UnaryNode {
    pub fn operand(&self) -> &Node { &self.operand }

    pub fn operator(&self) -> OperatorTag { self.operator }
}

/// The payload of a [`Node::Binary`].
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryNode {
    left: Box<Node>,
    right: Box<Node>,
    operator: OperatorTag,
}

impl BinaryNode {
    pub fn left(&self) -> &Node { &self.left }

    pub fn right(&self) -> &Node { &self.right }

    pub fn operator(&self) -> OperatorTag { self.operator }
}

impl FromStr for Node {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> { crate::parse(s) }
}

// define some operator overloads to make constructing an expression easier.

fn binary(left: Node, right: Node, operator: OperatorTag) -> Node {
    Node::Binary(BinaryNode {
        left: Box::new(left),
        right: Box::new(right),
        operator,
    })
}

impl Add for Node {
    type Output = Node;

    fn add(self, rhs: Node) -> Node { binary(self, rhs, OperatorTag::Add) }
}

impl Sub for Node {
    type Output = Node;

    fn sub(self, rhs: Node) -> Node { binary(self, rhs, OperatorTag::Sub) }
}

impl Mul for Node {
    type Output = Node;

    fn mul(self, rhs: Node) -> Node { binary(self, rhs, OperatorTag::Mul) }
}

impl Div for Node {
    type Output = Node;

    fn div(self, rhs: Node) -> Node { binary(self, rhs, OperatorTag::Div) }
}

impl Neg for Node {
    type Output = Node;

    fn neg(self) -> Self::Output {
        Node::Unary(UnaryNode {
            operand: Box::new(self),
            operator: OperatorTag::Neg,
        })
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(value) => write_constant(*value, f),
            Node::Variable(name) => write!(f, "{}", name),
            Node::Unary(unary) => {
                let operand = unary.operand();

                match unary.operator() {
                    OperatorTag::Neg => {
                        write!(f, "-")?;
                        write_compound(operand, f)
                    },
                    OperatorTag::Identity => {
                        write!(f, "+")?;
                        write_compound(operand, f)
                    },
                    function => write!(f, "{}({})", function, operand),
                }
            },
            Node::Binary(binary) => {
                let (left, right) = (binary.left(), binary.right());

                let op = match binary.operator() {
                    OperatorTag::Add => " + ",
                    OperatorTag::Sub => " - ",
                    OperatorTag::Mul => "*",
                    OperatorTag::Div => "/",
                    OperatorTag::Pow => "**",
                    function => {
                        return write!(f, "{}({}, {})", function, left, right)
                    },
                };

                // a sign binds looser than "**", so "(-x)**2" needs its
                // parentheses
                if binary.operator() == OperatorTag::Pow && is_signed(left) {
                    write!(f, "({})", left)?;
                } else {
                    write_compound(left, f)?;
                }
                write!(f, "{}", op)?;
                write_compound(right, f)
            },
        }
    }
}

fn is_compound(node: &Node) -> bool {
    match node {
        Node::Constant(_) | Node::Variable(_) => false,
        Node::Unary(unary) => match unary.operator() {
            OperatorTag::Neg | OperatorTag::Identity => {
                is_compound(unary.operand())
            },
            _ => false,
        },
        // written as a function call
        Node::Binary(binary) => binary.operator() != OperatorTag::Atan,
    }
}

fn is_signed(node: &Node) -> bool {
    match node {
        Node::Unary(unary) => matches!(
            unary.operator(),
            OperatorTag::Neg | OperatorTag::Identity
        ),
        Node::Constant(value) => value.is_sign_negative(),
        _ => false,
    }
}

/// Write a constant so it parses back to the same value, since `inf` and `NaN`
/// would read back as variables.
fn write_constant(value: f64, f: &mut Formatter<'_>) -> fmt::Result {
    if value.is_nan() {
        f.write_str("(0/0)")
    } else if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        write!(f, "{}1e999", sign)
    } else {
        write!(f, "{}", value)
    }
}

fn write_compound(node: &Node, f: &mut Formatter<'_>) -> fmt::Result {
    if is_compound(node) {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}
