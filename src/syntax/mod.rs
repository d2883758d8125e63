//! Turning text into a generic syntax tree.

mod ast;
mod parse;

pub use ast::{
    BinaryOperator, BooleanOperator, ComparisonOperator, Syntax,
    UnaryOperator,
};
pub use parse::{parse, ParseError, Parser, TokenKind};
