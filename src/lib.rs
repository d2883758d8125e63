//! Parse arithmetic expressions into a tree which can be evaluated against
//! named columns of data and saved to (or loaded from) a JSON record.
//!
//! ```rust
//! use equation_tree::{Node, Table, Value};
//!
//! let node: Node = "2 * (a + pi) - sin(b)".parse()?;
//!
//! let table = Table::new()
//!     .with_column("a", vec![0.0, 1.0])?
//!     .with_column("b", vec![0.0, 0.0])?;
//! let got = node.evaluate(&table)?;
//! assert_eq!(got.len(), Some(2));
//!
//! let record = equation_tree::serialize(&node);
//! assert_eq!(equation_tree::deserialize(&record)?, node);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod bindings;
pub mod config;
mod eval;
pub mod operators;
mod proptests;
pub mod record;
pub mod syntax;
mod translate;
mod tree;
mod value;

pub use bindings::{Bindings, ColumnLengthMismatch, Table};
pub use config::Limits;
pub use eval::{evaluate, evaluate_with_reference, EvaluationError};
pub use operators::{ArityMismatch, OperatorTag, Reference, UnknownOperator};
pub use record::{deserialize, serialize, Decoder, RecordError};
pub use syntax::ParseError;
pub use translate::{translate, TranslateError, Translator};
pub use tree::{BinaryNode, Node, UnaryNode};
pub use value::Value;

/// Parse an expression tree from some text, e.g. `"2 * (a + pi) - sin(b)"`.
pub fn parse(src: &str) -> Result<Node, Error> {
    let syntax = syntax::parse(src)?;
    let node = translate(&syntax)?;

    Ok(node)
}

/// Any error this crate can produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("unable to parse the expression")]
    Parse(#[from] ParseError),
    #[error("unable to translate the expression")]
    Translate(#[from] TranslateError),
    #[error("unable to evaluate the expression")]
    Evaluation(#[from] EvaluationError),
    #[error("unable to read the record")]
    Record(#[from] RecordError),
}
