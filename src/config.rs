//! Knobs shared by the parser, translator and record decoder.

use serde::{Deserialize, Serialize};

/// Resource limits applied while building an expression tree.
///
/// Every stage which builds a tree recurses, so inputs are rejected once they
/// get past these limits instead of overflowing the stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// How deeply parentheses, signs and function calls may nest in text.
    pub max_nesting: usize,
    /// How many levels an expression tree may have.
    pub max_depth: usize,
}

impl Limits {
    pub const DEFAULT_MAX_NESTING: usize = 128;
    pub const DEFAULT_MAX_DEPTH: usize = 1024;

    pub fn with_max_nesting(self, max_nesting: usize) -> Self {
        Limits {
            max_nesting,
            ..self
        }
    }

    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Limits { max_depth, ..self }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_nesting: Limits::DEFAULT_MAX_NESTING,
            max_depth: Limits::DEFAULT_MAX_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_json() {
        let got: Limits =
            serde_json::from_str(r#"{"max_nesting": 12, "max_depth": 34}"#)
                .unwrap();
        assert_eq!(
            got,
            Limits::default().with_max_nesting(12).with_max_depth(34)
        );

        let got: Limits = serde_json::from_str(r#"{"max_depth": 34}"#).unwrap();
        assert_eq!(got.max_nesting, Limits::DEFAULT_MAX_NESTING);
        assert_eq!(got.max_depth, 34);
    }
}
