//! Converting expression trees to and from a self-describing record.
//!
//! Each node becomes a JSON object whose first key, `"type"`, says which
//! kind of node it is. The remaining keys always appear in the same order,
//! so two records are equal exactly when the trees they encode are:
//!
//! ```text
//! {"type": "unary",    "value": <node>, "func_type": "neg"}
//! {"type": "binary",   "left": <node>, "right": <node>, "func_type": "add"}
//! {"type": "constant", "value": 3.5}
//! {"type": "variable", "value": "x"}
//! ```

use crate::{
    config::Limits,
    operators::{ArityMismatch, OperatorTag, UnknownOperator},
    tree::Node,
};
use serde::{
    de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, Serializer},
    Deserialize, Serialize,
};
use serde_json::{Map, Number, Value as JsonValue};
use std::{cell::Cell, fmt};

const UNARY: &str = "unary";
const BINARY: &str = "binary";
const CONSTANT: &str = "constant";
const VARIABLE: &str = "variable";

/// The largest magnitude at which every integer is exactly representable as
/// an `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert a [`Node`] into its record form.
pub fn serialize(node: &Node) -> JsonValue {
    let mut record = Map::new();

    match node {
        Node::Unary(unary) => {
            record.insert("type".into(), UNARY.into());
            record.insert("value".into(), serialize(unary.operand()));
            record.insert("func_type".into(), unary.operator().as_str().into());
        },
        Node::Binary(binary) => {
            record.insert("type".into(), BINARY.into());
            record.insert("left".into(), serialize(binary.left()));
            record.insert("right".into(), serialize(binary.right()));
            record
                .insert("func_type".into(), binary.operator().as_str().into());
        },
        Node::Constant(value) => {
            record.insert("type".into(), CONSTANT.into());
            record.insert("value".into(), number_to_json(*value));
        },
        Node::Variable(name) => {
            record.insert("type".into(), VARIABLE.into());
            record.insert("value".into(), name.as_str().into());
        },
    }

    JsonValue::Object(record)
}

/// Rebuild a [`Node`] from its record form, using the default [`Limits`].
pub fn deserialize(record: &JsonValue) -> Result<Node, RecordError> {
    Decoder::default().decode(record)
}

/// Read a record from JSON text, using the default [`Limits`].
///
/// Use this rather than `serde_json::from_str::<Node>()` for deep trees, which
/// gives up on anything nested more than 128 levels deep.
pub fn from_str(text: &str) -> Result<Node, RecordError> {
    Decoder::default().decode_str(text)
}

/// Reads records back into expression trees.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Decoder {
    limits: Limits,
}

impl Decoder {
    pub fn new() -> Self { Decoder::default() }

    pub fn with_limits(self, limits: Limits) -> Self { Decoder { limits } }

    pub fn decode(&self, record: &JsonValue) -> Result<Node, RecordError> {
        self.decode_node(record, 1)
    }

    /// Read a record from JSON text.
    pub fn decode_str(&self, text: &str) -> Result<Node, RecordError> {
        let limit = self.limits.max_depth;
        let mut deserializer = serde_json::Deserializer::from_str(text);
        // nesting is bounded by max_depth instead
        deserializer.disable_recursion_limit();

        let too_deep = Cell::new(false);
        let record = BoundedValue::new(limit, &too_deep)
            .deserialize(&mut deserializer)
            .and_then(|record| deserializer.end().map(|_| record));

        match record {
            Ok(record) => self.decode(&record),
            Err(_) if too_deep.get() => Err(RecordError::TooDeep { limit }),
            Err(e) => Err(RecordError::malformed(e.to_string())),
        }
    }

    fn decode_node(
        &self,
        record: &JsonValue,
        depth: usize,
    ) -> Result<Node, RecordError> {
        if depth > self.limits.max_depth {
            return Err(RecordError::TooDeep {
                limit: self.limits.max_depth,
            });
        }

        let fields = record.as_object().ok_or_else(|| {
            let reason = format!("expected an object, not {}", record);
            RecordError::malformed(reason)
        })?;
        let node_type = string_field(fields, "type")?;

        log::trace!("Decoding a {} node at depth {}", node_type, depth);

        match node_type {
            UNARY => {
                let operand =
                    self.decode_node(field(fields, "value")?, depth + 1)?;
                let operator = operator_field(fields)?;

                Ok(Node::unary(operand, operator)?)
            },
            BINARY => {
                let left = self.decode_node(field(fields, "left")?, depth + 1)?;
                let right =
                    self.decode_node(field(fields, "right")?, depth + 1)?;
                let operator = operator_field(fields)?;

                Ok(Node::binary(left, right, operator)?)
            },
            CONSTANT => {
                let value = json_to_number(field(fields, "value")?)?;
                Ok(Node::constant(value))
            },
            VARIABLE => Ok(Node::variable(string_field(fields, "value")?)),
            other => {
                log::debug!("Unknown node type \"{}\"", other);
                Err(RecordError::UnknownNodeType {
                    found: other.to_string(),
                })
            },
        }
    }
}

fn field<'a>(
    fields: &'a Map<String, JsonValue>,
    name: &str,
) -> Result<&'a JsonValue, RecordError> {
    fields.get(name).ok_or_else(|| {
        RecordError::malformed(format!("the \"{}\" field is missing", name))
    })
}

fn string_field<'a>(
    fields: &'a Map<String, JsonValue>,
    name: &str,
) -> Result<&'a str, RecordError> {
    let value = field(fields, name)?;

    value.as_str().ok_or_else(|| {
        RecordError::malformed(format!(
            "the \"{}\" field should be a string, found {}",
            name, value
        ))
    })
}

fn operator_field(
    fields: &Map<String, JsonValue>,
) -> Result<OperatorTag, RecordError> {
    let name = string_field(fields, "func_type")?;
    Ok(name.parse()?)
}

fn number_to_json(value: f64) -> JsonValue {
    if value.is_nan() {
        "NaN".into()
    } else if value.is_infinite() {
        let name = if value > 0.0 { "Infinity" } else { "-Infinity" };
        name.into()
    } else if value.fract() == 0.0
        && value.abs() < MAX_SAFE_INTEGER
        // an integer would lose the sign of -0.0
        && !(value == 0.0 && value.is_sign_negative())
    {
        JsonValue::from(value as i64)
    } else {
        // finite values always have a JSON representation
        Number::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn json_to_number(value: &JsonValue) -> Result<f64, RecordError> {
    let number = match value {
        JsonValue::Number(number) => number.as_f64(),
        JsonValue::String(special) => match special.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    };

    number.ok_or_else(|| {
        RecordError::malformed(format!("{} isn't a valid constant", value))
    })
}

impl Serialize for Node {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Node::Unary(unary) => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("type", UNARY)?;
                map.serialize_entry("value", unary.operand())?;
                map.serialize_entry("func_type", unary.operator().as_str())?;
                map.end()
            },
            Node::Binary(binary) => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("type", BINARY)?;
                map.serialize_entry("left", binary.left())?;
                map.serialize_entry("right", binary.right())?;
                map.serialize_entry("func_type", binary.operator().as_str())?;
                map.end()
            },
            Node::Constant(value) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", CONSTANT)?;
                map.serialize_entry("value", &number_to_json(*value))?;
                map.end()
            },
            Node::Variable(name) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", VARIABLE)?;
                map.serialize_entry("value", name.as_str())?;
                map.end()
            },
        }
    }
}

/// Reads the record format, rejecting trees more than
/// [`Limits::DEFAULT_MAX_DEPTH`] levels deep.
///
/// `serde_json::from_str()` has its own limit of 128 levels, so JSON text
/// holding a deeper tree should be read with [`from_str()`].
impl<'de> Deserialize<'de> for Node {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let too_deep = Cell::new(false);
        let record = BoundedValue::new(Limits::DEFAULT_MAX_DEPTH, &too_deep)
            .deserialize(deserializer)?;

        deserialize(&record).map_err(de::Error::custom)
    }
}

/// Reads any JSON value, refusing to nest arrays or objects more than
/// `limit` levels deep.
#[derive(Copy, Clone)]
struct BoundedValue<'a> {
    depth: usize,
    limit: usize,
    too_deep: &'a Cell<bool>,
}

impl<'a> BoundedValue<'a> {
    fn new(limit: usize, too_deep: &'a Cell<bool>) -> Self {
        BoundedValue {
            depth: 1,
            limit,
            too_deep,
        }
    }

    /// The reader for the items inside an array or object at this depth.
    fn enter<E: de::Error>(self) -> Result<BoundedValue<'a>, E> {
        if self.depth > self.limit {
            self.too_deep.set(true);
            return Err(E::custom(format_args!(
                "the record is nested more than {} levels deep",
                self.limit
            )));
        }

        Ok(BoundedValue {
            depth: self.depth + 1,
            ..self
        })
    }
}

impl<'de, 'a> DeserializeSeed<'de> for BoundedValue<'a> {
    type Value = JsonValue;

    fn deserialize<D>(self, deserializer: D) -> Result<JsonValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'a> Visitor<'de> for BoundedValue<'a> {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<JsonValue, E> {
        Ok(value.into())
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<JsonValue, E> {
        Ok(value.into())
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<JsonValue, E> {
        Ok(value.into())
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<JsonValue, E> {
        Ok(Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<JsonValue, E> {
        Ok(value.into())
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<JsonValue, E> {
        Ok(value.into())
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<JsonValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        DeserializeSeed::deserialize(self, deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<JsonValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let item = self.enter::<A::Error>()?;
        let mut items = Vec::new();

        while let Some(value) = seq.next_element_seed(item)? {
            items.push(value);
        }

        Ok(JsonValue::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<JsonValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let item = self.enter::<A::Error>()?;
        let mut fields = Map::new();

        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(item)?;
            fields.insert(key, value);
        }

        Ok(JsonValue::Object(fields))
    }
}

/// Possible errors that may occur while reading a record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    #[error("\"{found}\" isn't a known node type")]
    UnknownNodeType { found: String },
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },
    #[error(transparent)]
    UnknownOperator(#[from] UnknownOperator),
    #[error(transparent)]
    Arity(#[from] ArityMismatch),
    #[error("the record is nested more than {limit} levels deep")]
    TooDeep { limit: usize },
}

impl RecordError {
    fn malformed(reason: String) -> Self {
        log::debug!("Malformed record: {}", reason);
        RecordError::MalformedRecord { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    #[test]
    fn serialize_each_node_type() {
        let node: Node = "-sin(x) + 2.5".parse().unwrap();

        let got = serialize(&node);

        let should_be = json!({
            "type": "binary",
            "left": {
                "type": "unary",
                "value": {
                    "type": "unary",
                    "value": {"type": "variable", "value": "x"},
                    "func_type": "sin",
                },
                "func_type": "neg",
            },
            "right": {"type": "constant", "value": 2.5},
            "func_type": "add",
        });
        assert_eq!(got, should_be);
    }

    #[test]
    fn keys_are_in_canonical_order() {
        let node: Node = "x * 2".parse().unwrap();

        let got = serde_json::to_string(&serialize(&node)).unwrap();

        assert_eq!(
            got,
            r#"{"type":"binary","left":{"type":"variable","value":"x"},"right":{"type":"constant","value":2},"func_type":"mul"}"#
        );
    }

    #[test]
    fn the_serde_impl_matches_the_record_form() {
        let node: Node = "atan(y, x) / -3.25 + delta(z) ** 2".parse().unwrap();

        let got = serde_json::to_value(&node).unwrap();

        assert_eq!(got, serialize(&node));
        let round_tripped: Node = serde_json::from_value(got).unwrap();
        assert_eq!(round_tripped, node);
    }

    #[test]
    fn serializing_is_repeatable() {
        let node: Node = "2 * (a + pi) - sin(b)".parse().unwrap();
        let original = node.clone();

        let first = serialize(&node);
        let second = serialize(&node);

        assert_eq!(first, second);
        assert_eq!(node, original);
    }

    #[test]
    fn deserializing_leaves_the_record_alone() {
        let record = json!({
            "type": "unary",
            "value": {"type": "variable", "value": "x"},
            "func_type": "neg",
        });
        let original = record.clone();

        let first = deserialize(&record).unwrap();
        let second = deserialize(&record).unwrap();

        assert_eq!(first, second);
        assert_eq!(record, original);
    }

    #[test]
    fn integers_and_floats_are_both_numbers() {
        let as_int = json!({"type": "constant", "value": 2});
        let as_float = json!({"type": "constant", "value": 2.0});

        assert_eq!(deserialize(&as_int).unwrap(), Node::constant(2.0));
        assert_eq!(deserialize(&as_float).unwrap(), Node::constant(2.0));
    }

    #[test]
    fn non_finite_constants_survive_a_round_trip() {
        for value in &[f64::INFINITY, f64::NEG_INFINITY] {
            let node = Node::constant(*value);
            let got = deserialize(&serialize(&node)).unwrap();
            assert_eq!(got, node);
        }

        let nan = deserialize(&serialize(&Node::constant(f64::NAN))).unwrap();
        match nan {
            Node::Constant(value) => assert!(value.is_nan()),
            other => panic!("Expected a constant, found {:?}", other),
        }
    }

    #[test]
    fn unknown_node_type() {
        let record = json!({"type": "bogus", "value": 1});

        let got = deserialize(&record).unwrap_err();

        assert_eq!(
            got,
            RecordError::UnknownNodeType {
                found: String::from("bogus"),
            }
        );
    }

    #[test]
    fn malformed_records() {
        let inputs = vec![
            json!(42),
            json!({"value": 1}),
            json!({"type": 7}),
            json!({"type": "constant"}),
            json!({"type": "constant", "value": "seven"}),
            json!({"type": "variable", "value": 3}),
            json!({"type": "unary", "func_type": "neg"}),
            json!({"type": "unary", "value": {"type": "constant", "value": 1}}),
            json!({
                "type": "binary",
                "left": {"type": "constant", "value": 1},
                "func_type": "add",
            }),
        ];

        for record in inputs {
            let got = deserialize(&record).unwrap_err();

            match got {
                RecordError::MalformedRecord { .. } => {},
                other => panic!("{} gave {:?}", record, other),
            }
        }
    }

    #[test]
    fn unknown_operators() {
        let record = json!({
            "type": "unary",
            "value": {"type": "constant", "value": 1},
            "func_type": "log",
        });

        let got = deserialize(&record).unwrap_err();

        assert_eq!(
            got,
            RecordError::UnknownOperator(UnknownOperator {
                name: "log".into()
            })
        );
    }

    #[test]
    fn operators_must_match_the_node_type() {
        let record = json!({
            "type": "unary",
            "value": {"type": "constant", "value": 1},
            "func_type": "add",
        });

        let got = deserialize(&record).unwrap_err();

        assert_eq!(
            got,
            RecordError::Arity(ArityMismatch {
                operator: OperatorTag::Add,
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn deep_records_are_rejected() {
        let mut record = json!({"type": "variable", "value": "x"});
        for _ in 0..10 {
            record =
                json!({"type": "unary", "value": record, "func_type": "neg"});
        }
        let decoder =
            Decoder::new().with_limits(Limits::default().with_max_depth(5));

        let got = decoder.decode(&record).unwrap_err();

        assert_eq!(got, RecordError::TooDeep { limit: 5 });
        assert!(Decoder::new().decode(&record).is_ok());
    }

    // Deep trees recurse once per level, which needs more stack than a test
    // thread gets by default in debug builds
    fn with_a_large_stack<F>(test: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(test)
            .unwrap();

        if let Err(panic) = handle.join() {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    fn deep_trees_survive_a_round_trip_through_json_text() {
        with_a_large_stack(|| {
            let node: Node = vec!["x"; 500].join(" + ").parse().unwrap();
            assert_eq!(node.depth(), 500);

            let text = serde_json::to_string(&node).unwrap();
            let got = from_str(&text).unwrap();

            assert_eq!(got, node);
        });
    }

    #[test]
    fn deep_json_text_is_rejected() {
        let text = "[".repeat(1_000_000);
        let decoder =
            Decoder::new().with_limits(Limits::default().with_max_depth(10));

        let got = decoder.decode_str(&text).unwrap_err();

        assert_eq!(got, RecordError::TooDeep { limit: 10 });
    }

    #[test]
    fn the_default_limit_applies_to_json_text() {
        with_a_large_stack(|| {
            let text = format!(
                "{}{}{}",
                r#"{"type": "unary", "value": "#.repeat(2000),
                r#"{"type": "variable", "value": "x"}"#,
                r#", "func_type": "neg"}"#.repeat(2000),
            );

            let got = from_str(&text).unwrap_err();

            assert_eq!(got, RecordError::TooDeep { limit: 1024 });
        });
    }

    #[test]
    fn invalid_json_text_is_malformed() {
        let inputs = vec![
            "",
            "{",
            r#"{"type": "variable", "value": "x"} trailing"#,
            r#"{"type": "variable", "value": }"#,
        ];

        for text in inputs {
            let got = from_str(text).unwrap_err();

            match got {
                RecordError::MalformedRecord { .. } => {},
                other => panic!("{:?} gave {:?}", text, other),
            }
        }
    }

    #[test]
    fn negative_zero_keeps_its_sign() {
        let node = Node::constant(1.0) / Node::constant(-0.0);
        let should_be = node.evaluate(&()).unwrap();
        assert_eq!(should_be, Value::Scalar(f64::NEG_INFINITY));

        let record = serialize(&node);
        let from_record = deserialize(&record).unwrap();
        assert_eq!(from_record.evaluate(&()).unwrap(), should_be);

        let text = serde_json::to_string(&node).unwrap();
        let from_text = from_str(&text).unwrap();
        assert_eq!(from_text.evaluate(&()).unwrap(), should_be);
    }
}
