//! Property-based tests for the record format and the text round trip.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{deserialize, serialize, Node, OperatorTag};

    fn operators(arity: usize) -> Vec<OperatorTag> {
        OperatorTag::ALL
            .iter()
            .copied()
            .filter(|tag| tag.arity() == arity)
            .collect()
    }

    fn variable_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,5}".prop_filter("reserved words", |name| {
            !matches!(name.as_str(), "pi" | "and" | "or" | "not")
        })
    }

    // Trees built over the given leaves, up to 6 levels deep
    fn tree(leaf: BoxedStrategy<Node>) -> impl Strategy<Value = Node> {
        leaf.prop_recursive(6, 64, 2, |inner| {
            prop_oneof![
                (inner.clone(), prop::sample::select(operators(1)))
                    .prop_map(|(operand, operator)| {
                        Node::unary(operand, operator).unwrap()
                    }),
                (
                    inner.clone(),
                    inner,
                    prop::sample::select(operators(2))
                )
                    .prop_map(|(left, right, operator)| {
                        Node::binary(left, right, operator).unwrap()
                    }),
            ]
        })
    }

    // Any constant which compares equal to itself
    fn any_tree() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![
            prop::num::f64::NORMAL
                | prop::num::f64::ZERO
                | prop::num::f64::INFINITE
                | prop::num::f64::SUBNORMAL,
            -1e6_f64..1e6,
            (-1000_i64..1000).prop_map(|i| i as f64),
        ]
        .prop_map(Node::constant);
        let leaf = prop_oneof![leaf, variable_name().prop_map(Node::variable)];

        tree(leaf.boxed())
    }

    // The parser reads "-1" as a negation, so only non-negative constants
    // survive being written out as text
    fn printable_tree() -> impl Strategy<Value = Node> {
        let leaf = prop_oneof![
            (0.0_f64..1e6).prop_map(Node::constant),
            (0_u32..1000).prop_map(|i| Node::constant(f64::from(i))),
            Just(Node::constant(f64::INFINITY)),
            variable_name().prop_map(Node::variable),
        ];

        tree(leaf.boxed())
    }

    proptest! {
        #[test]
        fn record_round_trip(node in any_tree()) {
            let record = serialize(&node);

            prop_assert_eq!(deserialize(&record).unwrap(), node);
        }

        #[test]
        fn json_text_round_trip(node in any_tree()) {
            let text = serde_json::to_string(&node).unwrap();
            let got: Node = serde_json::from_str(&text).unwrap();

            prop_assert_eq!(got, node);
        }

        #[test]
        fn json_text_round_trip_through_the_decoder(node in any_tree()) {
            let text = serde_json::to_string(&node).unwrap();

            prop_assert_eq!(crate::record::from_str(&text).unwrap(), node);
        }

        #[test]
        fn equal_trees_have_equal_records(node in any_tree()) {
            let copy = node.clone();

            prop_assert_eq!(serialize(&node), serialize(&copy));
            prop_assert_eq!(
                serde_json::to_string(&node).unwrap(),
                serde_json::to_string(&serialize(&copy)).unwrap()
            );
        }

        #[test]
        fn display_round_trip(node in printable_tree()) {
            let text = node.to_string();
            let got: Node = text.parse().unwrap();

            prop_assert_eq!(got, node, "{}", text);
        }

        #[test]
        fn depth_matches_the_record_nesting(node in any_tree()) {
            fn record_depth(record: &serde_json::Value) -> usize {
                let children = ["value", "left", "right"]
                    .iter()
                    .filter_map(|key| record.get(*key))
                    .filter(|child| child.is_object())
                    .map(record_depth)
                    .max()
                    .unwrap_or(0);

                children + 1
            }

            prop_assert_eq!(record_depth(&serialize(&node)), node.depth());
        }
    }
}
