//! Property-based tests for the operation algebra's convergence guarantees.

use ot_core::utf16::len_utf16;
use ot_core::{apply, compose, invert, transform, Operation, OperationBuilder};
use proptest::prelude::*;

/// Generates an arbitrary canonical [`Operation`] with the given base length,
/// by repeatedly choosing retain/insert/delete steps that stay within bounds.
fn op_strategy(base_len: usize) -> impl Strategy<Value = Operation> {
    #[derive(Debug, Clone)]
    enum Step {
        Retain(usize),
        Insert(String),
        Delete(usize),
    }

    let step = prop_oneof![
        (1usize..8).prop_map(Step::Retain),
        "[a-zA-Z0-9]{1,6}".prop_map(Step::Insert),
        (1usize..6).prop_map(Step::Delete),
    ];

    prop::collection::vec(step, 0..12).prop_map(move |steps| {
        let mut builder = OperationBuilder::new();
        let mut remaining = base_len;
        for step in steps {
            match step {
                Step::Retain(n) => {
                    let n = n.min(remaining);
                    if n > 0 {
                        builder.retain(n);
                        remaining -= n;
                    }
                }
                Step::Insert(s) => {
                    builder.insert(s);
                }
                Step::Delete(n) => {
                    let n = n.min(remaining);
                    if n > 0 {
                        builder.delete(n);
                        remaining -= n;
                    }
                }
            }
        }
        builder.retain(remaining);
        builder.build()
    })
}

/// A document string paired with one arbitrary operation whose base length
/// matches it.
fn doc_and_op() -> impl Strategy<Value = (String, Operation)> {
    "[a-zA-Z0-9 ]{0,24}"
        .prop_flat_map(|doc| {
            let base_len = len_utf16(&doc);
            (Just(doc), op_strategy(base_len))
        })
}

/// A document string paired with two arbitrary, independently generated
/// operations that both share its base length — the shape `transform` needs.
fn doc_and_two_ops() -> impl Strategy<Value = (String, Operation, Operation)> {
    "[a-zA-Z0-9 ]{0,24}"
        .prop_flat_map(|doc| {
            let base_len = len_utf16(&doc);
            (Just(doc), op_strategy(base_len), op_strategy(base_len))
        })
}

/// A document paired with two *sequential* operations: `a` applies to `doc`,
/// and `b` applies to whatever `a` produces — the shape `compose` needs.
fn doc_and_sequential_ops() -> impl Strategy<Value = (String, Operation, Operation)> {
    "[a-zA-Z0-9 ]{0,24}"
        .prop_flat_map(|doc| (Just(doc.clone()), op_strategy(len_utf16(&doc))))
        .prop_flat_map(|(doc, a)| {
            let after_a = apply(&doc, &a).unwrap();
            (Just(doc), Just(a), op_strategy(len_utf16(&after_a)))
        })
}

proptest! {
    /// `apply(doc, op)` always succeeds and produces a string of
    /// `op.target_length()` UTF-16 units, for any canonical `op` whose base
    /// length matches `doc`.
    #[test]
    fn apply_produces_target_length((doc, op) in doc_and_op()) {
        let result = apply(&doc, &op).unwrap();
        prop_assert_eq!(len_utf16(&result), op.target_length());
    }

    /// Inverting an operation and applying the inverse to its own output
    /// always reconstructs the original document.
    #[test]
    fn invert_round_trips((doc, op) in doc_and_op()) {
        let applied = apply(&doc, &op).unwrap();
        let inverse = invert(&op, &doc).unwrap();
        let reverted = apply(&applied, &inverse).unwrap();
        prop_assert_eq!(reverted, doc);
    }

    /// Composing two sequential operations (the second generated against the
    /// first's output) yields the same result as applying them one after
    /// another.
    #[test]
    fn compose_matches_sequential_apply((doc, a, b) in doc_and_sequential_ops()) {
        let after_a = apply(&doc, &a).unwrap();
        let c = compose(&a, &b).unwrap();

        let via_sequential = apply(&after_a, &b).unwrap();
        let via_compose = apply(&doc, &c).unwrap();
        prop_assert_eq!(via_sequential, via_compose);
    }

    /// Concurrent operations transformed against each other converge to the
    /// same document regardless of application order.
    #[test]
    fn transform_converges((doc, a, b) in doc_and_two_ops()) {
        let (a_prime, b_prime) = transform(&a, &b).unwrap();

        let via_a_first = apply(&apply(&doc, &a).unwrap(), &b_prime).unwrap();
        let via_b_first = apply(&apply(&doc, &b).unwrap(), &a_prime).unwrap();
        prop_assert_eq!(via_a_first, via_b_first);
    }

    /// JSON wire-encoding an operation and decoding it back produces an
    /// operation with identical semantics (same apply result).
    #[test]
    fn codec_round_trips((doc, op) in doc_and_op()) {
        let json = ot_core::to_json(&op);
        let decoded = ot_core::from_json(&json).unwrap();
        prop_assert_eq!(apply(&doc, &op).unwrap(), apply(&doc, &decoded).unwrap());
    }

    /// The builder never produces a non-canonical operation, however its
    /// calls are ordered.
    #[test]
    fn builder_output_is_always_canonical((_doc, op) in doc_and_op()) {
        prop_assert!(op.is_canonical());
    }
}
