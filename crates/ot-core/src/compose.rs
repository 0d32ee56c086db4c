//! Composing two sequential operations into one equivalent operation.

use crate::builder::OperationBuilder;
use crate::error::{OtError, Result};
use crate::op::{Op, Operation};
use crate::utf16::len_utf16;

/// Compose `a` followed by `b` into a single operation `c` such that, for any
/// document `d` with `len_utf16(d) == a.base_length()`:
///
/// ```text
/// apply(&apply(d, a)?, b)? == apply(d, c)?
/// ```
///
/// # Errors
/// [`OtError::ComposeLengthMismatch`] if `a.target_length() != b.base_length()`.
pub fn compose(a: &Operation, b: &Operation) -> Result<Operation> {
    if a.target_length() != b.base_length() {
        return Err(OtError::ComposeLengthMismatch {
            left_target: a.target_length(),
            right_base: b.base_length(),
        });
    }

    let mut builder = OperationBuilder::new();
    let mut a_ops = a.ops().iter().cloned();
    let mut b_ops = b.ops().iter().cloned();
    let mut a_op = a_ops.next();
    let mut b_op = b_ops.next();

    loop {
        match (a_op.take(), b_op.take()) {
            (None, None) => break,

            // `a` is exhausted; everything left in `b` must be pure Insert
            // (there is no more `a`-output left to Retain/Delete against).
            (None, Some(Op::Insert(s))) => {
                builder.insert(s);
                b_op = b_ops.next();
            }
            (None, Some(_)) => {
                return Err(OtError::MalformedOperation(
                    "compose: right operand runs past left operand's output".into(),
                ));
            }

            // `b` is exhausted; everything left in `a` must be pure Delete
            // (nothing further consumes `a`'s remaining output).
            (Some(Op::Delete(n)), None) => {
                builder.delete(n);
                a_op = a_ops.next();
            }
            (Some(_), None) => {
                return Err(OtError::MalformedOperation(
                    "compose: left operand's output runs past right operand's input".into(),
                ));
            }

            // `a`'s Delete never touches `b` — emit and keep going.
            (Some(Op::Delete(n)), b_rest) => {
                builder.delete(n);
                a_op = a_ops.next();
                b_op = b_rest;
            }

            // `b`'s Insert never touches `a` — emit and keep going.
            (a_rest, Some(Op::Insert(s))) => {
                builder.insert(s);
                a_op = a_rest;
                b_op = b_ops.next();
            }

            (Some(Op::Retain(an)), Some(Op::Retain(bn))) => {
                let min = an.min(bn);
                builder.retain(min);
                a_op = remainder(Op::Retain(an), min, &mut a_ops);
                b_op = remainder(Op::Retain(bn), min, &mut b_ops);
            }

            (Some(Op::Retain(an)), Some(Op::Delete(bn))) => {
                let min = an.min(bn);
                builder.delete(min);
                a_op = remainder(Op::Retain(an), min, &mut a_ops);
                b_op = remainder(Op::Delete(bn), min, &mut b_ops);
            }

            (Some(Op::Insert(s)), Some(Op::Retain(bn))) => {
                let slen = len_utf16(&s);
                let min = slen.min(bn);
                builder.insert(take_utf16_prefix(&s, min));
                a_op = remainder_insert(&s, min, &mut a_ops);
                b_op = remainder(Op::Retain(bn), min, &mut b_ops);
            }

            (Some(Op::Insert(s)), Some(Op::Delete(bn))) => {
                // `b` deletes text that `a` just inserted: cancels out, emits nothing.
                let slen = len_utf16(&s);
                let min = slen.min(bn);
                a_op = remainder_insert(&s, min, &mut a_ops);
                b_op = remainder(Op::Delete(bn), min, &mut b_ops);
            }
        }
    }

    Ok(builder.build())
}

/// Whatever of `op` (length `len`, already partially consumed by `used`
/// units) remains after taking `used` units, pulled forward from `rest` if
/// fully consumed.
fn remainder(op: Op, used: usize, rest: &mut impl Iterator<Item = Op>) -> Option<Op> {
    let total = op.len();
    if used < total {
        match op {
            Op::Retain(_) => Some(Op::Retain(total - used)),
            Op::Delete(_) => Some(Op::Delete(total - used)),
            Op::Insert(_) => unreachable!("Insert remainder handled by remainder_insert"),
        }
    } else {
        rest.next()
    }
}

fn remainder_insert(s: &str, used_units: usize, rest: &mut impl Iterator<Item = Op>) -> Option<Op> {
    let total = len_utf16(s);
    if used_units < total {
        Some(Op::Insert(crate::utf16::slice_utf16(s, used_units, total)))
    } else {
        rest.next()
    }
}

fn take_utf16_prefix(s: &str, units: usize) -> String {
    crate::utf16::slice_utf16(s, 0, units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::OperationBuilder;

    #[test]
    fn compose_matches_sequential_apply() {
        let doc = "hello world";
        let a = OperationBuilder::new().retain(5).insert(",").retain(6).build();
        let b = OperationBuilder::new().delete(1).retain(5).insert("!").retain(6).build();
        let c = compose(&a, &b).unwrap();

        let via_sequential = apply(&apply(doc, &a).unwrap(), &b).unwrap();
        let via_compose = apply(doc, &c).unwrap();
        assert_eq!(via_sequential, via_compose);
    }

    #[test]
    fn compose_cancels_insert_then_delete() {
        let doc = "ab";
        let a = OperationBuilder::new().retain(1).insert("XYZ").retain(1).build();
        let b = OperationBuilder::new().retain(1).delete(3).retain(1).build();
        let c = compose(&a, &b).unwrap();
        assert_eq!(apply(doc, &c).unwrap(), doc);
    }

    #[test]
    fn compose_rejects_length_mismatch() {
        let a = OperationBuilder::new().retain(3).build();
        let b = OperationBuilder::new().retain(5).build();
        assert!(matches!(
            compose(&a, &b),
            Err(OtError::ComposeLengthMismatch { .. })
        ));
    }
}
