//! Transforming two concurrent operations against one another (the heart of OT).

use crate::builder::OperationBuilder;
use crate::error::{OtError, Result};
use crate::op::Op;
use crate::op::Operation;

/// Given two operations `a` and `b` that both apply to the same base
/// document (`a.base_length() == b.base_length()`), produce `(a', b')` such
/// that applying `a` then `b'` yields the same document as applying `b` then
/// `a'`:
///
/// ```text
/// apply(&apply(doc, a)?, b')? == apply(&apply(doc, b)?, a')?
/// ```
///
/// Ties between a concurrent `Insert` in `a` and one in `b` are broken by
/// giving `a`'s insert priority (it ends up first in the merged output) —
/// callers that need a different tie-break (e.g. client id ordering) should
/// pre-order which operand is passed as `a`.
///
/// # Errors
/// [`OtError::TransformLengthMismatch`] if the two operations don't share a
/// base length.
pub fn transform(a: &Operation, b: &Operation) -> Result<(Operation, Operation)> {
    if a.base_length() != b.base_length() {
        return Err(OtError::TransformLengthMismatch {
            left_base: a.base_length(),
            right_base: b.base_length(),
        });
    }

    let mut a_prime = OperationBuilder::new();
    let mut b_prime = OperationBuilder::new();

    let mut a_ops = a.ops().iter().cloned();
    let mut b_ops = b.ops().iter().cloned();
    let mut a_op = a_ops.next();
    let mut b_op = b_ops.next();

    loop {
        match (a_op.take(), b_op.take()) {
            (None, None) => break,

            // a's insert has no counterpart position in b yet: pass through
            // to a', and b' must retain over it so the insert survives.
            (Some(Op::Insert(s)), b_rest) => {
                let n = crate::utf16::len_utf16(&s);
                a_prime.insert(s);
                b_prime.retain(n);
                a_op = a_ops.next();
                b_op = b_rest;
            }
            (a_rest, Some(Op::Insert(s))) => {
                let n = crate::utf16::len_utf16(&s);
                b_prime.insert(s);
                a_prime.retain(n);
                a_op = a_rest;
                b_op = b_ops.next();
            }

            (None, Some(op)) | (Some(op), None) => {
                return Err(OtError::MalformedOperation(format!(
                    "transform: operand exhausted early at {op:?}"
                )));
            }

            (Some(Op::Retain(an)), Some(Op::Retain(bn))) => {
                let min = an.min(bn);
                a_prime.retain(min);
                b_prime.retain(min);
                a_op = retain_remainder(an, min, &mut a_ops);
                b_op = retain_remainder(bn, min, &mut b_ops);
            }

            (Some(Op::Delete(an)), Some(Op::Delete(bn))) => {
                // Both sides delete the same range: neither op survives it.
                let min = an.min(bn);
                a_op = delete_remainder(an, min, &mut a_ops);
                b_op = delete_remainder(bn, min, &mut b_ops);
            }

            (Some(Op::Delete(an)), Some(Op::Retain(bn))) => {
                let min = an.min(bn);
                a_prime.delete(min);
                a_op = delete_remainder(an, min, &mut a_ops);
                b_op = retain_remainder(bn, min, &mut b_ops);
            }

            (Some(Op::Retain(an)), Some(Op::Delete(bn))) => {
                let min = an.min(bn);
                b_prime.delete(min);
                a_op = retain_remainder(an, min, &mut a_ops);
                b_op = delete_remainder(bn, min, &mut b_ops);
            }
        }
    }

    Ok((a_prime.build(), b_prime.build()))
}

fn retain_remainder(total: usize, used: usize, rest: &mut impl Iterator<Item = Op>) -> Option<Op> {
    if used < total {
        Some(Op::Retain(total - used))
    } else {
        rest.next()
    }
}

fn delete_remainder(total: usize, used: usize, rest: &mut impl Iterator<Item = Op>) -> Option<Op> {
    if used < total {
        Some(Op::Delete(total - used))
    } else {
        rest.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::OperationBuilder;

    #[test]
    fn convergence_on_concurrent_inserts() {
        let doc = "ab";
        let a = OperationBuilder::new().retain(1).insert("X").retain(1).build();
        let b = OperationBuilder::new().retain(2).insert("Y").build();
        let (a_prime, b_prime) = transform(&a, &b).unwrap();

        let via_a_first = apply(&apply(doc, &a).unwrap(), &b_prime).unwrap();
        let via_b_first = apply(&apply(doc, &b).unwrap(), &a_prime).unwrap();
        assert_eq!(via_a_first, via_b_first);
        assert_eq!(via_a_first, "aXbY");
    }

    #[test]
    fn convergence_on_insert_delete_overlap() {
        let doc = "hello";
        let a = OperationBuilder::new().delete(5).build();
        let b = OperationBuilder::new().retain(2).insert("Z").retain(3).build();
        let (a_prime, b_prime) = transform(&a, &b).unwrap();

        let via_a_first = apply(&apply(doc, &a).unwrap(), &b_prime).unwrap();
        let via_b_first = apply(&apply(doc, &b).unwrap(), &a_prime).unwrap();
        assert_eq!(via_a_first, via_b_first);
        assert_eq!(via_a_first, "Z");
    }

    #[test]
    fn rejects_base_length_mismatch() {
        let a = OperationBuilder::new().retain(3).build();
        let b = OperationBuilder::new().retain(5).build();
        assert!(matches!(
            transform(&a, &b),
            Err(OtError::TransformLengthMismatch { .. })
        ));
    }
}
