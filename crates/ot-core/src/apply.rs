//! Applying an [`Operation`] to a string, and inverting it.

use crate::builder::OperationBuilder;
use crate::error::{OtError, Result};
use crate::op::{Op, Operation};
use crate::utf16::{len_utf16, slice_utf16};

/// Apply `op` to `doc`, producing the resulting string.
///
/// Walks `doc` in UTF-16 units, copying retained slices through, splicing in
/// inserted text, and skipping deleted ranges.
///
/// # Errors
/// [`OtError::InvalidBaseLength`] if `op.base_length() != utf16 length of doc`.
/// [`OtError::MalformedOperation`] if a `Retain`/`Delete` runs past the end of
/// `doc` (which cannot happen once the base-length check above has passed,
/// but is checked defensively per-op to keep the walk panic-free).
pub fn apply(doc: &str, op: &Operation) -> Result<String> {
    let doc_len = len_utf16(doc);
    if op.base_length() != doc_len {
        return Err(OtError::InvalidBaseLength {
            expected: op.base_length(),
            actual: doc_len,
        });
    }

    let mut out = String::with_capacity(doc.len().max(op.target_length()));
    let mut cursor = 0usize;
    for step in op.ops() {
        match step {
            Op::Retain(n) => {
                if cursor + n > doc_len {
                    return Err(OtError::MalformedOperation(format!(
                        "retain of {n} units at cursor {cursor} runs past document end {doc_len}"
                    )));
                }
                out.push_str(&slice_utf16(doc, cursor, cursor + n));
                cursor += n;
            }
            Op::Insert(s) => out.push_str(s),
            Op::Delete(n) => {
                if cursor + n > doc_len {
                    return Err(OtError::MalformedOperation(format!(
                        "delete of {n} units at cursor {cursor} runs past document end {doc_len}"
                    )));
                }
                cursor += n;
            }
        }
    }
    Ok(out)
}

/// Produce `op`'s inverse with respect to the pre-image text `doc`, such that
/// `apply(&apply(doc, op)?, &invert(op, doc)?)? == doc`.
///
/// Retains stay Retains; Inserts become Deletes of the same length; Deletes
/// become Inserts of the substring of `doc` they consumed.
///
/// # Errors
/// [`OtError::InvalidBaseLength`] under the same condition as [`apply`].
pub fn invert(op: &Operation, doc: &str) -> Result<Operation> {
    let doc_len = len_utf16(doc);
    if op.base_length() != doc_len {
        return Err(OtError::InvalidBaseLength {
            expected: op.base_length(),
            actual: doc_len,
        });
    }

    let mut builder = OperationBuilder::new();
    let mut cursor = 0usize;
    for step in op.ops() {
        match step {
            Op::Retain(n) => {
                builder.retain(*n);
                cursor += n;
            }
            Op::Insert(s) => {
                builder.delete(len_utf16(s));
            }
            Op::Delete(n) => {
                builder.insert(slice_utf16(doc, cursor, cursor + n));
                cursor += n;
            }
        }
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationBuilder;

    #[test]
    fn apply_insert_retain_delete() {
        let op = OperationBuilder::new()
            .retain(2)
            .insert("XY")
            .delete(3)
            .retain(1)
            .build();
        assert_eq!(apply("helloworld", &op).unwrap(), "heXYrld");
    }

    #[test]
    fn apply_rejects_wrong_base_length() {
        let op = OperationBuilder::new().retain(5).build();
        assert!(matches!(
            apply("hi", &op),
            Err(OtError::InvalidBaseLength { .. })
        ));
    }

    #[test]
    fn invert_round_trips() {
        let doc = "hello world";
        let op = OperationBuilder::new()
            .retain(6)
            .insert("brave ")
            .delete(5)
            .build();
        let applied = apply(doc, &op).unwrap();
        let inv = invert(&op, doc).unwrap();
        assert_eq!(apply(&applied, &inv).unwrap(), doc);
    }
}
