//! The `Retain` / `Insert` / `Delete` operation algebra.
//!
//! An [`Operation`] is a finite, ordered, immutable sequence of [`Op`]s that
//! transforms one string into another. Its canonical form is what makes the
//! rest of the algebra (compose, transform, invert) well-defined:
//!
//! - no zero-length op,
//! - no two adjacent ops of the same variant (they are always merged),
//! - an `Insert` directly followed by a `Delete` is reordered so the `Insert`
//!   comes first (there is exactly one normal form per edit).
//!
//! Operations are built through [`crate::OperationBuilder`], which maintains
//! canonical form incrementally; there is no public constructor that can
//! produce a non-canonical `Operation`.

use serde::{Deserialize, Serialize};

/// A single primitive step of an [`Operation`].
///
/// All lengths are counted in UTF-16 code units (see [`crate::utf16`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Advance the cursor by `n` units, copying the input through to the output.
    Retain(usize),
    /// Emit `s` into the output at the current cursor position.
    Insert(String),
    /// Consume `n` units of input without producing output.
    Delete(usize),
}

impl Op {
    /// Length of this op in UTF-16 units (the number of units of input it
    /// consumes for `Retain`/`Delete`, or of output it produces for `Insert`).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Op::Retain(n) | Op::Delete(n) => *n,
            Op::Insert(s) => crate::utf16::len_utf16(s),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_retain(&self) -> bool {
        matches!(self, Op::Retain(_))
    }

    #[must_use]
    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert(_))
    }

    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete(_))
    }
}

/// An immutable, canonical sequence of [`Op`]s plus its derived lengths.
///
/// `base_length` is the number of UTF-16 units the operation requires of its
/// input (`Retain` + `Delete` counts); `target_length` is the number of units
/// it produces as output (`Retain` + `Insert` counts). Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub(crate) ops: Vec<Op>,
    base_length: usize,
    target_length: usize,
}

impl Operation {
    /// An operation over an empty document that produces an empty document.
    #[must_use]
    pub fn identity() -> Self {
        Operation {
            ops: Vec::new(),
            base_length: 0,
            target_length: 0,
        }
    }

    /// Construct directly from an already-canonical op list. Only exposed to
    /// sibling modules (builder, codec) that are responsible for maintaining
    /// the canonical-form invariant themselves.
    pub(crate) fn from_canonical_ops(ops: Vec<Op>) -> Self {
        let mut base_length = 0;
        let mut target_length = 0;
        for op in &ops {
            match op {
                Op::Retain(n) => {
                    base_length += n;
                    target_length += n;
                }
                Op::Delete(n) => base_length += n,
                Op::Insert(s) => target_length += crate::utf16::len_utf16(s),
            }
        }
        Operation {
            ops,
            base_length,
            target_length,
        }
    }

    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    #[must_use]
    pub fn base_length(&self) -> usize {
        self.base_length
    }

    #[must_use]
    pub fn target_length(&self) -> usize {
        self.target_length
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// `true` if this operation only retains (produces no visible change).
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.ops.iter().all(Op::is_retain)
    }

    /// Verifies the canonical-form invariants documented on the type.
    /// Exposed for tests and debug assertions at trust boundaries (e.g. the
    /// JSON codec feeding hand-authored input through the builder).
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        for op in &self.ops {
            if op.is_empty() {
                return false;
            }
        }
        for pair in self.ops.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let same_variant = matches!(
                (a, b),
                (Op::Retain(_), Op::Retain(_))
                    | (Op::Insert(_), Op::Insert(_))
                    | (Op::Delete(_), Op::Delete(_))
            );
            if same_variant {
                return false;
            }
            if a.is_delete() && b.is_insert() {
                // Delete must never be immediately followed by Insert; the
                // builder always reorders these so Insert precedes Delete.
                return false;
            }
        }
        true
    }
}
