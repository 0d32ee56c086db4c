//! Incremental, canonicalizing construction of [`Operation`]s.

use crate::op::{Op, Operation};

/// Accumulates a sequence of `retain`/`insert`/`delete` calls into a
/// canonical [`Operation`].
///
/// The builder is the only way to produce an `Operation`: every public
/// constructor (codec, compose, transform) goes through it, which is what
/// lets [`Operation::is_canonical`] be an invariant rather than something
/// callers have to remember to check.
///
/// Calls with zero length (`retain(0)`, `insert("")`, `delete(0)`) are no-ops.
/// Adjacent same-variant ops are merged as they're pushed. An `Insert`
/// appended right after a `Delete` is spliced in *before* that `Delete`,
/// preserving the Insert-precedes-Delete normal form.
#[derive(Debug, Default, Clone)]
pub struct OperationBuilder {
    ops: Vec<Op>,
}

impl OperationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Retain `n` units, copying them unchanged from input to output.
    pub fn retain(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        if let Some(Op::Retain(last)) = self.ops.last_mut() {
            *last += n;
        } else {
            self.ops.push(Op::Retain(n));
        }
        self
    }

    /// Insert `s` at the current cursor.
    pub fn insert(&mut self, s: impl Into<String>) -> &mut Self {
        let s = s.into();
        if s.is_empty() {
            return self;
        }
        match self.ops.last_mut() {
            Some(Op::Insert(last)) => {
                last.push_str(&s);
            }
            Some(Op::Delete(_)) => {
                // An Insert must never trail a Delete: splice it in just
                // before, merging with an earlier Insert if one precedes the
                // Delete (`..., Insert(a), Delete(d)` + insert(b) => `...,
                // Insert(a+b), Delete(d)`).
                let len = self.ops.len();
                if len >= 2 {
                    if let Op::Insert(earlier) = &mut self.ops[len - 2] {
                        earlier.push_str(&s);
                        return self;
                    }
                }
                self.ops.insert(len - 1, Op::Insert(s));
            }
            _ => self.ops.push(Op::Insert(s)),
        }
        self
    }

    /// Delete `n` units of input, producing no output.
    pub fn delete(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        if let Some(Op::Delete(last)) = self.ops.last_mut() {
            *last += n;
        } else {
            self.ops.push(Op::Delete(n));
        }
        self
    }

    /// Append a pre-built op, dispatching to the appropriate canonicalizing
    /// method. Used by [`crate::codec`] and [`crate::transform`].
    pub fn push_op(&mut self, op: Op) -> &mut Self {
        match op {
            Op::Retain(n) => self.retain(n),
            Op::Insert(s) => self.insert(s),
            Op::Delete(n) => self.delete(n),
        }
    }

    /// Produce the finished canonical [`Operation`], leaving the builder
    /// empty. Takes `&mut self` (rather than consuming) so it chains
    /// directly off the `&mut Self`-returning calls above, e.g.
    /// `OperationBuilder::new().retain(5).insert("x").build()`.
    #[must_use]
    pub fn build(&mut self) -> Operation {
        Operation::from_canonical_ops(std::mem::take(&mut self.ops))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_same_variant() {
        let op = OperationBuilder::new()
            .retain(2)
            .retain(3)
            .insert("a")
            .insert("b")
            .build();
        assert!(op.is_canonical());
        assert_eq!(op.ops(), &[Op::Retain(5), Op::Insert("ab".into())]);
    }

    #[test]
    fn insert_after_delete_is_reordered_before_it() {
        let mut b = OperationBuilder::new();
        b.delete(3);
        b.insert("x");
        let op = b.build();
        assert!(op.is_canonical());
        assert_eq!(op.ops(), &[Op::Insert("x".into()), Op::Delete(3)]);
    }

    #[test]
    fn insert_after_delete_merges_with_earlier_insert() {
        let mut b = OperationBuilder::new();
        b.insert("a");
        b.delete(2);
        b.insert("b");
        let op = b.build();
        assert!(op.is_canonical());
        assert_eq!(op.ops(), &[Op::Insert("ab".into()), Op::Delete(2)]);
    }

    #[test]
    fn zero_length_calls_are_noops() {
        let op = OperationBuilder::new()
            .retain(0)
            .insert("")
            .delete(0)
            .retain(4)
            .build();
        assert_eq!(op.ops(), &[Op::Retain(4)]);
    }
}
