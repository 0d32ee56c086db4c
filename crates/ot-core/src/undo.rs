//! Per-client undo/redo stacks.
//!
//! An [`UndoManager`] tracks operations a single client originated, in the
//! order it originated them, so it can invert and reapply them on request.
//! It does not hold a document itself — callers pass the current text in
//! when undoing/redoing, and get back the operation to apply.
//!
//! Remote operations (from other clients) never go on these stacks, but they
//! do change the document underneath them, so every stack entry has to be
//! transformed against each remote op as it arrives ([`UndoManager::account_for_remote`])
//! to stay valid against the document's current state. This is what lets undo
//! correctly "cross" a remote edit instead of corrupting the document.

use thiserror::Error;

use crate::apply::invert;
use crate::op::Operation;
use crate::transform::transform;

/// What an [`UndoManager`] is currently doing, so that operations it
/// generates aren't mistaken for fresh user edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndoMode {
    /// Not currently undoing or redoing; new operations pushed via
    /// [`UndoManager::push`] are ordinary edits.
    #[default]
    Normal,
    /// An undo is in flight; the compensating operation belongs on the redo
    /// stack, not the undo stack.
    Undoing,
    /// A redo is in flight; the compensating operation belongs back on the
    /// undo stack.
    Redoing,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UndoError {
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error(transparent)]
    Ot(#[from] crate::error::OtError),
}

/// Per-client undo/redo history, bounded to `stack_limit` entries each.
#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<Operation>,
    redo_stack: Vec<Operation>,
    mode: UndoMode,
    stack_limit: usize,
}

impl UndoManager {
    #[must_use]
    pub fn new(stack_limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            mode: UndoMode::Normal,
            stack_limit,
        }
    }

    #[must_use]
    pub fn mode(&self) -> UndoMode {
        self.mode
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Record `op` as an edit this client just made against `pre_image`
    /// (the document text immediately before `op` was applied).
    ///
    /// Composes with the top of the undo stack when [`should_compose_with`]
    /// says the pair reads as one logical edit (e.g. consecutive single-key
    /// inserts), rather than growing the stack by one entry per keystroke.
    pub fn push(&mut self, op: Operation) {
        match self.mode {
            UndoMode::Normal => {
                self.redo_stack.clear();
                push_composing(&mut self.undo_stack, op, self.stack_limit);
            }
            UndoMode::Undoing => {
                push_composing(&mut self.redo_stack, op, self.stack_limit);
            }
            UndoMode::Redoing => {
                push_composing(&mut self.undo_stack, op, self.stack_limit);
            }
        }
    }

    /// Pop the most recent undo-stack entry, invert it against `current_text`,
    /// and return the inverse to apply. The caller is responsible for
    /// actually applying it and then calling [`UndoManager::push`] with the
    /// result while [`UndoManager::mode`] reads [`UndoMode::Undoing`].
    pub fn begin_undo(&mut self, current_text: &str) -> Result<Operation, UndoError> {
        let op = self.undo_stack.pop().ok_or(UndoError::NothingToUndo)?;
        self.mode = UndoMode::Undoing;
        match invert(&op, current_text) {
            Ok(inverse) => Ok(inverse),
            Err(e) => {
                self.undo_stack.push(op);
                self.mode = UndoMode::Normal;
                Err(e.into())
            }
        }
    }

    /// Symmetric to [`UndoManager::begin_undo`], popping the redo stack.
    pub fn begin_redo(&mut self, current_text: &str) -> Result<Operation, UndoError> {
        let op = self.redo_stack.pop().ok_or(UndoError::NothingToRedo)?;
        self.mode = UndoMode::Redoing;
        match invert(&op, current_text) {
            Ok(inverse) => Ok(inverse),
            Err(e) => {
                self.redo_stack.push(op);
                self.mode = UndoMode::Normal;
                Err(e.into())
            }
        }
    }

    /// Call once the operation returned by `begin_undo`/`begin_redo` has been
    /// applied and pushed back via [`UndoManager::push`], to return to
    /// [`UndoMode::Normal`].
    pub fn end_undo_redo(&mut self) {
        self.mode = UndoMode::Normal;
    }

    /// Transform every entry on both stacks against a remote operation `op`
    /// that has just been applied to the document, so they remain valid
    /// operations against the document's new state.
    ///
    /// Must be called for every remote operation, in the order it was
    /// applied, before any further undo/redo is attempted.
    pub fn account_for_remote(&mut self, op: &Operation) -> Result<(), UndoError> {
        for stack in [&mut self.undo_stack, &mut self.redo_stack] {
            let mut transformed = Vec::with_capacity(stack.len());
            let mut remote = op.clone();
            for entry in stack.drain(..) {
                let (entry_prime, remote_prime) = transform(&entry, &remote)?;
                transformed.push(entry_prime);
                remote = remote_prime;
            }
            *stack = transformed;
        }
        Ok(())
    }
}

/// Push `op` onto `stack`, merging it into the top entry when
/// [`should_compose_with`] approves, and evicting the oldest entry once
/// `limit` is exceeded.
fn push_composing(stack: &mut Vec<Operation>, op: Operation, limit: usize) {
    if let Some(top) = stack.last() {
        if should_compose_with(top, &op) {
            if let Ok(composed) = crate::compose::compose(top, &op) {
                *stack.last_mut().unwrap() = composed;
                return;
            }
        }
    }
    stack.push(op);
    if stack.len() > limit {
        stack.remove(0);
    }
}

/// Heuristic deciding whether two consecutive same-client operations read as
/// one logical edit for undo purposes, rather than two the user would expect
/// to step through separately.
///
/// Mirrors the common ot.js-family heuristic: a run of single-character
/// inserts, or a run of same-direction single-unit deletes, composes into one
/// undo step; anything involving a multi-character paste, a direction change,
/// or any retain gap, starts a new step.
#[must_use]
pub fn should_compose_with(first: &Operation, second: &Operation) -> bool {
    use crate::op::Op;

    if first.target_length() != second.base_length() {
        return false;
    }

    // (start, end) of the single insert/delete in `op`, if `op` is shaped as
    // an optional leading Retain followed by exactly one Insert or Delete.
    let simple_span = |op: &Operation, want_insert: bool| -> Option<(usize, usize)> {
        let (pos, step) = match op.ops() {
            [Op::Retain(p), step] => (*p, step),
            [step] => (0, step),
            _ => return None,
        };
        match step {
            Op::Insert(s) if want_insert => Some((pos, pos + crate::utf16::len_utf16(s))),
            Op::Delete(n) if !want_insert => Some((pos, pos + n)),
            _ => None,
        }
    };

    if let (Some((_, a_end)), Some((b_start, _))) =
        (simple_span(first, true), simple_span(second, true))
    {
        return a_end == b_start;
    }
    if let (Some((a_start, _)), Some((b_start, _))) =
        (simple_span(first, false), simple_span(second, false))
    {
        // Backspacing repeatedly deletes at the same position; this only
        // recognizes that case, not forward-deleting with the Delete key.
        return a_start == b_start;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::apply;
    use crate::OperationBuilder;

    #[test]
    fn undo_reverts_single_op() {
        let mut mgr = UndoManager::new(100);
        let doc = "hello";
        let op = OperationBuilder::new().retain(5).insert(" world").build();
        let after = apply(doc, &op).unwrap();
        mgr.push(op);

        let undo_op = mgr.begin_undo(&after).unwrap();
        let reverted = apply(&after, &undo_op).unwrap();
        assert_eq!(reverted, doc);
        mgr.push(undo_op);
        mgr.end_undo_redo();
        assert!(mgr.can_redo());
    }

    #[test]
    fn undo_crosses_remote_op() {
        // Client types "world" at the end of "hello "; concurrently another
        // client inserts "X" at the very start. Undo must still remove
        // exactly "world", not corrupt the shared prefix.
        let mut mgr = UndoManager::new(100);
        let base = "hello ";
        let local = OperationBuilder::new().retain(6).insert("world").build();
        let after_local = apply(base, &local).unwrap();
        mgr.push(local.clone());

        let remote = OperationBuilder::new().insert("X").retain(6).build();
        mgr.account_for_remote(&remote).unwrap();
        let after_both = apply(&after_local, &remote).unwrap();
        assert_eq!(after_both, "Xhello world");

        let undo_op = mgr.begin_undo(&after_both).unwrap();
        let reverted = apply(&after_both, &undo_op).unwrap();
        assert_eq!(reverted, "Xhello ");
    }

    #[test]
    fn empty_undo_stack_errors() {
        let mut mgr = UndoManager::new(10);
        assert!(matches!(
            mgr.begin_undo("anything"),
            Err(UndoError::NothingToUndo)
        ));
    }

    #[test]
    fn consecutive_single_char_inserts_compose() {
        let mut mgr = UndoManager::new(10);
        let op1 = OperationBuilder::new().retain(0).insert("a").build();
        let op2 = OperationBuilder::new().retain(1).insert("b").build();
        mgr.push(op1);
        mgr.push(op2);
        assert_eq!(mgr.undo_stack.len(), 1);
    }
}
