//! Document backends: pluggable storage for the text an [`Operation`] applies to.
//!
//! [`FlatDocument`] stores the text as a single `String` and is the right
//! default for small-to-medium documents. [`RopeDocument`] stores it as a
//! [`jumprope::JumpRope`], giving sublinear splice costs for large documents
//! at the cost of a less cache-friendly representation. Both implement
//! [`Document`], so an [`crate::undo::UndoManager`] or session layer can be
//! generic over which backend it holds.

use jumprope::JumpRope;

use crate::apply::apply;
use crate::error::{OtError, Result};
use crate::op::{Op, Operation};
use crate::utf16::len_utf16;

/// A mutable text buffer that [`Operation`]s can be applied to.
pub trait Document {
    /// The document's current contents as a contiguous string.
    ///
    /// For [`RopeDocument`] this copies the whole rope; prefer it only where
    /// a full string is genuinely needed (e.g. producing a snapshot).
    fn text(&self) -> String;

    /// Current length in UTF-16 units, matching [`Operation::base_length`].
    fn len_utf16(&self) -> usize;

    /// Apply `op` in place, replacing the document's contents with the result.
    ///
    /// # Errors
    /// Propagates [`crate::OtError::InvalidBaseLength`] /
    /// [`crate::OtError::MalformedOperation`] from [`apply`].
    fn apply(&mut self, op: &Operation) -> Result<()>;
}

/// A document backend storing text as a single `String`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatDocument {
    text: String,
}

impl FlatDocument {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Document for FlatDocument {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn len_utf16(&self) -> usize {
        len_utf16(&self.text)
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        self.text = apply(&self.text, op)?;
        Ok(())
    }
}

/// A document backend storing text as a [`JumpRope`], for large documents
/// that see many localized edits.
///
/// `utf16_len` is maintained incrementally alongside the rope rather than
/// recomputed from a `to_string()` on every read, so `len_utf16` and the
/// base-length check in `apply` are both O(1).
#[derive(Debug, Clone, Default)]
pub struct RopeDocument {
    rope: JumpRope,
    utf16_len: usize,
}

impl RopeDocument {
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        let text = text.as_ref();
        Self {
            rope: JumpRope::from(text),
            utf16_len: len_utf16(text),
        }
    }

    /// Whether every character seen so far fits in the Basic Multilingual
    /// Plane, i.e. each one occupies exactly one UTF-16 unit. When this
    /// holds, UTF-16 offsets and the rope's native char offsets coincide and
    /// `op.ops()` can be spliced straight onto `self.rope`.
    fn is_bmp_only(&self) -> bool {
        self.utf16_len == self.rope.len_chars()
    }

    /// Splice `op` directly onto the rope using its own char-indexed
    /// `insert`/`remove`, valid as long as [`Self::is_bmp_only`] held going
    /// in. `cursor` tracks a position in the *live* rope: `Retain` and
    /// `Delete` measure UTF-16 units against the pre-image, which coincide
    /// with char units under the BMP-only precondition; `Insert` advances by
    /// the inserted text's own char count, since what it inserts may not be
    /// BMP-only itself.
    fn apply_bmp_fast_path(&mut self, op: &Operation) -> Result<()> {
        let mut cursor = 0usize;
        let mut utf16_delta: i64 = 0;
        for step in op.ops() {
            match step {
                Op::Retain(n) => cursor += n,
                Op::Insert(s) => {
                    self.rope.insert(cursor, s);
                    cursor += s.chars().count();
                    utf16_delta += len_utf16(s) as i64;
                }
                Op::Delete(n) => {
                    self.rope.remove(cursor..cursor + n);
                    utf16_delta -= *n as i64;
                }
            }
        }
        self.utf16_len = (self.utf16_len as i64 + utf16_delta)
            .try_into()
            .map_err(|_| OtError::MalformedOperation("operation deleted past document end".into()))?;
        Ok(())
    }
}

impl Document for RopeDocument {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn len_utf16(&self) -> usize {
        self.utf16_len
    }

    fn apply(&mut self, op: &Operation) -> Result<()> {
        if op.base_length() != self.utf16_len {
            return Err(OtError::InvalidBaseLength {
                expected: op.base_length(),
                actual: self.utf16_len,
            });
        }

        if self.is_bmp_only() {
            return self.apply_bmp_fast_path(op);
        }

        // At least one astral-plane character is present somewhere in the
        // document, so UTF-16 and char offsets can diverge mid-document;
        // fall back to the flat-string algorithm for correctness.
        let text = apply(&self.rope.to_string(), op)?;
        self.utf16_len = len_utf16(&text);
        self.rope = JumpRope::from(text.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationBuilder;

    #[test]
    fn flat_document_applies_in_place() {
        let mut doc = FlatDocument::new("hello");
        let op = OperationBuilder::new().retain(5).insert(" world").build();
        doc.apply(&op).unwrap();
        assert_eq!(doc.text(), "hello world");
    }

    #[test]
    fn rope_document_applies_in_place() {
        let mut doc = RopeDocument::new("hello");
        let op = OperationBuilder::new().retain(5).insert(" world").build();
        doc.apply(&op).unwrap();
        assert_eq!(doc.text(), "hello world");
    }

    #[test]
    fn len_utf16_tracks_astral_characters() {
        let doc = FlatDocument::new("a\u{1F600}b");
        assert_eq!(doc.len_utf16(), 4);
    }

    #[test]
    fn rope_document_splices_without_materializing_whole_text() {
        let mut doc = RopeDocument::new("hello world");
        let op = OperationBuilder::new()
            .retain(6)
            .delete(5)
            .insert("rust")
            .build();
        doc.apply(&op).unwrap();
        assert_eq!(doc.text(), "hello rust");
        assert_eq!(doc.len_utf16(), 10);
    }

    #[test]
    fn rope_document_tracks_len_incrementally_across_edits() {
        let mut doc = RopeDocument::new("abc");
        doc.apply(&OperationBuilder::new().retain(3).insert("def").build())
            .unwrap();
        assert_eq!(doc.len_utf16(), 6);
        doc.apply(&OperationBuilder::new().delete(2).retain(4).build())
            .unwrap();
        assert_eq!(doc.len_utf16(), 4);
        assert_eq!(doc.text(), "cdef");
    }

    #[test]
    fn rope_document_falls_back_for_astral_plane_content() {
        let mut doc = RopeDocument::new("a\u{1F600}b");
        assert_eq!(doc.len_utf16(), 4);
        let op = OperationBuilder::new().retain(4).insert("!").build();
        doc.apply(&op).unwrap();
        assert_eq!(doc.text(), "a\u{1F600}b!");
        assert_eq!(doc.len_utf16(), 5);
    }
}
