//! A minimal single-span diff/patch engine for snapshot compaction.
//!
//! Finds the common prefix and suffix between two strings and represents
//! their difference as one replaced span — the same approach as the
//! `simple_diff` this crate's patch engine is folded in from (formerly a
//! standalone `braid-text` crate providing Simpleton merge-type support).
//! A `Patch` round-trips losslessly for any single contiguous edit, which
//! covers every snapshot-to-snapshot transition `reconstruct_snapshot` needs
//! to replay.

use crate::error::{HistoryError, Result};

/// A single contiguous replacement: the `char` range `[start, end)` of the
/// old text is replaced by `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl Patch {
    /// Compute the patch that turns `old` into `new`.
    #[must_use]
    pub fn diff(old: &str, new: &str) -> Self {
        let a: Vec<char> = old.chars().collect();
        let b: Vec<char> = new.chars().collect();

        let mut prefix = 0;
        let max_prefix = a.len().min(b.len());
        while prefix < max_prefix && a[prefix] == b[prefix] {
            prefix += 1;
        }

        let mut suffix = 0;
        let max_suffix = (a.len() - prefix).min(b.len() - prefix);
        while suffix < max_suffix && a[a.len() - suffix - 1] == b[b.len() - suffix - 1] {
            suffix += 1;
        }

        let start = prefix;
        let end = a.len() - suffix;
        let replacement: String = b[prefix..b.len() - suffix].iter().collect();

        Patch {
            start,
            end,
            replacement,
        }
    }

    /// Apply this patch to `old`, producing `new`.
    ///
    /// # Errors
    /// [`HistoryError::PatchApplyFailed`] if `start`/`end` don't land on
    /// valid `char` boundaries of `old` (i.e. the patch wasn't computed
    /// against this exact text).
    pub fn apply(&self, old: &str) -> Result<String> {
        let chars: Vec<char> = old.chars().collect();
        if self.start > self.end || self.end > chars.len() {
            return Err(HistoryError::PatchApplyFailed(format!(
                "patch range {}..{} out of bounds for text of length {}",
                self.start,
                self.end,
                chars.len()
            )));
        }
        let mut out = String::with_capacity(old.len() + self.replacement.len());
        out.extend(&chars[..self.start]);
        out.push_str(&self.replacement);
        out.extend(&chars[self.end..]);
        Ok(out)
    }

    /// Serialize to the opaque wire form stored by the history backend:
    /// `"{start}:{end}:{replacement}"`.
    #[must_use]
    pub fn to_wire(&self) -> String {
        format!("{}:{}:{}", self.start, self.end, self.replacement)
    }

    /// Parse the wire form produced by [`Patch::to_wire`].
    ///
    /// # Errors
    /// [`HistoryError::PatchApplyFailed`] if the string isn't of the form
    /// `start:end:replacement` with numeric `start`/`end`.
    pub fn from_wire(s: &str) -> Result<Self> {
        let (start_str, rest) = s
            .split_once(':')
            .ok_or_else(|| HistoryError::PatchApplyFailed(format!("malformed patch: {s:?}")))?;
        let (end_str, replacement) = rest
            .split_once(':')
            .ok_or_else(|| HistoryError::PatchApplyFailed(format!("malformed patch: {s:?}")))?;
        let start = start_str
            .parse()
            .map_err(|_| HistoryError::PatchApplyFailed(format!("malformed patch: {s:?}")))?;
        let end = end_str
            .parse()
            .map_err(|_| HistoryError::PatchApplyFailed(format!("malformed patch: {s:?}")))?;
        Ok(Patch {
            start,
            end,
            replacement: replacement.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_and_apply_round_trip() {
        let old = "Hello World";
        let new = "Hello Beautiful World";
        let patch = Patch::diff(old, new);
        assert_eq!(patch.apply(old).unwrap(), new);
    }

    #[test]
    fn wire_round_trips() {
        let patch = Patch {
            start: 5,
            end: 6,
            replacement: " beautiful ".into(),
        };
        let wire = patch.to_wire();
        assert_eq!(Patch::from_wire(&wire).unwrap(), patch);
    }

    #[test]
    fn replacement_containing_colon_round_trips() {
        let old = "a";
        let new = "a: note";
        let patch = Patch::diff(old, new);
        let wire = patch.to_wire();
        let back = Patch::from_wire(&wire).unwrap();
        assert_eq!(back.apply(old).unwrap(), new);
    }

    #[test]
    fn identical_strings_produce_empty_span() {
        let patch = Patch::diff("same", "same");
        assert_eq!(patch.start, patch.end);
        assert_eq!(patch.replacement, "");
    }
}
