//! Conversions between UTF-16 code-unit offsets and native `str` byte offsets.
//!
//! Every position carried by an [`Operation`](crate::Operation) is counted in
//! UTF-16 code units, matching how JavaScript-based editors index text:
//! characters outside the Basic Multilingual Plane count as two units. Rust
//! strings are UTF-8, so every apply/invert/compose/transform boundary that
//! touches a native string has to convert through here first.

/// Number of UTF-16 code units `s` encodes to.
#[must_use]
pub fn len_utf16(s: &str) -> usize {
    str_indices::utf16::count(s)
}

/// Byte offset into `s` corresponding to UTF-16 offset `utf16_idx`.
///
/// # Panics
/// Panics if `utf16_idx` does not land on a UTF-16 code unit boundary of `s`
/// (e.g. it splits a surrogate pair), or exceeds `len_utf16(s)`.
#[must_use]
pub fn utf16_to_byte_idx(s: &str, utf16_idx: usize) -> usize {
    str_indices::utf16::to_byte_idx(s, utf16_idx)
}

/// UTF-16 offset corresponding to byte offset `byte_idx` into `s`.
///
/// `byte_idx` must land on a `char` boundary.
#[must_use]
pub fn byte_to_utf16_idx(s: &str, byte_idx: usize) -> usize {
    str_indices::utf16::from_byte_idx(s, byte_idx)
}

/// Slice `s` between UTF-16 offsets `start..end`, returned as an owned `String`.
#[must_use]
pub fn slice_utf16(s: &str, start: usize, end: usize) -> String {
    let a = utf16_to_byte_idx(s, start);
    let b = utf16_to_byte_idx(s, end);
    s[a..b].to_string()
}
