//! Document positions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which side of a position a cursor "sticks" to.
///
/// Only meaningful when a position sits exactly on a bidi run boundary, where the same logical
/// offset maps to two visual locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sticky {
    /// Associated with the character before the offset.
    Before,
    /// Associated with the character after the offset.
    After,
}

/// A position in a document: line number plus character offset within the line.
///
/// `ch` counts Unicode scalar values (`char`s). Comparison and equality look at `(line, ch)`
/// only; use [`Pos::same_cursor`] to also compare [`Pos::sticky`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pos {
    /// Line number (offset by the document's first line number).
    pub line: usize,
    /// Character offset within the line.
    pub ch: usize,
    /// Bidi boundary disambiguation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<Sticky>,
}

impl Pos {
    /// Create a position without a sticky side.
    pub const fn new(line: usize, ch: usize) -> Self {
        Self {
            line,
            ch,
            sticky: None,
        }
    }

    /// Create a position with a sticky side.
    pub const fn with_sticky(line: usize, ch: usize, sticky: Sticky) -> Self {
        Self {
            line,
            ch,
            sticky: Some(sticky),
        }
    }

    /// Strict equality, including the sticky side.
    pub fn same_cursor(&self, other: &Pos) -> bool {
        self.line == other.line && self.ch == other.ch && self.sticky == other.sticky
    }
}

impl PartialEq for Pos {
    fn eq(&self, other: &Self) -> bool {
        self.line == other.line && self.ch == other.ch
    }
}

impl Eq for Pos {}

impl Ord for Pos {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.ch.cmp(&other.ch))
    }
}

impl PartialOrd for Pos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.ch)
    }
}

/// The smaller of two positions.
pub fn min_pos(a: Pos, b: Pos) -> Pos {
    if b < a { b } else { a }
}

/// The larger of two positions.
pub fn max_pos(a: Pos, b: Pos) -> Pos {
    if b > a { b } else { a }
}

/// Byte offset of the `ch`-th character of `text` (clamped to the end).
pub(crate) fn byte_offset(text: &str, ch: usize) -> usize {
    if text.is_ascii() {
        return ch.min(text.len());
    }
    text.char_indices()
        .nth(ch)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}

/// Slice `text` by character offsets.
pub(crate) fn slice_chars(text: &str, from: usize, to: Option<usize>) -> &str {
    let start = byte_offset(text, from);
    let end = match to {
        Some(to) => byte_offset(text, to.max(from)),
        None => text.len(),
    };
    &text[start..end]
}

/// Number of `char`s in `text`.
pub(crate) fn char_len(text: &str) -> usize {
    if text.is_ascii() {
        text.len()
    } else {
        text.chars().count()
    }
}
