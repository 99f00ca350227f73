//! Text changes.
//!
//! A [`Change`] replaces the text between two positions with a list of lines. Everything that
//! has to follow an edit (selections, history, linked documents) is expressed through the
//! helpers in this module.

use crate::config::split_lines_auto;
use crate::pos::{Pos, char_len};
use serde::{Deserialize, Serialize};

/// A replacement of the range `from..to` by `text`.
///
/// `text` always holds at least one element: the empty string for a pure deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Start of the replaced range.
    pub from: Pos,
    /// End of the replaced range.
    pub to: Pos,
    /// Replacement lines.
    pub text: Vec<String>,
    /// Origin tag (`+input`, `*compose`, `undo`, ...). Drives history coalescing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Change {
    /// Build a change from a string, splitting it on any line ending.
    pub fn new(from: Pos, to: Pos, text: &str) -> Self {
        Self::from_lines(from, to, split_lines_auto(text))
    }

    /// Build a change from already split lines.
    pub fn from_lines(from: Pos, to: Pos, mut text: Vec<String>) -> Self {
        if text.is_empty() {
            text.push(String::new());
        }
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        Self {
            from,
            to,
            text,
            origin: None,
        }
    }

    /// Attach an origin tag.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Position right after the inserted text.
    pub fn end(&self) -> Pos {
        change_end(self)
    }

    /// `true` if the change neither removes nor inserts anything.
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.text.len() == 1 && self.text[0].is_empty()
    }
}

/// Position right after the inserted text of `change`.
pub fn change_end(change: &Change) -> Pos {
    let last = change.text.last().map(|s| char_len(s)).unwrap_or(0);
    let line = change.from.line + change.text.len().saturating_sub(1);
    let ch = if change.text.len() <= 1 {
        change.from.ch + last
    } else {
        last
    };
    Pos::new(line, ch)
}

/// Map a position through a change.
///
/// Positions before the change are untouched, positions inside it (inclusive) collapse to the
/// change end, and positions after it shift by the line and column delta.
pub fn adjust_for_change(pos: Pos, change: &Change) -> Pos {
    if pos < change.from {
        return pos;
    }
    if pos <= change.to {
        return change_end(change);
    }
    let end = change_end(change);
    let line = pos.line + change.text.len() - 1 - (change.to.line - change.from.line);
    let mut ch = pos.ch;
    if pos.line == change.to.line {
        ch = pos.ch + end.ch - change.to.ch;
    }
    Pos {
        line,
        ch,
        sticky: pos.sticky,
    }
}

/// Event payload describing a change that was applied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Start of the replaced range.
    pub from: Pos,
    /// End of the replaced range (before the change).
    pub to: Pos,
    /// Inserted lines.
    pub text: Vec<String>,
    /// Removed lines.
    pub removed: Vec<String>,
    /// Origin tag of the change.
    pub origin: Option<String>,
}
