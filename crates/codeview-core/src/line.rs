//! Lines stored in the line tree.

use crate::bidi::{BidiSpan, Direction};
use crate::highlight::{LineStyles, SavedContext};
use crate::line_tree::NodeId;
use crate::pos::char_len;
use crate::spans::MarkedSpan;

/// Arena index of a [`Line`].
///
/// Ids are stable while the line is alive and are recycled after the line is removed, so they
/// must not be kept across edits that might delete the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineId(pub(crate) usize);

/// A single line of a document together with its cached analysis data.
#[derive(Debug, Clone)]
pub struct Line {
    text: String,
    char_len: usize,
    ascii: bool,
    pub(crate) styles: Option<LineStyles>,
    pub(crate) marked_spans: Vec<MarkedSpan>,
    pub(crate) height: f64,
    pub(crate) state_after: Option<SavedContext>,
    pub(crate) bidi: Option<(Direction, Option<Vec<BidiSpan>>)>,
    pub(crate) leaf: NodeId,
}

impl Line {
    pub(crate) fn new(text: String, marked_spans: Vec<MarkedSpan>, height: f64) -> Self {
        let ascii = text.is_ascii();
        let char_len = char_len(&text);
        Self {
            text,
            char_len,
            ascii,
            styles: None,
            marked_spans,
            height,
            state_after: None,
            bidi: None,
            leaf: NodeId::DETACHED,
        }
    }

    /// Line text without the line separator.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length in `char`s.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// `true` if the text is pure ASCII (char offsets equal byte offsets).
    pub fn is_ascii(&self) -> bool {
        self.ascii
    }

    /// Height as stored in the tree (0 for lines hidden by a collapsed marker).
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Annotation spans attached to this line.
    pub fn marked_spans(&self) -> &[MarkedSpan] {
        &self.marked_spans
    }

    /// Cached token styles, if the line has been highlighted.
    pub fn styles(&self) -> Option<&LineStyles> {
        self.styles.as_ref()
    }

    /// Replace the text and drop every cache derived from it.
    pub(crate) fn set_text(&mut self, text: String) {
        self.ascii = text.is_ascii();
        self.char_len = char_len(&text);
        self.text = text;
        self.styles = None;
        self.state_after = None;
        self.bidi = None;
    }
}
