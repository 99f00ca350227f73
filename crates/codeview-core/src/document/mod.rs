//! The document: a line tree plus selection, markers, history and highlighting state.
//!
//! Positions at this surface use absolute line numbers: a document created as a sub-view of
//! another starts at [`Document::first_line`] instead of 0. The implementation is split by
//! concern:
//!
//! - `edit`: the change pipeline (read-only checks, history recording, tree update)
//! - `marks`: marker creation, queries and atomic-range skipping
//! - `selection`: selection setters and horizontal motion
//! - `undo`: undo/redo and history bookkeeping
//! - `highlight`: tokenizer queries, the highlight worker and indentation

mod edit;
mod highlight;
mod marks;
mod selection;
mod undo;

pub use edit::ChangeOptions;
pub use highlight::IndentHow;
pub use selection::{Motion, MoveUnit, SelectionOptions};

use crate::change::Change;
use crate::config::DocConfig;
use crate::error::DocError;
use crate::highlight::{Frontiers, LineStyles};
use crate::history::History;
use crate::line::{Line, LineId};
use crate::line_tree::LineTree;
use crate::markers::MarkerStore;
use crate::mode::ModeHandle;
use crate::operation::{OperationState, Subscribers};
use crate::pos::{Pos, char_len, slice_chars};
use crate::selection_set::Selection;
use crate::spans::MarkedSpan;
use std::cell::RefCell;
use std::fmt;
use std::ops::ControlFlow;
use std::rc::Rc;
use tracing::debug;

/// Read-only view of one line.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    /// Absolute line number.
    pub number: usize,
    /// Text without separator.
    pub text: &'a str,
    /// Marker spans on the line.
    pub spans: &'a [MarkedSpan],
    /// Height (0 when hidden by a collapsed marker).
    pub height: f64,
    /// Cached styles, if they are current.
    pub styles: Option<&'a LineStyles>,
}

/// A text document.
pub struct Document {
    pub(crate) tree: LineTree,
    pub(crate) first: usize,
    pub(crate) config: DocConfig,
    pub(crate) sel: Selection,
    /// Shift-extend mode for [`Document::extend_selection`].
    pub(crate) extend: bool,
    pub(crate) history: Rc<RefCell<History>>,
    pub(crate) clean_generation: u64,
    pub(crate) markers: MarkerStore,
    pub(crate) mode: ModeHandle,
    pub(crate) mode_gen: u64,
    pub(crate) frontiers: Frontiers,
    pub(crate) viewport: Option<(usize, usize)>,
    /// Set when the cursor has nowhere to go outside an atomic range.
    pub(crate) cant_edit: bool,
    pub(crate) attached: bool,
    pub(crate) op: OperationState,
    pub(crate) subscribers: Subscribers,
    pub(crate) max_line: Option<(LineId, usize)>,
    /// Changes applied locally, kept for propagation while the document is linked.
    pub(crate) outbox: Option<Vec<Change>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("first", &self.first)
            .field("lines", &self.tree.len())
            .field("mode", &self.mode)
            .field("sel", &self.sel)
            .field("markers", &self.markers.len())
            .field("cant_edit", &self.cant_edit)
            .finish_non_exhaustive()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document {
    /// Document with the default configuration and the null mode.
    pub fn new(text: &str) -> Self {
        Self::with_config(text, DocConfig::default())
    }

    /// Document with a configuration and the null mode.
    pub fn with_config(text: &str, config: DocConfig) -> Self {
        Self::with_mode(text, config, ModeHandle::null())
    }

    /// Document with a configuration and a tokenizer mode.
    ///
    /// ```rust
    /// use codeview_core::{DocConfig, Document, ModeRegistry};
    ///
    /// let registry = ModeRegistry::new();
    /// let doc = Document::with_mode("hello", DocConfig::default(), registry.get_mode("text/plain"));
    /// assert_eq!(doc.mode().name(), "null");
    /// ```
    pub fn with_mode(text: &str, config: DocConfig, mode: ModeHandle) -> Self {
        let height = config.line_height;
        let lines = config
            .split_lines(text)
            .into_iter()
            .map(|text| Line::new(text, Vec::new(), height))
            .collect();
        let history = History::new(config.undo_depth, config.history_event_delay());
        let clean_generation = history.generation();
        let mut doc = Self {
            tree: LineTree::from_lines(lines),
            first: 0,
            config,
            sel: Selection::cursor(Pos::new(0, 0)),
            extend: false,
            history: Rc::new(RefCell::new(history)),
            clean_generation,
            markers: MarkerStore::default(),
            mode,
            mode_gen: 1,
            frontiers: Frontiers::new(0),
            viewport: None,
            cant_edit: false,
            attached: false,
            op: OperationState::default(),
            subscribers: Subscribers::default(),
            max_line: None,
            outbox: None,
        };
        doc.operation(|_| {});
        doc
    }

    /// Renumber the document to start at line `first`.
    pub fn with_first_line(mut self, first: usize) -> Self {
        self.shift_first(first as isize - self.first as isize);
        self.frontiers = Frontiers::new(first);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &DocConfig {
        &self.config
    }

    /// Number of lines.
    pub fn line_count(&self) -> usize {
        self.tree.len()
    }

    /// Number of the first line.
    pub fn first_line(&self) -> usize {
        self.first
    }

    /// Number of the last line.
    pub fn last_line(&self) -> usize {
        self.first + self.tree.len() - 1
    }

    /// Total height of all lines.
    pub fn height(&self) -> f64 {
        self.tree.height()
    }

    /// `true` while a selection change found no valid place outside an atomic marker.
    pub fn cant_edit(&self) -> bool {
        self.cant_edit
    }

    pub(crate) fn check_line(&self, n: usize) -> Result<LineId, DocError> {
        n.checked_sub(self.first)
            .and_then(|i| self.tree.line_at(i))
            .ok_or(DocError::LineOutOfRange {
                line: n,
                first: self.first,
                end: self.first + self.tree.len(),
            })
    }

    /// Id of a line known to exist (a clipped position).
    pub(crate) fn id_at(&self, n: usize) -> Option<LineId> {
        n.checked_sub(self.first).and_then(|i| self.tree.line_at(i))
    }

    /// Text of line `n`, empty if there is no such line.
    pub(crate) fn text_at(&self, n: usize) -> &str {
        self.id_at(n).map(|id| self.tree.line(id).text()).unwrap_or("")
    }

    pub(crate) fn line_len(&self, n: usize) -> usize {
        self.id_at(n).map(|id| self.tree.line(id).char_len()).unwrap_or(0)
    }

    /// Absolute number of a line id.
    pub(crate) fn line_no(&self, id: LineId) -> usize {
        self.first + self.tree.line_no(id)
    }

    /// View of line `n`.
    pub fn get_line(&self, n: usize) -> Result<LineView<'_>, DocError> {
        let id = self.check_line(n)?;
        let line = self.tree.line(id);
        Ok(LineView {
            number: n,
            text: line.text(),
            spans: line.marked_spans(),
            height: line.height(),
            styles: line.styles().filter(|s| s.mode_gen == self.mode_gen),
        })
    }

    /// Visit lines `from..to` (absolute numbers); the visitor may stop early.
    pub fn iter_lines(&self, from: usize, to: usize, mut visit: impl FnMut(LineView<'_>) -> ControlFlow<()>) {
        let start = from.max(self.first);
        let mut n = start;
        self.tree.iterate(start - self.first, to.saturating_sub(self.first), |_, line| {
            let view = LineView {
                number: n,
                text: line.text(),
                spans: line.marked_spans(),
                height: line.height(),
                styles: line.styles().filter(|s| s.mode_gen == self.mode_gen),
            };
            n += 1;
            visit(view)
        });
    }

    /// Line containing vertical offset `y`, clamped to the last line.
    pub fn line_at_height(&self, y: f64) -> usize {
        let n = self.tree.line_at_height(y.max(0.0));
        self.first + n.min(self.tree.len() - 1)
    }

    /// Vertical offset of the top of line `n`.
    pub fn height_at_line(&self, n: usize) -> Result<f64, DocError> {
        Ok(self.tree.height_at_line(self.check_line(n)?))
    }

    /// Clamp a position into the document.
    pub fn clip_pos(&self, pos: Pos) -> Pos {
        if pos.line < self.first {
            return Pos::new(self.first, 0);
        }
        let last = self.last_line();
        if pos.line > last {
            return Pos::new(last, self.line_len(last));
        }
        let len = self.line_len(pos.line);
        if pos.ch > len {
            Pos::new(pos.line, len)
        } else {
            pos
        }
    }

    /// Lines of the text between two (clipped) positions.
    pub(crate) fn lines_between(&self, from: Pos, to: Pos) -> Vec<String> {
        let mut out = Vec::new();
        let mut n = from.line;
        self.tree.iterate(from.line - self.first, to.line + 1 - self.first, |_, line| {
            let end = (n == to.line).then_some(to.ch);
            let start = if n == from.line { from.ch } else { 0 };
            out.push(slice_chars(line.text(), start, end).to_string());
            n += 1;
            ControlFlow::Continue(())
        });
        out
    }

    fn separator<'a>(&'a self, sep: Option<&'a str>) -> &'a str {
        sep.unwrap_or_else(|| self.config.join_separator())
    }

    /// The whole text, joined with `sep` (or the configured separator).
    pub fn get_value(&self, sep: Option<&str>) -> String {
        let sep = self.separator(sep);
        let mut value = String::new();
        let mut first = true;
        self.tree.iterate(0, self.tree.len(), |_, line| {
            if !std::mem::take(&mut first) {
                value.push_str(sep);
            }
            value.push_str(line.text());
            ControlFlow::Continue(())
        });
        value
    }

    /// Text between two positions.
    pub fn get_range(&self, from: Pos, to: Pos, sep: Option<&str>) -> String {
        let (from, to) = (self.clip_pos(from), self.clip_pos(to));
        let (from, to) = if to < from { (to, from) } else { (from, to) };
        self.lines_between(from, to).join(self.separator(sep))
    }

    /// Replace the whole text. Ignores read-only markers and resets the cursor to the start.
    pub fn set_value(&mut self, text: &str) {
        self.operation(|doc| {
            let top = Pos::new(doc.first, 0);
            let last = doc.last_line();
            let change = Change::from_lines(top, Pos::new(last, doc.line_len(last)), doc.config.split_lines(text))
                .with_origin("setValue");
            // Read-only checks are skipped, so this cannot fail.
            let _ = doc.apply_change_with(change, ChangeOptions { ignore_read_only: true });
            doc.set_selection(Selection::cursor(top), SelectionOptions::default());
        });
    }

    /// Position of a char offset into the text (counting separators).
    pub fn pos_from_index(&self, index: usize) -> Pos {
        let sep = char_len(self.config.join_separator());
        let mut remaining = index;
        let mut found = None;
        let mut n = self.first;
        self.tree.iterate(0, self.tree.len(), |_, line| {
            let size = line.char_len() + sep;
            if size > remaining {
                found = Some(Pos::new(n, remaining));
                return ControlFlow::Break(());
            }
            remaining -= size;
            n += 1;
            ControlFlow::Continue(())
        });
        self.clip_pos(found.unwrap_or(Pos::new(n, remaining)))
    }

    /// Char offset of a position into the text (counting separators).
    pub fn index_from_pos(&self, pos: Pos) -> usize {
        let pos = self.clip_pos(pos);
        let sep = char_len(self.config.join_separator());
        let mut index = pos.ch;
        self.tree.iterate(0, pos.line - self.first, |_, line| {
            index += line.char_len() + sep;
            ControlFlow::Continue(())
        });
        index
    }

    /// Mark the document as attached to an editor host.
    pub fn attach(&mut self) -> Result<(), DocError> {
        if self.attached {
            return Err(DocError::AlreadyAttached);
        }
        self.attached = true;
        debug!("document attached");
        Ok(())
    }

    /// Detach from the host. Returns `false` if the document was not attached.
    pub fn detach(&mut self) -> bool {
        std::mem::replace(&mut self.attached, false)
    }

    /// `true` while attached to a host.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Tell the document which lines the host shows; parse states are kept for them.
    pub fn set_viewport(&mut self, from: usize, to: usize) {
        self.viewport = (from < to).then_some((from, to));
    }

    /// Move the whole document by `distance` lines (a linked view whose preceding lines
    /// changed).
    pub(crate) fn shift_first(&mut self, distance: isize) {
        if distance == 0 {
            return;
        }
        let shift = |line: usize| (line as isize + distance).max(0) as usize;
        self.first = shift(self.first);
        for range in &mut self.sel.ranges {
            range.anchor.line = shift(range.anchor.line);
            range.head.line = shift(range.head.line);
        }
        self.frontiers.mode = shift(self.frontiers.mode);
        self.frontiers.highlight = shift(self.frontiers.highlight);
        if let Some((from, to)) = self.viewport {
            self.viewport = Some((shift(from), shift(to)));
        }
    }

    /// Start or stop recording applied changes for linked propagation.
    pub(crate) fn set_linked(&mut self, linked: bool) {
        if linked {
            self.outbox.get_or_insert_with(Vec::new);
        } else {
            self.outbox = None;
        }
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Change> {
        self.outbox.as_mut().map(std::mem::take).unwrap_or_default()
    }
}
