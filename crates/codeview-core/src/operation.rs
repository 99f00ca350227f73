//! Operation batching and change notification.
//!
//! Every mutation of a [`Document`] runs inside an operation. Nested operations join the
//! outermost one; when it ends, derived state is recomputed once and the queued
//! [`DocEvent`]s are delivered to subscribers in the order they were produced.
//!
//! ```rust
//! use codeview_core::{DocEvent, Document, Pos};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut doc = Document::new("one\ntwo");
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! doc.subscribe(move |event| {
//!     if let DocEvent::Change(change) = event {
//!         log.borrow_mut().push(change.text.concat());
//!     }
//! });
//! doc.operation(|doc| {
//!     doc.replace_range("1", Pos::new(0, 3), Pos::new(0, 3), None).unwrap();
//!     doc.replace_range("2", Pos::new(1, 3), Pos::new(1, 3), None).unwrap();
//!     // Nothing is delivered before the outer operation ends.
//!     assert!(seen.borrow().is_empty());
//! });
//! assert_eq!(*seen.borrow(), vec!["1", "2"]);
//! ```

use crate::change::ChangeRecord;
use crate::document::Document;
use crate::line::LineId;
use crate::markers::MarkerId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

static NEXT_OP: AtomicU64 = AtomicU64::new(1);

/// Notification delivered to subscribers at the end of an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DocEvent {
    /// Text was replaced.
    Change(ChangeRecord),
    /// The selection changed (delivered at most once per operation).
    CursorActivity,
    /// The highlight worker changed the styles of these lines.
    LinesRestyled(Vec<usize>),
    /// A marker was cleared.
    MarkerCleared(MarkerId),
    /// The undo history was cleared.
    HistoryCleared,
}

/// Handle returned by [`Document::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber callback.
pub type EventCallback = Box<dyn FnMut(&DocEvent)>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next: u64,
    callbacks: Vec<(SubscriptionId, EventCallback)>,
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.callbacks.len())
            .finish()
    }
}

/// Bookkeeping of the operation in progress.
#[derive(Debug, Default)]
pub(crate) struct OperationState {
    depth: usize,
    /// Id of the current (or last) top-level operation.
    pub(crate) id: u64,
    pub(crate) pending: Vec<DocEvent>,
    /// The longest line may have been edited away.
    pub(crate) max_line_dirty: bool,
}

impl OperationState {
    pub(crate) fn push(&mut self, event: DocEvent) {
        if event == DocEvent::CursorActivity && self.pending.contains(&DocEvent::CursorActivity) {
            return;
        }
        self.pending.push(event);
    }
}

/// Display width of a line, with tabs expanded.
pub(crate) fn display_width(text: &str, tab_size: usize) -> usize {
    let tab_size = tab_size.max(1);
    text.chars().fold(0, |col, ch| {
        if ch == '\t' {
            col + tab_size - col % tab_size
        } else {
            col + ch.width().unwrap_or(0)
        }
    })
}

impl Document {
    /// Run `f` as one operation.
    ///
    /// Nested calls join the outer operation. Events produced inside are delivered after the
    /// outermost operation finishes.
    ///
    /// Each mutator validates before it changes anything, but the batch as a whole is not
    /// transactional: if `f` fails after some steps succeeded, those steps stay applied. They
    /// share one history event, so a single [`Document::undo`] reverts all of them. A panic
    /// inside `f` leaves the document mid-operation; it must not be used afterwards.
    pub fn operation<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.start_operation();
        let result = f(self);
        self.end_operation();
        result
    }

    /// Register a callback for [`DocEvent`]s.
    pub fn subscribe(&mut self, callback: impl FnMut(&DocEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.subscribers.next);
        self.subscribers.next += 1;
        self.subscribers.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.callbacks.len();
        self.subscribers.callbacks.retain(|(sid, _)| *sid != id);
        self.subscribers.callbacks.len() != before
    }

    /// `true` while an operation is running.
    pub fn in_operation(&self) -> bool {
        self.op.depth > 0
    }

    /// Line number and display width of the longest line.
    pub fn max_line(&self) -> Option<(usize, usize)> {
        self.max_line
            .map(|(id, width)| (self.first + self.tree.line_no(id), width))
    }

    fn start_operation(&mut self) {
        if self.op.depth == 0 {
            self.op.id = NEXT_OP.fetch_add(1, Ordering::Relaxed);
        }
        self.op.depth += 1;
    }

    fn end_operation(&mut self) {
        self.op.depth -= 1;
        if self.op.depth > 0 {
            return;
        }

        if self.op.max_line_dirty || self.max_line.is_none() {
            self.recompute_max_line();
            self.op.max_line_dirty = false;
        }
        let end = self.first + self.tree.len();
        self.frontiers.clamp(end);

        let events = std::mem::take(&mut self.op.pending);
        if !events.is_empty() {
            debug!(op = self.op.id, events = events.len(), "operation finished");
        }
        for event in &events {
            for (_, callback) in &mut self.subscribers.callbacks {
                callback(event);
            }
        }
    }

    fn recompute_max_line(&mut self) {
        let tab = self.config.tab_size;
        let mut best: Option<(LineId, usize)> = None;
        self.tree.iterate(0, self.tree.len(), |id, line| {
            let width = display_width(line.text(), tab);
            if best.is_none_or(|(_, w)| width > w) {
                best = Some((id, width));
            }
            std::ops::ControlFlow::Continue(())
        });
        self.max_line = best;
    }

    /// Track the longest line across an edit of lines `from..=to` (before the change).
    pub(crate) fn max_line_touched(&mut self, ids: &[LineId]) {
        if let Some((id, _)) = self.max_line {
            if ids.contains(&id) {
                self.op.max_line_dirty = true;
            }
        }
    }

    /// Offer freshly written lines `from..to` (tree indices) as the new longest line.
    pub(crate) fn max_line_offer(&mut self, from: usize, to: usize) {
        if self.op.max_line_dirty {
            return;
        }
        let tab = self.config.tab_size;
        let mut best = self.max_line;
        self.tree.iterate(from, to, |id, line| {
            let width = display_width(line.text(), tab);
            if best.is_none_or(|(_, w)| width > w) {
                best = Some((id, width));
            }
            std::ops::ControlFlow::Continue(())
        });
        self.max_line = best;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::Pos;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_display_width_expands_tabs_and_wide_chars() {
        assert_eq!(display_width("a\tb", 4), 5);
        assert_eq!(display_width("世界", 4), 4);
    }

    #[test]
    fn test_events_delivered_once_per_operation() {
        let mut doc = Document::new("abc");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let id = doc.subscribe(move |event| log.borrow_mut().push(event.clone()));
        doc.operation(|doc| {
            doc.set_cursor(Pos::new(0, 1));
            doc.set_cursor(Pos::new(0, 2));
        });
        assert_eq!(*seen.borrow(), vec![DocEvent::CursorActivity]);

        assert!(doc.unsubscribe(id));
        doc.set_cursor(Pos::new(0, 0));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_max_line_follows_edits() {
        let mut doc = Document::new("short\na much longer line\nmid");
        assert_eq!(doc.max_line(), Some((1, 18)));
        doc.replace_range("", Pos::new(1, 0), Pos::new(1, 18), None)
            .unwrap();
        assert_eq!(doc.max_line(), Some((0, 5)));
        doc.replace_range("0123456789", Pos::new(2, 3), Pos::new(2, 3), None)
            .unwrap();
        assert_eq!(doc.max_line(), Some((2, 13)));
    }
}
