//! Undo, redo and history bookkeeping.

use super::{Document, SelectionOptions};
use crate::change::{Change, change_end};
use crate::history::{History, HistoryChange, HistoryDirection, HistorySize, HistorySnapshot, TakenEvent};
use crate::operation::DocEvent;
use crate::selection_set::Selection;
use crate::spans::{SpanSnapshot, merge_old_spans, remove_cleared_spans};
use std::time::Instant;
use tracing::debug;

impl Document {
    /// Inverse entry of `change`, built before it is applied.
    fn history_entry(&self, change: &Change) -> HistoryChange {
        HistoryChange {
            from: change.from,
            to: change_end(change),
            text: self.lines_between(change.from, change.to),
            spans: self.local_spans(change.from.line, change.to.line + 1),
        }
    }

    /// Marker spans of lines `from..to`, or `None` if there are none.
    fn local_spans(&self, from: usize, to: usize) -> Option<SpanSnapshot> {
        let snapshot: SpanSnapshot = (from..to)
            .map(|n| {
                self.id_at(n)
                    .map(|id| self.tree.line(id).marked_spans().to_vec())
                    .unwrap_or_default()
            })
            .collect();
        snapshot.iter().any(|spans| !spans.is_empty()).then_some(snapshot)
    }

    pub(crate) fn record_change(&self, change: &Change, sel_after: Selection) {
        self.record_change_as(change, sel_after, self.op.id);
    }

    /// Record `change` as part of operation `op_id`.
    pub(crate) fn record_change_as(&self, change: &Change, sel_after: Selection, op_id: u64) {
        let now = Instant::now();
        self.history.borrow_mut().add_change(
            change,
            &self.sel,
            sel_after,
            op_id,
            now,
            || self.history_entry(change),
        );
    }

    /// Undo the last change group. Returns `false` if there is nothing to undo.
    ///
    /// ```rust
    /// use codeview_core::{Document, Pos};
    ///
    /// let mut doc = Document::new("abc");
    /// doc.replace_range("X", Pos::new(0, 1), Pos::new(0, 2), None).unwrap();
    /// assert!(doc.undo());
    /// assert_eq!(doc.get_value(None), "abc");
    /// assert!(doc.redo());
    /// assert_eq!(doc.get_value(None), "aXc");
    /// assert!(!doc.redo());
    /// ```
    pub fn undo(&mut self) -> bool {
        self.operation(|doc| doc.change_from_history(HistoryDirection::Undo, false))
    }

    /// Redo the last undone change group.
    pub fn redo(&mut self) -> bool {
        self.operation(|doc| doc.change_from_history(HistoryDirection::Redo, false))
    }

    /// Go back to the previous selection, undoing changes only if no selection event is left.
    pub fn undo_selection(&mut self) -> bool {
        self.operation(|doc| doc.change_from_history(HistoryDirection::Undo, true))
    }

    /// Inverse of [`Document::undo_selection`].
    pub fn redo_selection(&mut self) -> bool {
        self.operation(|doc| doc.change_from_history(HistoryDirection::Redo, true))
    }

    fn change_from_history(&mut self, dir: HistoryDirection, allow_selection_only: bool) -> bool {
        let current = self.sel.clone();
        let taken = self
            .history
            .borrow_mut()
            .take_event(dir, allow_selection_only, &current);
        let group = match taken {
            TakenEvent::Nothing => return false,
            TakenEvent::Selection(sel) => {
                self.set_selection(
                    sel,
                    SelectionOptions {
                        clear_redo: false,
                        ..SelectionOptions::default()
                    },
                );
                return true;
            }
            TakenEvent::Changes(group) => group,
        };

        for (i, entry) in group.changes.iter().enumerate().rev() {
            let change = entry.to_change(dir.origin());
            let change = Change {
                from: self.clip_pos(change.from),
                to: self.clip_pos(change.to),
                ..change
            };
            let anti = self.history_entry(&change);
            self.history.borrow_mut().push_anti_change(dir, anti);

            let sel_after = if i == 0 {
                self.history.borrow().source_top_selection(dir)
            } else {
                None
            };
            let old = entry
                .spans
                .as_ref()
                .map(|spans| remove_cleared_spans(spans, &self.markers));
            let spans = merge_old_spans(old, self.stretch_spans(&change));
            if let Some(outbox) = self.outbox.as_mut() {
                outbox.push(change.clone());
            }
            self.apply_to_tree(change, sel_after, spans);
        }
        true
    }

    /// Number of undo and redo steps.
    pub fn history_size(&self) -> HistorySize {
        self.history.borrow().size()
    }

    /// Drop all undo and redo steps. Documents sharing the history see it cleared too.
    pub fn clear_history(&mut self) {
        self.operation(|doc| {
            let fresh = History::continued_from(&doc.history.borrow());
            *doc.history.borrow_mut() = fresh;
            debug!("history cleared");
            doc.op.push(DocEvent::HistoryCleared);
        });
    }

    /// Current generation. With `force_split` the next change starts a new undo step.
    pub fn change_generation(&mut self, force_split: bool) -> u64 {
        let mut hist = self.history.borrow_mut();
        if force_split {
            hist.split();
        }
        hist.generation()
    }

    /// Remember the current content as the clean state.
    pub fn mark_clean(&mut self) {
        self.clean_generation = self.change_generation(true);
    }

    /// `true` if the content is the one last marked clean.
    pub fn is_clean(&self) -> bool {
        self.is_clean_at(self.clean_generation)
    }

    /// `true` if the content is the one at generation `generation`.
    pub fn is_clean_at(&self, generation: u64) -> bool {
        self.history.borrow().generation() == generation
    }

    /// Plain-data copy of the history, suitable for persisting.
    pub fn history_snapshot(&self) -> HistorySnapshot {
        self.history.borrow().snapshot()
    }

    /// Replace the history with a snapshot (typically one loaded from JSON).
    pub fn set_history(&mut self, snapshot: HistorySnapshot) {
        self.history.borrow_mut().restore(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::MarkerOptions;
    use crate::pos::Pos;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_typing_merges_into_one_step() {
        let mut doc = Document::new("ab");
        for (i, ch) in ["x", "y", "z"].into_iter().enumerate() {
            let at = Pos::new(0, 2 + i);
            doc.replace_range(ch, at, at, Some("+input")).unwrap();
        }
        assert_eq!(doc.get_value(None), "abxyz");
        assert_eq!(doc.history_size(), HistorySize { undo: 1, redo: 0 });
        assert!(doc.undo());
        assert_eq!(doc.get_value(None), "ab");
        assert_eq!(doc.history_size(), HistorySize { undo: 0, redo: 1 });
        assert!(!doc.undo());
    }

    #[test]
    fn test_undo_restores_selection_before_change() {
        let mut doc = Document::new("abc");
        doc.set_cursor(Pos::new(0, 3));
        doc.replace_range("d", Pos::new(0, 3), Pos::new(0, 3), None).unwrap();
        assert_eq!(doc.selection().primary().head, Pos::new(0, 4));
        doc.undo();
        assert_eq!(doc.selection().primary().head, Pos::new(0, 3));
        doc.redo();
        assert_eq!(doc.selection().primary().head, Pos::new(0, 4));
    }

    #[test]
    fn test_selection_undo() {
        let mut doc = Document::new("abcdef");
        doc.set_cursor(Pos::new(0, 1));
        doc.set_cursor(Pos::new(0, 2));
        assert!(doc.undo_selection());
        assert_eq!(doc.selection().primary().head, Pos::new(0, 1));
        assert!(doc.redo_selection());
        assert_eq!(doc.selection().primary().head, Pos::new(0, 2));
        assert_eq!(doc.get_value(None), "abcdef");
    }

    #[test]
    fn test_undo_reattaches_removed_marker() {
        let mut doc = Document::new("hello world");
        let id = doc
            .mark_text(Pos::new(0, 6), Pos::new(0, 11), MarkerOptions::default())
            .unwrap();
        doc.replace_range("", Pos::new(0, 5), Pos::new(0, 11), None).unwrap();
        assert_eq!(doc.find_marker(id), None);
        doc.undo();
        let range = doc.find_marker(id).unwrap();
        assert_eq!((range.from, range.to), (Pos::new(0, 6), Pos::new(0, 11)));
    }

    #[test]
    fn test_cleared_marker_stays_cleared_after_undo() {
        let mut doc = Document::new("hello world");
        let id = doc
            .mark_text(Pos::new(0, 6), Pos::new(0, 11), MarkerOptions::default())
            .unwrap();
        doc.replace_range("", Pos::new(0, 5), Pos::new(0, 11), None).unwrap();
        doc.clear_marker(id).unwrap();
        doc.undo();
        assert_eq!(doc.get_value(None), "hello world");
        assert!(doc.get_line(0).unwrap().spans.is_empty());
    }

    #[test]
    fn test_mark_text_as_history_step() {
        let mut doc = Document::new("abc");
        let id = doc
            .mark_text(
                Pos::new(0, 0),
                Pos::new(0, 2),
                MarkerOptions {
                    add_to_history: true,
                    ..MarkerOptions::default()
                },
            )
            .unwrap();
        assert_eq!(doc.history_size().undo, 1);
        doc.undo();
        assert_eq!(doc.get_value(None), "abc");
        assert_eq!(doc.find_marker(id), None);
    }

    #[test]
    fn test_clean_tracking() {
        let mut doc = Document::new("abc");
        assert!(doc.is_clean());
        doc.replace_range("x", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        assert!(!doc.is_clean());
        doc.mark_clean();
        assert!(doc.is_clean());
        let generation = doc.change_generation(false);
        doc.undo();
        assert!(!doc.is_clean());
        doc.redo();
        assert!(doc.is_clean_at(generation));
    }

    #[test]
    fn test_clear_history_emits_event() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut doc = Document::new("abc");
        doc.replace_range("x", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
        let cleared = Rc::new(Cell::new(false));
        let seen = cleared.clone();
        doc.subscribe(move |event| {
            if *event == DocEvent::HistoryCleared {
                seen.set(true);
            }
        });
        doc.clear_history();
        assert!(cleared.get());
        assert_eq!(doc.history_size(), HistorySize::default());
        assert!(!doc.undo());
    }

    #[test]
    fn test_history_survives_json() {
        let mut doc = Document::new("abc");
        doc.replace_range("X", Pos::new(0, 3), Pos::new(0, 3), None).unwrap();
        let json = doc.history_snapshot().to_json().unwrap();

        let mut restored = Document::new("abcX");
        restored.set_history(HistorySnapshot::from_json(&json).unwrap());
        assert_eq!(restored.history_size().undo, 1);
        assert!(restored.undo());
        assert_eq!(restored.get_value(None), "abc");
    }
}
