//! The change pipeline.

use super::Document;
use crate::change::{Change, ChangeRecord};
use crate::error::DocError;
use crate::highlight::retreat_frontier;
use crate::line::{Line, LineId};
use crate::markers::MarkerId;
use crate::operation::DocEvent;
use crate::pos::{Pos, slice_chars};
use crate::selection_set::{Selection, map_selection};
use crate::spans::{MarkedSpan, SpanSnapshot, stretch_spans_over_change};
use std::ops::{ControlFlow, Range};
use tracing::debug;

/// Options of [`Document::apply_change_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeOptions {
    /// Apply the change even if it touches a read-only marker.
    pub ignore_read_only: bool,
}

type NewLine = (String, Vec<MarkedSpan>);

fn lines_for(text: &[String], spans: &mut [Vec<MarkedSpan>], range: Range<usize>) -> Vec<NewLine> {
    range
        .map(|i| (text[i].clone(), std::mem::take(&mut spans[i])))
        .collect()
}

impl Document {
    /// Apply a change.
    ///
    /// Endpoints are clipped to the document. Fails with [`DocError::ReadOnlyRange`] if a
    /// read-only marker intersects the change; the document is then left untouched.
    pub fn apply_change(&mut self, change: Change) -> Result<(), DocError> {
        self.apply_change_with(change, ChangeOptions::default())
    }

    /// Apply a change with options.
    pub fn apply_change_with(&mut self, change: Change, options: ChangeOptions) -> Result<(), DocError> {
        self.operation(|doc| doc.make_change(change, options.ignore_read_only))
    }

    /// Replace `from..to` with `text`, split on the configured line separator.
    pub fn replace_range(
        &mut self,
        text: &str,
        from: Pos,
        to: Pos,
        origin: Option<&str>,
    ) -> Result<(), DocError> {
        let mut change = Change::from_lines(from, to, self.config.split_lines(text));
        change.origin = origin.map(str::to_string);
        self.apply_change(change)
    }

    pub(crate) fn make_change(&mut self, change: Change, ignore_read_only: bool) -> Result<(), DocError> {
        if self.cant_edit {
            debug!(from = %change.from, to = %change.to, "change ignored while cursor is stuck in an atomic range");
            return Ok(());
        }
        let change = Change {
            from: self.clip_pos(change.from),
            to: self.clip_pos(change.to),
            ..change
        };
        if !ignore_read_only {
            self.check_read_only(&change)?;
        }
        self.make_change_inner(change);
        Ok(())
    }

    pub(crate) fn check_read_only(&self, change: &Change) -> Result<(), DocError> {
        let mut read_only: Vec<MarkerId> = Vec::new();
        self.tree.iterate(
            change.from.line - self.first,
            change.to.line + 1 - self.first,
            |_, line| {
                for span in line.marked_spans() {
                    let is_read_only = self
                        .markers
                        .get(span.marker)
                        .is_some_and(|m| m.options.read_only);
                    if is_read_only && !read_only.contains(&span.marker) {
                        read_only.push(span.marker);
                    }
                }
                ControlFlow::Continue(())
            },
        );
        for id in read_only {
            let (Some(marker), Some(range)) = (self.markers.get(id), self.find_marker(id)) else {
                continue;
            };
            let options = &marker.options;
            let outside = change.to < range.from
                || change.from > range.to
                || (change.to == range.from && (change.from < range.from || !options.inclusive_left))
                || (change.from == range.to && (change.to > range.to || !options.inclusive_right));
            if !outside {
                debug!(from = %change.from, to = %change.to, marker = id.0, "change rejected by read-only marker");
                return Err(DocError::ReadOnlyRange {
                    from: change.from,
                    to: change.to,
                });
            }
        }
        Ok(())
    }

    /// Record and apply a clipped, validated change.
    pub(crate) fn make_change_inner(&mut self, change: Change) {
        if change.is_noop() {
            return;
        }
        let sel_after = map_selection(&self.sel, &change, self.config.selections_may_touch);
        self.record_change(&change, sel_after.clone());
        let spans = self.stretch_spans(&change);
        if let Some(outbox) = self.outbox.as_mut() {
            outbox.push(change.clone());
        }
        self.apply_to_tree(change, Some(sel_after), spans);
    }

    /// Apply a change coming from a linked document, clipped to this document's lines.
    pub(crate) fn apply_linked_change(&mut self, change: &Change) {
        let mut change = change.clone();
        if change.to.line < self.first {
            let shift = change.text.len() as isize - 1 - (change.to.line - change.from.line) as isize;
            self.shift_first(shift);
            return;
        }
        if change.from.line > self.last_line() {
            return;
        }
        if change.from.line < self.first {
            let shift = change.text.len() as isize - 1 - (self.first - change.from.line) as isize;
            self.shift_first(shift);
            let to_line = (change.to.line as isize + shift).max(0) as usize;
            change = Change {
                from: Pos::new(self.first, 0),
                to: Pos::new(to_line, change.to.ch),
                text: vec![change.text.last().cloned().unwrap_or_default()],
                origin: change.origin,
            };
        }
        let last = self.last_line();
        if change.to.line > last {
            change = Change {
                from: change.from,
                to: Pos::new(last, self.line_len(last)),
                text: vec![change.text.first().cloned().unwrap_or_default()],
                origin: change.origin,
            };
        }
        let spans = self.stretch_spans(&change);
        self.apply_to_tree(change, None, spans);
    }

    /// Spans of the lines that will replace the edited range.
    pub(crate) fn stretch_spans(&self, change: &Change) -> Option<SpanSnapshot> {
        let spans_of = |n: usize| {
            self.id_at(n)
                .map(|id| self.tree.line(id).marked_spans())
                .unwrap_or(&[])
        };
        stretch_spans_over_change(
            spans_of(change.from.line),
            spans_of(change.to.line),
            change,
            &self.markers,
        )
    }

    /// Update the tree, then everything derived from it, then the selection.
    pub(crate) fn apply_to_tree(
        &mut self,
        change: Change,
        sel_after: Option<Selection>,
        spans: Option<SpanSnapshot>,
    ) {
        let removed = self.lines_between(change.from, change.to);
        let sel_after = sel_after
            .unwrap_or_else(|| map_selection(&self.sel, &change, self.config.selections_may_touch));
        let start = change.from.line - self.first;
        let touched = self.tree.ids(start, change.to.line + 1 - self.first);
        self.max_line_touched(&touched);

        self.update_doc(&change, spans);

        self.max_line_offer(start, start + change.text.len());
        retreat_frontier(&self.tree, self.first, &mut self.frontiers, change.from.line);
        self.op.push(DocEvent::Change(ChangeRecord {
            from: change.from,
            to: change.to,
            text: change.text,
            removed,
            origin: change.origin,
        }));
        self.set_selection_no_undo(sel_after, None);
        if self.cant_edit {
            self.cant_edit = false;
            debug!("edit applied, leaving cant_edit");
        }
    }

    fn update_doc(&mut self, change: &Change, spans: Option<SpanSnapshot>) {
        let text = &change.text;
        let n_text = text.len();
        let (from, to) = (change.from, change.to);
        let (Some(first_id), Some(last_id)) = (self.id_at(from.line), self.id_at(to.line)) else {
            return;
        };
        let mut spans = spans.unwrap_or_default();
        spans.resize(n_text, Vec::new());
        let from_idx = from.line - self.first;
        let nlines = to.line - from.line;
        let last_text = &text[n_text - 1];
        let last_spans = std::mem::take(&mut spans[n_text - 1]);
        let prefix = slice_chars(self.tree.line(first_id).text(), 0, Some(from.ch)).to_string();
        let suffix = slice_chars(self.tree.line(last_id).text(), to.ch, None).to_string();

        if from.ch == 0 && to.ch == 0 && last_text.is_empty() {
            // Whole-line replacement: the line at `to` keeps its identity.
            let added = lines_for(text, &mut spans, 0..n_text - 1);
            let keep = self.tree.line(last_id).text().to_string();
            self.update_line(last_id, keep, last_spans);
            if nlines > 0 {
                self.remove_lines(from_idx, nlines);
            }
            self.insert_lines(from_idx, added);
        } else if nlines == 0 {
            if n_text == 1 {
                self.update_line(first_id, format!("{prefix}{last_text}{suffix}"), last_spans);
            } else {
                let mut added = lines_for(text, &mut spans, 1..n_text - 1);
                added.push((format!("{last_text}{suffix}"), last_spans));
                let first_spans = std::mem::take(&mut spans[0]);
                self.update_line(first_id, format!("{prefix}{}", text[0]), first_spans);
                self.insert_lines(from_idx + 1, added);
            }
        } else if n_text == 1 {
            self.update_line(first_id, format!("{prefix}{}{suffix}", text[0]), last_spans);
            self.remove_lines(from_idx + 1, nlines);
        } else {
            let first_spans = std::mem::take(&mut spans[0]);
            self.update_line(first_id, format!("{prefix}{}", text[0]), first_spans);
            self.update_line(last_id, format!("{last_text}{suffix}"), last_spans);
            let added = lines_for(text, &mut spans, 1..n_text - 1);
            if nlines > 1 {
                self.remove_lines(from_idx + 1, nlines - 1);
            }
            self.insert_lines(from_idx + 1, added);
        }
    }

    fn height_for(&self, spans: &[MarkedSpan]) -> f64 {
        if self.spans_hide_line(spans) {
            0.0
        } else {
            self.config.line_height
        }
    }

    /// Replace the text and spans of a line, keeping marker back-references in sync.
    pub(crate) fn update_line(&mut self, id: LineId, text: String, mut spans: Vec<MarkedSpan>) {
        spans.retain(|s| self.markers.get(s.marker).is_some());
        let old = std::mem::take(&mut self.tree.line_mut(id).marked_spans);
        for span in &old {
            if let Some(marker) = self.markers.get_mut(span.marker) {
                marker.detach_line(id);
            }
        }
        for span in &spans {
            if let Some(marker) = self.markers.get_mut(span.marker) {
                marker.attach_line(id);
            }
        }
        let height = self.height_for(&spans);
        let line = self.tree.line_mut(id);
        if line.text() != text {
            line.set_text(text);
        }
        line.marked_spans = spans;
        self.tree.set_line_height(id, height);
    }

    fn insert_lines(&mut self, at: usize, lines: Vec<NewLine>) {
        if lines.is_empty() {
            return;
        }
        let count = lines.len();
        let built: Vec<Line> = lines
            .into_iter()
            .map(|(text, mut spans)| {
                spans.retain(|s| self.markers.get(s.marker).is_some());
                let height = self.height_for(&spans);
                Line::new(text, spans, height)
            })
            .collect();
        self.tree.insert(at, built);
        for id in self.tree.ids(at, at + count) {
            for span in self.tree.line(id).marked_spans() {
                if let Some(marker) = self.markers.get_mut(span.marker) {
                    marker.attach_line(id);
                }
            }
        }
    }

    fn remove_lines(&mut self, at: usize, count: usize) {
        for id in self.tree.ids(at, at + count) {
            for span in self.tree.line(id).marked_spans() {
                if let Some(marker) = self.markers.get_mut(span.marker) {
                    marker.detach_line(id);
                }
            }
        }
        self.tree.remove(at, count);
    }
}
