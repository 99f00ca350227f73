//! Marker creation, queries and atomic-range handling.

use super::Document;
use crate::change::Change;
use crate::error::DocError;
use crate::markers::{MarkerId, MarkerKind, MarkerOptions, MarkerRange, TextMarker};
use crate::movement::MoveDir;
use crate::operation::DocEvent;
use crate::pos::Pos;
use crate::selection_set::{Range, Selection, normalize_selection};
use crate::spans::{MarkedSpan, span_for};
use std::cmp::Ordering;
use std::ops::ControlFlow;
use tracing::debug;

fn cmp(a: Pos, b: Pos) -> i32 {
    a.cmp(&b) as i32
}

fn extra_left(options: &MarkerOptions) -> i32 {
    if options.inclusive_left { -1 } else { 0 }
}

fn extra_right(options: &MarkerOptions) -> i32 {
    if options.inclusive_right { 1 } else { 0 }
}

impl Document {
    /// Mark the range `from..to`.
    ///
    /// An empty (or inverted) range creates no marker unless `clear_when_empty` is off; the
    /// returned id is then not live and [`Document::find_marker`] gives `None` for it.
    ///
    /// ```rust
    /// use codeview_core::{Document, MarkerOptions, Pos};
    ///
    /// let mut doc = Document::new("let x = 1;");
    /// let id = doc.mark_text(Pos::new(0, 4), Pos::new(0, 5), MarkerOptions::default()).unwrap();
    /// doc.replace_range("long_name", Pos::new(0, 4), Pos::new(0, 4), None).unwrap();
    /// let range = doc.find_marker(id).unwrap();
    /// assert_eq!((range.from.ch, range.to.ch), (13, 14));
    /// ```
    pub fn mark_text(&mut self, from: Pos, to: Pos, options: MarkerOptions) -> Result<MarkerId, DocError> {
        self.operation(|doc| doc.mark_inner(from, to, options, MarkerKind::Range))
    }

    /// Place a bookmark at `pos`. Bookmarks never disappear when their range is empty.
    pub fn set_bookmark(&mut self, pos: Pos, options: MarkerOptions) -> Result<MarkerId, DocError> {
        let options = MarkerOptions {
            clear_when_empty: false,
            ..options
        };
        self.operation(|doc| doc.mark_inner(pos, pos, options, MarkerKind::Bookmark))
    }

    fn mark_inner(
        &mut self,
        from: Pos,
        to: Pos,
        options: MarkerOptions,
        kind: MarkerKind,
    ) -> Result<MarkerId, DocError> {
        let (from, to) = (self.clip_pos(from), self.clip_pos(to));
        let marker = TextMarker::new(kind, options);
        let id = marker.id;
        if from > to || (from == to && marker.options.clear_when_empty) {
            debug!(marker = id.0, "empty marker range, nothing attached");
            return Ok(id);
        }
        let options = marker.options.clone();
        if options.collapsed
            && (self.conflicting_collapsed_range(from.line, from, to, &options)
                || (from.line != to.line && self.conflicting_collapsed_range(to.line, from, to, &options)))
        {
            return Err(DocError::CollapsedOverlap);
        }

        if options.add_to_history {
            let change = Change::from_lines(from, to, self.lines_between(from, to)).with_origin("markText");
            self.record_change_as(&change, self.sel.clone(), 0);
            self.history.borrow_mut().split();
        }

        self.markers.insert(marker);
        for n in from.line..=to.line {
            let Some(line_id) = self.id_at(n) else {
                continue;
            };
            let span = MarkedSpan::new(
                id,
                (n == from.line).then_some(from.ch),
                (n == to.line).then_some(to.ch),
            );
            self.tree.line_mut(line_id).marked_spans.push(span);
            if let Some(marker) = self.markers.get_mut(id) {
                marker.attach_line(line_id);
            }
        }
        if options.collapsed {
            self.refresh_heights(from.line, to.line + 1);
        }
        if options.read_only {
            let has_history = {
                let hist = self.history.borrow();
                !hist.done.is_empty() || !hist.undone.is_empty()
            };
            if has_history {
                self.clear_history();
            }
        }
        Ok(id)
    }

    fn conflicting_collapsed_range(&self, n: usize, from: Pos, to: Pos, options: &MarkerOptions) -> bool {
        let Some(line_id) = self.id_at(n) else {
            return false;
        };
        for span in self.tree.line(line_id).marked_spans() {
            let Some(other) = self.markers.get(span.marker) else {
                continue;
            };
            if !other.options.collapsed {
                continue;
            }
            let Some(found) = self.find_marker(span.marker) else {
                continue;
            };
            let other = &other.options;
            let from_cmp = match cmp(found.from, from) {
                0 => extra_left(other) - extra_left(options),
                c => c,
            };
            let to_cmp = match cmp(found.to, to) {
                0 => extra_right(other) - extra_right(options),
                c => c,
            };
            if (from_cmp >= 0 && to_cmp <= 0) || (from_cmp <= 0 && to_cmp >= 0) {
                continue;
            }
            let touching = other.inclusive_right && options.inclusive_left;
            let left_overlap = from_cmp <= 0
                && if touching {
                    cmp(found.to, from) >= 0
                } else {
                    cmp(found.to, from) > 0
                };
            let right_overlap = from_cmp >= 0
                && if touching {
                    cmp(found.from, to) <= 0
                } else {
                    cmp(found.from, to) < 0
                };
            if left_overlap || right_overlap {
                return true;
            }
        }
        false
    }

    /// Recompute the heights of lines `from..to` from their collapsed spans.
    fn refresh_heights(&mut self, from: usize, to: usize) {
        for n in from..to {
            let Some(line_id) = self.id_at(n) else {
                continue;
            };
            let height = if self.spans_hide_line(self.tree.line(line_id).marked_spans()) {
                0.0
            } else {
                self.config.line_height
            };
            self.tree.set_line_height(line_id, height);
        }
    }

    /// `true` if a collapsed marker covers the start of a line with these spans.
    pub(crate) fn spans_hide_line(&self, spans: &[MarkedSpan]) -> bool {
        spans.iter().any(|span| {
            span.from.is_none()
                && self
                    .markers
                    .get(span.marker)
                    .is_some_and(|m| m.options.collapsed)
        })
    }

    /// A live marker.
    pub fn marker(&self, id: MarkerId) -> Option<&TextMarker> {
        self.markers.get(id)
    }

    /// Current extent of a marker, or `None` if it is cleared or no longer attached to text.
    pub fn find_marker(&self, id: MarkerId) -> Option<MarkerRange> {
        let marker = self.markers.get(id)?;
        let mut from = None;
        let mut to = None;
        for &line_id in &marker.lines {
            let n = self.line_no(line_id);
            let Some(span) = span_for(self.tree.line(line_id).marked_spans(), id) else {
                continue;
            };
            if let Some(ch) = span.from {
                from = Some(Pos::new(n, ch));
            }
            if let Some(ch) = span.to {
                to = Some(Pos::new(n, ch));
            }
        }
        let from = from?;
        Some(MarkerRange {
            from,
            to: to.unwrap_or(from),
        })
    }

    /// Remove a marker. Fails with [`DocError::UnknownMarker`] if it is not live.
    pub fn clear_marker(&mut self, id: MarkerId) -> Result<(), DocError> {
        self.operation(|doc| doc.clear_marker_inner(id))
    }

    pub(crate) fn clear_marker_inner(&mut self, id: MarkerId) -> Result<(), DocError> {
        let marker = self.markers.remove(id).ok_or(DocError::UnknownMarker(id))?;
        for &line_id in &marker.lines {
            self.tree
                .line_mut(line_id)
                .marked_spans
                .retain(|span| span.marker != id);
            if marker.options.collapsed {
                let n = self.line_no(line_id);
                self.refresh_heights(n, n + 1);
            }
        }
        self.op.push(DocEvent::MarkerCleared(id));
        if marker.options.atomic && self.cant_edit {
            self.cant_edit = false;
            debug!(marker = id.0, "atomic marker cleared, leaving cant_edit");
            let sel = self.skip_atomic_in_selection(self.sel.clone(), MoveDir::Forward, false);
            self.set_selection_inner(sel);
        }
        Ok(())
    }

    /// Markers whose range contains `pos` (endpoints included).
    pub fn find_marks_at(&self, pos: Pos) -> Vec<MarkerId> {
        let pos = self.clip_pos(pos);
        let Some(line_id) = self.id_at(pos.line) else {
            return Vec::new();
        };
        self.tree
            .line(line_id)
            .marked_spans()
            .iter()
            .filter(|span| {
                span.from.is_none_or(|from| from <= pos.ch) && span.to.is_none_or(|to| to >= pos.ch)
            })
            .map(|span| span.marker)
            .collect()
    }

    /// Markers overlapping `from..to` that satisfy `filter`.
    pub fn find_marks(&self, from: Pos, to: Pos, filter: impl Fn(&TextMarker) -> bool) -> Vec<MarkerId> {
        let (from, to) = (self.clip_pos(from), self.clip_pos(to));
        let mut found = Vec::new();
        let mut n = from.line;
        self.tree.iterate(from.line - self.first, to.line + 1 - self.first, |_, line| {
            for span in line.marked_spans() {
                let outside = (span.to.is_some_and(|t| n == from.line && from.ch >= t))
                    || (span.from.is_none() && n != from.line)
                    || (span.from.is_some_and(|f| n == to.line && f >= to.ch));
                if !outside && self.markers.get(span.marker).is_some_and(&filter) && !found.contains(&span.marker) {
                    found.push(span.marker);
                }
            }
            n += 1;
            ControlFlow::Continue(())
        });
        found
    }

    /// Every marker attached to the document, in document order.
    pub fn all_marks(&self) -> Vec<MarkerId> {
        let mut found = Vec::new();
        self.tree.iterate(0, self.tree.len(), |_, line| {
            found.extend(line.marked_spans().iter().filter(|s| s.from.is_some()).map(|s| s.marker));
            ControlFlow::Continue(())
        });
        found
    }

    /// First line of the visual line containing line `n` (lines joined by collapsed markers
    /// form one visual line).
    pub fn visual_line(&self, n: usize) -> Result<usize, DocError> {
        let mut line_id = self.check_line(n)?;
        if !self.markers.any_collapsed() {
            return Ok(n);
        }
        let mut n = n;
        loop {
            let joined = self.tree.line(line_id).marked_spans().iter().find(|span| {
                span.from.is_none()
                    && self
                        .markers
                        .get(span.marker)
                        .is_some_and(|m| m.options.collapsed)
            });
            let Some(start) = joined.and_then(|span| self.find_marker(span.marker)) else {
                return Ok(n);
            };
            if start.from.line >= n {
                return Ok(n);
            }
            n = start.from.line;
            line_id = self.check_line(n)?;
        }
    }

    /// `true` if line `n` is hidden inside a collapsed marker.
    pub fn line_is_hidden(&self, n: usize) -> Result<bool, DocError> {
        let line_id = self.check_line(n)?;
        if !self.markers.any_collapsed() {
            return Ok(false);
        }
        Ok(self.spans_hide_line(self.tree.line(line_id).marked_spans()))
    }

    fn move_pos(&self, pos: Pos, dir: MoveDir) -> Option<Pos> {
        match dir {
            MoveDir::Backward if pos.ch == 0 => {
                (pos.line > self.first).then(|| self.clip_pos(Pos::new(pos.line - 1, usize::MAX)))
            }
            MoveDir::Forward if pos.ch >= self.line_len(pos.line) => {
                (pos.line < self.last_line()).then(|| Pos::new(pos.line + 1, 0))
            }
            MoveDir::Backward => Some(Pos::new(pos.line, pos.ch - 1)),
            MoveDir::Forward => Some(Pos::new(pos.line, pos.ch + 1)),
        }
    }

    /// Move `pos` out of any atomic marker, preferring direction `bias`.
    ///
    /// `old` is where the cursor came from; it decides whether a marker is entered from the
    /// near or the far side. With `may_clear`, `clear_on_enter` markers the position lands in
    /// are cleared. When there is no escape in either direction the document enters the
    /// `cant_edit` state and the first position is returned.
    pub fn skip_atomic(&mut self, pos: Pos, old: Option<Pos>, bias: MoveDir, may_clear: bool) -> Pos {
        let mut attempts = vec![(bias, may_clear), (bias.reverse(), may_clear)];
        if !may_clear {
            attempts.insert(1, (bias, true));
            attempts.push((bias.reverse(), true));
        }
        for (dir, clear) in attempts {
            if let Some(found) = self.skip_atomic_inner(pos, old, dir, clear) {
                return found;
            }
        }
        if !self.cant_edit {
            debug!(pos = %pos, "no position outside atomic markers, entering cant_edit");
        }
        self.cant_edit = true;
        Pos::new(self.first, 0)
    }

    fn skip_atomic_inner(&mut self, pos: Pos, old: Option<Pos>, dir: MoveDir, may_clear: bool) -> Option<Pos> {
        let line_id = self.id_at(pos.line)?;
        let back = dir == MoveDir::Backward;
        let mut i = 0;
        loop {
            let Some(&span) = self.tree.line(line_id).marked_spans().get(i) else {
                return Some(pos);
            };
            let Some(marker) = self.markers.get(span.marker) else {
                i += 1;
                continue;
            };
            let options = &marker.options;
            let prevent_left = options.select_left.map_or(options.inclusive_left, |s| !s);
            let prevent_right = options.select_right.map_or(options.inclusive_right, |s| !s);
            let (atomic, clear_on_enter) = (options.atomic, options.clear_on_enter);
            let inside = span
                .from
                .is_none_or(|from| if prevent_left { from <= pos.ch } else { from < pos.ch })
                && span
                    .to
                    .is_none_or(|to| if prevent_right { to >= pos.ch } else { to > pos.ch });
            if !inside {
                i += 1;
                continue;
            }
            if may_clear && clear_on_enter {
                // Clearing removes the span, so index `i` now holds the next one.
                let _ = self.clear_marker_inner(span.marker);
                continue;
            }
            if !atomic {
                i += 1;
                continue;
            }
            let range = self.find_marker(span.marker)?;

            if let Some(old) = old {
                let mut near = Some(if back { range.to } else { range.from });
                if if back { prevent_right } else { prevent_left } {
                    near = near.and_then(|p| self.move_pos(p, dir.reverse()));
                }
                if let Some(near) = near.filter(|near| near.line == pos.line) {
                    let diff = near.cmp(&old);
                    let wanted = if back { Ordering::Less } else { Ordering::Greater };
                    if diff == wanted {
                        return self.skip_atomic_inner(near, Some(pos), dir, may_clear);
                    }
                }
            }

            let mut far = Some(if back { range.from } else { range.to });
            if if back { prevent_left } else { prevent_right } {
                far = far.and_then(|p| self.move_pos(p, dir));
            }
            return match far {
                Some(far) => self.skip_atomic_inner(far, Some(pos), dir, may_clear),
                None => None,
            };
        }
    }

    fn has_cursor_markers(&self) -> bool {
        self.markers
            .iter()
            .any(|m| m.options.atomic || m.options.clear_on_enter)
    }

    /// Apply [`Document::skip_atomic`] to every endpoint of `sel`.
    pub(crate) fn skip_atomic_in_selection(&mut self, sel: Selection, bias: MoveDir, may_clear: bool) -> Selection {
        if !self.has_cursor_markers() {
            return sel;
        }
        let current = self.sel.clone();
        let same_shape = sel.ranges.len() == current.ranges.len();
        let mut changed = false;
        let mut out = Vec::with_capacity(sel.ranges.len());
        for (i, range) in sel.ranges.iter().enumerate() {
            let old = same_shape.then(|| current.ranges[i]);
            let anchor = self.skip_atomic(range.anchor, old.map(|r| r.anchor), bias, may_clear);
            let head = if range.head.same_cursor(&range.anchor) {
                anchor
            } else {
                self.skip_atomic(range.head, old.map(|r| r.head), bias, may_clear)
            };
            changed |= !anchor.same_cursor(&range.anchor) || !head.same_cursor(&range.head);
            out.push(Range::new(anchor, head));
        }
        if changed {
            normalize_selection(out, sel.prim_index, self.config.selections_may_touch)
        } else {
            sel
        }
    }
}
