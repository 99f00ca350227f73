//! Selection setters, selection text and horizontal motion.

use super::Document;
use crate::bidi::{BidiSpan, Direction, bidi_ordering};
use crate::change::Change;
use crate::error::DocError;
use crate::movement::{MoveDir, end_of_line, move_logically, move_visually};
use crate::operation::DocEvent;
use crate::pos::Pos;
use crate::selection_set::{Collapse, Range, Selection, compute_replaced_sel, extend_range, normalize_selection};
use std::time::Instant;

/// Options of the selection setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    /// Origin used for merging selection events in the history.
    pub origin: Option<String>,
    /// Direction to leave atomic markers in. By default it follows the movement of the primary
    /// head.
    pub bias: Option<MoveDir>,
    /// Drop pending redo selection events.
    pub clear_redo: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            origin: None,
            bias: None,
            clear_redo: true,
        }
    }
}

impl SelectionOptions {
    /// Options with an origin.
    pub fn with_origin(origin: &str) -> Self {
        Self {
            origin: Some(origin.to_string()),
            ..Self::default()
        }
    }
}

/// Unit of [`Document::move_h`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveUnit {
    /// One grapheme, wrapping to the neighbouring line at the edges.
    #[default]
    Char,
    /// One grapheme, staying on the line.
    Column,
}

/// Result of [`Document::move_h`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    /// Where the cursor ends up.
    pub pos: Pos,
    /// The move was blocked by the document or line edge.
    pub hit_side: bool,
}

impl Document {
    /// Current selection.
    pub fn selection(&self) -> &Selection {
        &self.sel
    }

    /// `true` if any range is non-empty.
    pub fn something_selected(&self) -> bool {
        self.sel.something_selected()
    }

    /// Text of every range, in document order.
    pub fn get_selections(&self, sep: Option<&str>) -> Vec<String> {
        let sep = self.separator(sep);
        self.sel
            .ranges
            .iter()
            .map(|r| self.lines_between(r.from(), r.to()).join(sep))
            .collect()
    }

    /// Text of all ranges, joined with `sep` (or the configured separator).
    pub fn get_selection(&self, sep: Option<&str>) -> String {
        let lines: Vec<String> = self
            .sel
            .ranges
            .iter()
            .flat_map(|r| self.lines_between(r.from(), r.to()))
            .collect();
        lines.join(self.separator(sep))
    }

    /// Replace the selection and record it in the history.
    pub fn set_selection(&mut self, sel: Selection, options: SelectionOptions) {
        self.operation(|doc| {
            let ranges = sel
                .ranges
                .iter()
                .map(|r| Range::new(doc.clip_pos(r.anchor), doc.clip_pos(r.head)))
                .collect();
            let sel = normalize_selection(ranges, sel.prim_index, doc.config.selections_may_touch);
            doc.set_selection_no_undo(sel, options.bias);
            let now = Instant::now();
            doc.history.borrow_mut().add_selection(
                doc.sel.clone(),
                doc.op.id,
                options.origin.as_deref(),
                options.clear_redo,
                now,
            );
        });
    }

    /// Replace the selection with `ranges`. An empty list is ignored.
    pub fn set_selections(&mut self, ranges: Vec<Range>, primary: Option<usize>, options: SelectionOptions) {
        if ranges.is_empty() {
            return;
        }
        let prim = primary.unwrap_or(self.sel.prim_index).min(ranges.len() - 1);
        self.set_selection(
            Selection {
                ranges,
                prim_index: prim,
            },
            options,
        );
    }

    /// Collapse the selection to a cursor at `pos`.
    pub fn set_cursor(&mut self, pos: Pos) {
        self.set_selection(Selection::cursor(pos), SelectionOptions::default());
    }

    /// Turn shift-extend mode on or off.
    pub fn set_extending(&mut self, extending: bool) {
        self.extend = extending;
    }

    /// `true` in shift-extend mode.
    pub fn extending(&self) -> bool {
        self.extend
    }

    /// Move the primary head to `head`, keeping the anchor in extend mode. Other ranges are
    /// dropped.
    pub fn extend_selection(&mut self, head: Pos, other: Option<Pos>, options: SelectionOptions) {
        let head = self.clip_pos(head);
        let other = other.map(|p| self.clip_pos(p));
        let range = extend_range(self.sel.primary(), head, other, self.extend);
        self.set_selection(
            Selection {
                ranges: vec![range],
                prim_index: 0,
            },
            options,
        );
    }

    /// Add a range and make it primary.
    pub fn add_selection(&mut self, anchor: Pos, head: Option<Pos>) {
        let anchor = self.clip_pos(anchor);
        let head = head.map_or(anchor, |h| self.clip_pos(h));
        let mut ranges = self.sel.ranges.clone();
        let prim = ranges.len();
        ranges.push(Range::new(anchor, head));
        let sel = normalize_selection(ranges, prim, self.config.selections_may_touch);
        self.set_selection(sel, SelectionOptions::default());
    }

    /// Replace every selected range with `text`.
    ///
    /// Fails without changing anything if a read-only marker intersects one of the ranges.
    ///
    /// ```rust
    /// use codeview_core::{Collapse, Document, Pos, Range};
    ///
    /// let mut doc = Document::new("a b c");
    /// doc.set_selections(
    ///     vec![Range::new(Pos::new(0, 0), Pos::new(0, 1)), Range::new(Pos::new(0, 4), Pos::new(0, 5))],
    ///     None,
    ///     Default::default(),
    /// );
    /// doc.replace_selection("xy", Collapse::Around, None).unwrap();
    /// assert_eq!(doc.get_value(None), "xy b xy");
    /// assert_eq!(doc.get_selection(Some("|")), "xy|xy");
    /// ```
    pub fn replace_selection(&mut self, text: &str, collapse: Collapse, origin: Option<&str>) -> Result<(), DocError> {
        let lines = self.config.split_lines(text);
        let changes: Vec<Change> = self
            .sel
            .ranges
            .iter()
            .map(|r| {
                let mut change = Change::from_lines(r.from(), r.to(), lines.clone());
                change.origin = origin.map(str::to_string);
                change
            })
            .collect();
        for change in &changes {
            self.check_read_only(change)?;
        }
        let new_sel = (collapse != Collapse::End)
            .then(|| compute_replaced_sel(&self.sel, &changes, collapse, self.first));
        self.operation(|doc| {
            for change in changes.into_iter().rev() {
                doc.make_change(change, true)?;
            }
            if let Some(sel) = new_sel {
                let replaced = doc.history.borrow_mut().replace_top_selection(sel.clone());
                if replaced {
                    doc.set_selection_no_undo(sel, None);
                } else {
                    doc.set_selection(sel, SelectionOptions::default());
                }
            }
            Ok(())
        })
    }

    /// Set the selection without touching the history; endpoints leave atomic markers.
    pub(crate) fn set_selection_no_undo(&mut self, sel: Selection, bias: Option<MoveDir>) {
        let bias = bias.unwrap_or_else(|| {
            if sel.primary().head < self.sel.primary().head {
                MoveDir::Backward
            } else {
                MoveDir::Forward
            }
        });
        let sel = self.skip_atomic_in_selection(sel, bias, true);
        self.set_selection_inner(sel);
    }

    pub(crate) fn set_selection_inner(&mut self, sel: Selection) {
        if sel == self.sel {
            return;
        }
        self.sel = sel;
        self.op.push(DocEvent::CursorActivity);
    }

    /// Visual run order of line `n` under the configured direction; `None` when the line
    /// needs no reordering.
    pub fn bidi_order(&mut self, n: usize) -> Result<Option<Vec<BidiSpan>>, DocError> {
        let id = self.check_line(n)?;
        let direction = self.config.direction;
        let line = self.tree.line_mut(id);
        if let Some((cached, order)) = &line.bidi {
            if *cached == direction {
                return Ok(order.clone());
            }
        }
        let order = bidi_ordering(line.text(), direction);
        line.bidi = Some((direction, order.clone()));
        Ok(order)
    }

    /// Change the base text direction. Cached orderings are dropped.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.config.direction == direction {
            return;
        }
        self.config.direction = direction;
        for id in self.tree.ids(0, self.tree.len()) {
            self.tree.line_mut(id).bidi = None;
        }
    }

    /// Position one step from `pos` in direction `dir`, skipping atomic markers.
    ///
    /// With `visually`, `dir` is screen direction and bidirectional runs are honoured.
    ///
    /// ```rust
    /// use codeview_core::{Document, MoveDir, MoveUnit, Pos};
    ///
    /// let mut doc = Document::new("ab\ncd");
    /// let motion = doc.move_h(Pos::new(0, 2), MoveDir::Forward, MoveUnit::Char, false);
    /// assert_eq!(motion.pos, Pos::new(1, 0));
    /// let motion = doc.move_h(Pos::new(1, 2), MoveDir::Forward, MoveUnit::Char, false);
    /// assert!(motion.hit_side);
    /// ```
    pub fn move_h(&mut self, pos: Pos, dir: MoveDir, unit: MoveUnit, visually: bool) -> Motion {
        let old = self.clip_pos(pos);
        let line_dir = if visually && self.config.direction == Direction::Rtl {
            dir.reverse()
        } else {
            dir
        };
        let direction = self.config.direction;
        let order = self.bidi_order(old.line).ok().flatten();
        let text = self.text_at(old.line);
        let next = if visually {
            move_visually(text, order.as_deref(), direction, old, dir)
        } else {
            move_logically(text, old, dir)
        };
        let moved = match next {
            Some(next) => Some(next),
            None if unit == MoveUnit::Char => {
                let line = match line_dir {
                    MoveDir::Backward => old.line.checked_sub(1).filter(|&l| l >= self.first),
                    MoveDir::Forward => Some(old.line + 1).filter(|&l| l <= self.last_line()),
                };
                line.map(|line| {
                    let order = self.bidi_order(line).ok().flatten();
                    end_of_line(self.text_at(line), order.as_deref(), direction, line, line_dir, visually)
                })
            }
            None => None,
        };
        let target = moved.unwrap_or(old);
        let pos = self.operation(|doc| doc.skip_atomic(target, Some(old), dir, true));
        Motion {
            pos,
            hit_side: pos.same_cursor(&old),
        }
    }
}
