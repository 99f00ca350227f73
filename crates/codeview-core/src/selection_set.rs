//! Multi-range selections.

use crate::change::{Change, adjust_for_change, change_end};
use crate::pos::{Pos, max_pos, min_pos};
use serde::{Deserialize, Serialize};

/// One selection range. `head` is the moving end, `anchor` the fixed one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Range {
    /// Fixed end.
    pub anchor: Pos,
    /// Moving end (the cursor).
    pub head: Pos,
}

impl Range {
    /// Create a range.
    pub fn new(anchor: Pos, head: Pos) -> Self {
        Self { anchor, head }
    }

    /// An empty range at `pos`.
    pub fn cursor(pos: Pos) -> Self {
        Self::new(pos, pos)
    }

    /// The smaller endpoint.
    pub fn from(&self) -> Pos {
        min_pos(self.anchor, self.head)
    }

    /// The larger endpoint.
    pub fn to(&self) -> Pos {
        max_pos(self.anchor, self.head)
    }

    /// `true` if anchor and head coincide.
    pub fn is_empty(&self) -> bool {
        self.head == self.anchor
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.anchor.same_cursor(&other.anchor) && self.head.same_cursor(&other.head)
    }
}

/// A sorted, non-overlapping set of ranges with one primary range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// The ranges, sorted by start position.
    pub ranges: Vec<Range>,
    /// Index of the primary range.
    pub prim_index: usize,
}

impl Selection {
    /// A selection with a single range.
    pub fn simple(anchor: Pos, head: Pos) -> Self {
        Self {
            ranges: vec![Range::new(anchor, head)],
            prim_index: 0,
        }
    }

    /// A single cursor.
    pub fn cursor(pos: Pos) -> Self {
        Self::simple(pos, pos)
    }

    /// The primary range.
    pub fn primary(&self) -> Range {
        self.ranges
            .get(self.prim_index)
            .or_else(|| self.ranges.first())
            .copied()
            .unwrap_or_else(|| Range::cursor(Pos::new(0, 0)))
    }

    /// `true` if any range is non-empty.
    pub fn something_selected(&self) -> bool {
        self.ranges.iter().any(|r| !r.is_empty())
    }

    /// Index of the range containing `pos` (inclusive ends), if any.
    pub fn contains(&self, pos: Pos) -> Option<usize> {
        self.ranges
            .iter()
            .position(|r| r.from() <= pos && pos <= r.to())
    }
}

/// Sort ranges and merge the ones that overlap.
///
/// Touching ranges merge too, except when `may_touch` is set and the later range is non-empty.
/// The result keeps pointing at the (possibly merged) primary range. Idempotent.
pub fn normalize_selection(mut ranges: Vec<Range>, prim_index: usize, may_touch: bool) -> Selection {
    if ranges.is_empty() {
        return Selection::cursor(Pos::new(0, 0));
    }
    let prim_index = prim_index.min(ranges.len() - 1);
    let mut tagged: Vec<(bool, Range)> = ranges
        .drain(..)
        .enumerate()
        .map(|(i, r)| (i == prim_index, r))
        .collect();
    tagged.sort_by(|a, b| a.1.from().cmp(&b.1.from()));
    let mut prim = tagged.iter().position(|(p, _)| *p).unwrap_or(0);

    let mut i = 1;
    while i < tagged.len() {
        let cur = tagged[i].1;
        let prev = tagged[i - 1].1;
        let overlaps = if may_touch && !cur.is_empty() {
            prev.to() > cur.from()
        } else {
            prev.to() >= cur.from()
        };
        if overlaps {
            let from = min_pos(prev.from(), cur.from());
            let to = max_pos(prev.to(), cur.to());
            let inverted = if prev.is_empty() {
                cur.from() == cur.head
            } else {
                prev.from() == prev.head
            };
            if i <= prim {
                prim = prim.saturating_sub(1);
            }
            let merged = if inverted {
                Range::new(to, from)
            } else {
                Range::new(from, to)
            };
            tagged.splice(i - 1..=i, [(false, merged)]);
        } else {
            i += 1;
        }
    }
    Selection {
        ranges: tagged.into_iter().map(|(_, r)| r).collect(),
        prim_index: prim,
    }
}

/// Move the head of `range` to `head`.
///
/// With `extending` the anchor stays put; `other` is a second point that must also end up
/// inside the range (for word or line granularity selection).
pub fn extend_range(range: Range, head: Pos, other: Option<Pos>, extending: bool) -> Range {
    if !extending {
        return Range::new(other.unwrap_or(head), head);
    }
    let mut anchor = range.anchor;
    let mut head = head;
    if let Some(other) = other {
        let pos_before = head < anchor;
        if pos_before != (other < anchor) {
            anchor = head;
            head = other;
        } else if pos_before != (head < other) {
            head = other;
        }
    }
    Range::new(anchor, head)
}

/// Map every range through a change and normalize the result.
pub fn map_selection(sel: &Selection, change: &Change, may_touch: bool) -> Selection {
    let ranges = sel
        .ranges
        .iter()
        .map(|r| Range::new(adjust_for_change(r.anchor, change), adjust_for_change(r.head, change)))
        .collect();
    normalize_selection(ranges, sel.prim_index, may_touch)
}

/// Where a replaced selection collapses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collapse {
    /// Cursors after the inserted text.
    #[default]
    End,
    /// Cursors before the inserted text.
    Start,
    /// Select the inserted text.
    Around,
}

fn offset_pos(pos: Pos, old: Pos, new: Pos) -> Pos {
    if pos.line == old.line {
        Pos::new(new.line, pos.ch + new.ch - old.ch)
    } else {
        Pos::new(new.line + (pos.line - old.line), pos.ch)
    }
}

/// Selection after replacing each range of `sel` by the matching change of `changes`.
///
/// `changes` must be sorted and correspond one-to-one to `sel.ranges`. Only meaningful for
/// [`Collapse::Start`] and [`Collapse::Around`]; [`Collapse::End`] falls out of mapping.
pub fn compute_replaced_sel(
    sel: &Selection,
    changes: &[Change],
    collapse: Collapse,
    first: usize,
) -> Selection {
    let mut out = Vec::with_capacity(changes.len());
    let mut old_prev = Pos::new(first, 0);
    let mut new_prev = old_prev;
    for (i, change) in changes.iter().enumerate() {
        let from = offset_pos(change.from, old_prev, new_prev);
        let to = offset_pos(change_end(change), old_prev, new_prev);
        old_prev = change.to;
        new_prev = to;
        let range = match collapse {
            Collapse::Around => {
                let inverted = sel.ranges.get(i).is_some_and(|r| r.head < r.anchor);
                if inverted {
                    Range::new(to, from)
                } else {
                    Range::new(from, to)
                }
            }
            Collapse::Start | Collapse::End => Range::cursor(from),
        };
        out.push(range);
    }
    Selection {
        ranges: out,
        prim_index: sel.prim_index,
    }
}
