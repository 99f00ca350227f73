//! Undo/redo history.
//!
//! The `done` stack interleaves selection snapshots and change groups:
//! `[sel, changes, sel, changes, sel]`. Each change group stores the *inverse* of what was
//! applied (the range now covered by the inserted text, plus the removed text), so undoing a
//! group is applying its changes in reverse order.

use crate::change::{Change, change_end};
use crate::error::DocError;
use crate::pos::Pos;
use crate::selection_set::Selection;
use crate::spans::SpanSnapshot;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// One recorded change, stored as its inverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryChange {
    /// Start of the range to replace when undoing.
    pub from: Pos,
    /// End of the range to replace when undoing.
    pub to: Pos,
    /// Text that was removed (and is restored by undo).
    pub text: Vec<String>,
    /// Marker spans of the removed lines.
    #[serde(skip)]
    pub spans: Option<SpanSnapshot>,
}

impl HistoryChange {
    pub(crate) fn to_change(&self, origin: &str) -> Change {
        Change {
            from: self.from,
            to: self.to,
            text: self.text.clone(),
            origin: Some(origin.to_string()),
        }
    }
}

/// A group of changes undone together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeGroup {
    /// Changes in the order they were applied.
    pub changes: Vec<HistoryChange>,
    /// Document generation before the group was applied.
    pub generation: u64,
}

/// An entry of the undo or redo stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// A selection snapshot.
    Selection(Selection),
    /// A group of text changes.
    Changes(ChangeGroup),
}

impl HistoryEvent {
    fn is_selection(&self) -> bool {
        matches!(self, HistoryEvent::Selection(_))
    }
}

/// Number of undoable and redoable change groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistorySize {
    /// Undo steps available.
    pub undo: usize,
    /// Redo steps available.
    pub redo: usize,
}

/// Which stack to take an event from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    /// Take from `done`, push onto `undone`.
    Undo,
    /// Take from `undone`, push onto `done`.
    Redo,
}

impl HistoryDirection {
    /// Origin tag of the changes produced by this direction.
    pub fn origin(self) -> &'static str {
        match self {
            HistoryDirection::Undo => "undo",
            HistoryDirection::Redo => "redo",
        }
    }
}

/// What [`History::take_event`] found.
#[derive(Debug)]
pub(crate) enum TakenEvent {
    /// Nothing usable on the source stack.
    Nothing,
    /// Only a selection needs restoring.
    Selection(Selection),
    /// A change group to apply (in reverse order).
    Changes(ChangeGroup),
}

/// Plain-data copy of the undo and redo stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Undo stack.
    pub done: Vec<HistoryEvent>,
    /// Redo stack.
    pub undone: Vec<HistoryEvent>,
}

impl HistorySnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, DocError> {
        serde_json::to_string(self).map_err(|err| DocError::Serialization(err.to_string()))
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, DocError> {
        serde_json::from_str(json).map_err(|err| DocError::Serialization(err.to_string()))
    }
}

/// Undo/redo state of one document (or of a group of linked documents sharing it).
#[derive(Debug, Clone)]
pub struct History {
    pub(crate) done: Vec<HistoryEvent>,
    pub(crate) undone: Vec<HistoryEvent>,
    undo_depth: usize,
    event_delay: Duration,
    last_mod_time: Option<Instant>,
    last_sel_time: Option<Instant>,
    last_op: Option<u64>,
    last_sel_op: Option<u64>,
    last_origin: Option<String>,
    last_sel_origin: Option<String>,
    pub(crate) generation: u64,
    max_generation: u64,
}

impl History {
    /// Empty history.
    pub fn new(undo_depth: usize, event_delay: Duration) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            undo_depth,
            event_delay,
            last_mod_time: None,
            last_sel_time: None,
            last_op: None,
            last_sel_op: None,
            last_origin: None,
            last_sel_origin: None,
            generation: 1,
            max_generation: 1,
        }
    }

    /// Empty history that continues the generation numbering of `prev`.
    pub fn continued_from(prev: &History) -> Self {
        let mut hist = Self::new(prev.undo_depth, prev.event_delay);
        hist.generation = prev.max_generation;
        hist.max_generation = prev.max_generation;
        hist
    }

    /// Current generation; changes whenever the content changes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of undo and redo steps.
    pub fn size(&self) -> HistorySize {
        let count = |events: &[HistoryEvent]| events.iter().filter(|e| !e.is_selection()).count();
        HistorySize {
            undo: count(&self.done),
            redo: count(&self.undone),
        }
    }

    /// Force the next change to start a new undo step.
    pub fn split(&mut self) {
        self.last_op = None;
        self.last_sel_op = None;
        self.last_origin = None;
    }

    /// Copy of the stacks (without span snapshots).
    pub fn snapshot(&self) -> HistorySnapshot {
        let strip = |events: &[HistoryEvent]| {
            events
                .iter()
                .map(|event| match event {
                    HistoryEvent::Changes(group) => HistoryEvent::Changes(ChangeGroup {
                        changes: group
                            .changes
                            .iter()
                            .map(|c| HistoryChange {
                                spans: None,
                                ..c.clone()
                            })
                            .collect(),
                        generation: group.generation,
                    }),
                    other => other.clone(),
                })
                .collect()
        };
        HistorySnapshot {
            done: strip(&self.done),
            undone: strip(&self.undone),
        }
    }

    /// Replace the stacks with the content of a snapshot.
    pub fn restore(&mut self, snapshot: HistorySnapshot) {
        let mut fresh = Self::continued_from(self);
        fresh.done = snapshot.done;
        fresh.undone = snapshot.undone;
        *self = fresh;
    }

    /// Record an applied change.
    ///
    /// `make_entry` builds the inverse entry; it is only called when the change cannot be folded
    /// into the previous entry.
    pub(crate) fn add_change(
        &mut self,
        change: &Change,
        sel_before: &Selection,
        sel_after: Selection,
        op_id: u64,
        now: Instant,
        make_entry: impl FnOnce() -> HistoryChange,
    ) {
        self.undone.clear();
        let origin = change.origin.as_deref();
        let same_op = self.last_op == Some(op_id);
        let origin_merges = match origin {
            Some(o) if self.last_origin.as_deref() == Some(o) => {
                (o.starts_with('+') && self.within_delay(self.last_mod_time, now))
                    || o.starts_with('*')
            }
            _ => false,
        };

        if (same_op || origin_merges) && self.last_change_event(same_op) {
            if let Some(HistoryEvent::Changes(cur)) = self.done.last_mut() {
                let is_insert = change.from == change.to;
                match cur.changes.last_mut() {
                    Some(last) if is_insert && change.from == last.to => {
                        last.to = change_end(change);
                    }
                    _ => cur.changes.push(make_entry()),
                }
            }
        } else {
            if !self.done.last().is_some_and(HistoryEvent::is_selection) {
                push_selection(&mut self.done, sel_before.clone());
            }
            self.done.push(HistoryEvent::Changes(ChangeGroup {
                changes: vec![make_entry()],
                generation: self.generation,
            }));
            self.evict();
        }

        self.done.push(HistoryEvent::Selection(sel_after));
        self.max_generation += 1;
        self.generation = self.max_generation;
        self.last_mod_time = Some(now);
        self.last_sel_time = Some(now);
        self.last_op = Some(op_id);
        self.last_sel_op = Some(op_id);
        self.last_origin = change.origin.clone();
        self.last_sel_origin = change.origin.clone();
    }

    /// Record a selection change.
    pub(crate) fn add_selection(
        &mut self,
        sel: Selection,
        op_id: u64,
        origin: Option<&str>,
        clear_redo: bool,
        now: Instant,
    ) {
        let top_is_selection = self.done.last().is_some_and(HistoryEvent::is_selection);
        let replace = top_is_selection
            && (self.last_sel_op == Some(op_id)
                || match origin {
                    Some(o) if self.last_sel_origin.as_deref() == Some(o) => {
                        (self.last_mod_time == self.last_sel_time
                            && self.last_origin.as_deref() == Some(o))
                            || self.selection_can_merge(o, &sel, now)
                    }
                    _ => false,
                });

        if replace {
            if let Some(last) = self.done.last_mut() {
                *last = HistoryEvent::Selection(sel);
            }
        } else {
            push_selection(&mut self.done, sel);
        }

        self.last_sel_time = Some(now);
        self.last_sel_origin = origin.map(str::to_string);
        self.last_sel_op = Some(op_id);
        if clear_redo {
            clear_selection_events(&mut self.undone);
        }
    }

    /// Pop the next event for undo/redo.
    ///
    /// Selection snapshots on top of the source stack are moved to the destination stack. For
    /// a change group, the selection to restore and an empty anti-group are pushed onto the
    /// destination; fill it with [`History::push_anti_change`].
    pub(crate) fn take_event(
        &mut self,
        dir: HistoryDirection,
        allow_selection_only: bool,
        current: &Selection,
    ) -> TakenEvent {
        let usable = self.source(dir).iter().any(|event| match event {
            HistoryEvent::Selection(sel) => allow_selection_only && sel != current,
            HistoryEvent::Changes(_) => !allow_selection_only,
        });
        if !usable {
            return TakenEvent::Nothing;
        }
        self.last_origin = None;
        self.last_sel_origin = None;

        let mut sel_after = current.clone();
        loop {
            match self.source_mut(dir).pop() {
                Some(HistoryEvent::Selection(sel)) => {
                    push_selection(self.dest_mut(dir), sel.clone());
                    if allow_selection_only && &sel != current {
                        return TakenEvent::Selection(sel);
                    }
                    sel_after = sel;
                }
                Some(HistoryEvent::Changes(group)) => {
                    push_selection(self.dest_mut(dir), sel_after);
                    let generation = self.generation;
                    self.dest_mut(dir).push(HistoryEvent::Changes(ChangeGroup {
                        changes: Vec::new(),
                        generation,
                    }));
                    self.generation = if group.generation > 0 {
                        group.generation
                    } else {
                        self.max_generation += 1;
                        self.max_generation
                    };
                    return TakenEvent::Changes(group);
                }
                None => return TakenEvent::Nothing,
            }
        }
    }

    /// Append an inverse change to the group pushed by [`History::take_event`].
    pub(crate) fn push_anti_change(&mut self, dir: HistoryDirection, entry: HistoryChange) {
        if let Some(HistoryEvent::Changes(group)) = self.dest_mut(dir).last_mut() {
            group.changes.push(entry);
        }
    }

    /// Overwrite the selection snapshot on top of `done`. Returns `false` if the top is a
    /// change group.
    pub(crate) fn replace_top_selection(&mut self, sel: Selection) -> bool {
        match self.done.last_mut() {
            Some(top @ HistoryEvent::Selection(_)) => {
                *top = HistoryEvent::Selection(sel);
                true
            }
            _ => false,
        }
    }

    /// Selection on top of the source stack (restored after the last change of an undo).
    pub(crate) fn source_top_selection(&self, dir: HistoryDirection) -> Option<Selection> {
        match self.source(dir).last() {
            Some(HistoryEvent::Selection(sel)) => Some(sel.clone()),
            _ => None,
        }
    }

    /// Shift stored positions after a change made in a linked document that does not share
    /// this history.
    ///
    /// Events overlapping the change can no longer be applied; they are dropped together with
    /// everything older.
    pub fn rebase(&mut self, change: &Change) {
        let from = change.from.line;
        let to = change.to.line;
        let diff = change.text.len() as isize - (to - from) as isize - 1;
        rebase_events(&mut self.done, from, to, diff);
        rebase_events(&mut self.undone, from, to, diff);
    }

    fn source(&self, dir: HistoryDirection) -> &Vec<HistoryEvent> {
        match dir {
            HistoryDirection::Undo => &self.done,
            HistoryDirection::Redo => &self.undone,
        }
    }

    fn source_mut(&mut self, dir: HistoryDirection) -> &mut Vec<HistoryEvent> {
        match dir {
            HistoryDirection::Undo => &mut self.done,
            HistoryDirection::Redo => &mut self.undone,
        }
    }

    fn dest_mut(&mut self, dir: HistoryDirection) -> &mut Vec<HistoryEvent> {
        match dir {
            HistoryDirection::Undo => &mut self.undone,
            HistoryDirection::Redo => &mut self.done,
        }
    }

    fn within_delay(&self, then: Option<Instant>, now: Instant) -> bool {
        then.is_some_and(|t| now.saturating_duration_since(t) <= self.event_delay)
    }

    fn selection_can_merge(&self, origin: &str, sel: &Selection, now: Instant) -> bool {
        if origin.starts_with('*') {
            return true;
        }
        if !origin.starts_with('+') {
            return false;
        }
        match self.done.last() {
            Some(HistoryEvent::Selection(prev)) => {
                prev.ranges.len() == sel.ranges.len()
                    && prev.something_selected() == sel.something_selected()
                    && self.within_delay(self.last_sel_time, now)
            }
            _ => false,
        }
    }

    /// Make the top of `done` the change group to merge into, if there is one.
    fn last_change_event(&mut self, force: bool) -> bool {
        if force {
            clear_selection_events(&mut self.done);
            return matches!(self.done.last(), Some(HistoryEvent::Changes(_)));
        }
        let n = self.done.len();
        if n > 0 && !self.done[n - 1].is_selection() {
            return true;
        }
        if n > 1 && !self.done[n - 2].is_selection() {
            self.done.pop();
            return true;
        }
        false
    }

    fn evict(&mut self) {
        let mut groups = self.done.iter().filter(|e| !e.is_selection()).count();
        while groups > self.undo_depth {
            // Drop everything up to and including the oldest change group.
            let Some(index) = self.done.iter().position(|e| !e.is_selection()) else {
                break;
            };
            self.done.drain(..=index);
            groups -= 1;
            debug!(depth = self.undo_depth, "evicted oldest undo step");
        }
    }
}

fn push_selection(dest: &mut Vec<HistoryEvent>, sel: Selection) {
    if let Some(HistoryEvent::Selection(top)) = dest.last() {
        if *top == sel {
            return;
        }
    }
    dest.push(HistoryEvent::Selection(sel));
}

fn clear_selection_events(events: &mut Vec<HistoryEvent>) {
    while events.last().is_some_and(HistoryEvent::is_selection) {
        events.pop();
    }
}

fn shift_line(line: usize, diff: isize) -> usize {
    (line as isize + diff).max(0) as usize
}

fn rebase_pos(pos: &mut Pos, from: usize, to: usize, diff: isize) {
    if to < pos.line {
        pos.line = shift_line(pos.line, diff);
    } else if from < pos.line {
        pos.line = from;
        pos.ch = 0;
    }
}

fn rebase_events(events: &mut Vec<HistoryEvent>, from: usize, to: usize, diff: isize) {
    let mut i = 0;
    while i < events.len() {
        let ok = match &mut events[i] {
            HistoryEvent::Selection(sel) => {
                for range in &mut sel.ranges {
                    rebase_pos(&mut range.anchor, from, to, diff);
                    rebase_pos(&mut range.head, from, to, diff);
                }
                true
            }
            HistoryEvent::Changes(group) => {
                let mut ok = true;
                for cur in &mut group.changes {
                    if to < cur.from.line {
                        cur.from.line = shift_line(cur.from.line, diff);
                        cur.to.line = shift_line(cur.to.line, diff);
                    } else if from <= cur.to.line {
                        ok = false;
                        break;
                    }
                }
                ok
            }
        };
        if ok {
            i += 1;
        } else {
            events.drain(..=i);
            i = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn insert(line: usize, ch: usize, text: &str, origin: &str) -> Change {
        Change::new(Pos::new(line, ch), Pos::new(line, ch), text).with_origin(origin)
    }

    fn record(hist: &mut History, change: &Change, op: u64, now: Instant) {
        let entry = HistoryChange {
            from: change.from,
            to: change_end(change),
            text: vec![String::new()],
            spans: None,
        };
        let before = Selection::cursor(change.from);
        let after = Selection::cursor(change_end(change));
        hist.add_change(change, &before, after, op, now, || entry);
    }

    #[test]
    fn test_plus_origin_merges_within_window() {
        let mut hist = History::new(200, Duration::from_millis(1250));
        let t0 = Instant::now();
        record(&mut hist, &insert(0, 0, "a", "+input"), 1, t0);
        record(&mut hist, &insert(0, 1, "b", "+input"), 2, t0 + Duration::from_millis(100));
        record(&mut hist, &insert(0, 2, "c", "+input"), 3, t0 + Duration::from_millis(200));
        assert_eq!(hist.size(), HistorySize { undo: 1, redo: 0 });

        match &hist.done[1] {
            HistoryEvent::Changes(group) => {
                assert_eq!(group.changes.len(), 1);
                assert_eq!(group.changes[0].to, Pos::new(0, 3));
            }
            other => panic!("unexpected event {other:?}"),
        }

        // Past the window a new step starts.
        record(&mut hist, &insert(0, 3, "d", "+input"), 4, t0 + Duration::from_secs(5));
        assert_eq!(hist.size().undo, 2);
    }

    #[test]
    fn test_different_origins_do_not_merge() {
        let mut hist = History::new(200, Duration::from_millis(1250));
        let t0 = Instant::now();
        record(&mut hist, &insert(0, 0, "a", "+input"), 1, t0);
        record(&mut hist, &insert(0, 1, "b", "paste"), 2, t0);
        record(&mut hist, &insert(0, 2, "c", "paste"), 3, t0);
        assert_eq!(hist.size().undo, 3);
    }

    #[test]
    fn test_depth_cap_evicts_oldest() {
        let mut hist = History::new(3, Duration::from_millis(1250));
        let t0 = Instant::now();
        for i in 0..5 {
            record(&mut hist, &insert(i, 0, "x", "input"), i as u64, t0);
        }
        assert_eq!(hist.size().undo, 3);
        assert!(hist.done[0].is_selection());
    }

    #[test]
    fn test_rebase_shifts_and_drops() {
        let mut hist = History::new(200, Duration::from_millis(1250));
        let t0 = Instant::now();
        record(&mut hist, &insert(2, 0, "x", "input"), 1, t0);
        record(&mut hist, &insert(8, 0, "y", "input"), 2, t0);

        // Two lines inserted at line 0 shift both events.
        hist.rebase(&Change::new(Pos::new(0, 0), Pos::new(0, 0), "\n\n"));
        let lines: Vec<usize> = hist
            .done
            .iter()
            .filter_map(|e| match e {
                HistoryEvent::Changes(g) => Some(g.changes[0].from.line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![4, 10]);

        // An edit overlapping the newest event drops it and everything older.
        hist.rebase(&Change::new(Pos::new(10, 0), Pos::new(10, 1), ""));
        assert_eq!(hist.size().undo, 0);
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut hist = History::new(200, Duration::from_millis(1250));
        record(&mut hist, &insert(0, 0, "a", "input"), 1, Instant::now());
        let json = hist.snapshot().to_json().unwrap();
        let back = HistorySnapshot::from_json(&json).unwrap();
        assert_eq!(back, hist.snapshot());
        assert!(matches!(
            HistorySnapshot::from_json("{"),
            Err(DocError::Serialization(_))
        ));
    }
}
