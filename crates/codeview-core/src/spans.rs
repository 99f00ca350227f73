//! Per-line marker spans and how they follow edits.
//!
//! A marker is stored as one [`MarkedSpan`] on every line it touches. `from`/`to` are char
//! offsets within that line; `None` means the range continues past the start/end of the line.

use crate::change::Change;
use crate::markers::{MarkerId, MarkerKind, MarkerStore};
use crate::pos::char_len;
use serde::{Deserialize, Serialize};

/// The part of a marker that lies on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkedSpan {
    /// Owning marker.
    pub marker: MarkerId,
    /// Start offset, or `None` if the marker starts on an earlier line.
    pub from: Option<usize>,
    /// End offset, or `None` if the marker ends on a later line.
    pub to: Option<usize>,
}

impl MarkedSpan {
    /// Create a span.
    pub fn new(marker: MarkerId, from: Option<usize>, to: Option<usize>) -> Self {
        Self { marker, from, to }
    }
}

/// Spans for a run of consecutive lines; an empty vector means "no spans on that line".
pub type SpanSnapshot = Vec<Vec<MarkedSpan>>;

#[derive(Debug, Clone, Copy)]
struct SpanFlags {
    inclusive_left: bool,
    inclusive_right: bool,
    bookmark: bool,
    insert_left: bool,
    clear_when_empty: bool,
}

fn flags(store: &MarkerStore, id: MarkerId) -> SpanFlags {
    match store.get(id) {
        Some(marker) => SpanFlags {
            inclusive_left: marker.options.inclusive_left,
            inclusive_right: marker.options.inclusive_right,
            bookmark: marker.kind == MarkerKind::Bookmark,
            insert_left: marker.options.insert_left,
            clear_when_empty: marker.options.clear_when_empty,
        },
        None => SpanFlags {
            inclusive_left: false,
            inclusive_right: false,
            bookmark: false,
            insert_left: false,
            clear_when_empty: true,
        },
    }
}

/// The span of `marker` in `spans`, if any.
pub fn span_for(spans: &[MarkedSpan], marker: MarkerId) -> Option<&MarkedSpan> {
    spans.iter().find(|s| s.marker == marker)
}

fn span_for_mut(spans: &mut [MarkedSpan], marker: MarkerId) -> Option<&mut MarkedSpan> {
    spans.iter_mut().find(|s| s.marker == marker)
}

/// Spans of `old` that stick out to the left of an edit starting at `start_ch`.
fn spans_before(
    old: &[MarkedSpan],
    start_ch: usize,
    is_insert: bool,
    store: &MarkerStore,
) -> Vec<MarkedSpan> {
    let mut out = Vec::new();
    for span in old {
        let f = flags(store, span.marker);
        let starts_before = match span.from {
            None => true,
            Some(from) if f.inclusive_left => from <= start_ch,
            Some(from) => from < start_ch,
        };
        let bookmark_here =
            span.from == Some(start_ch) && f.bookmark && (!is_insert || !f.insert_left);
        if starts_before || bookmark_here {
            let ends_after = match span.to {
                None => true,
                Some(to) if f.inclusive_right => to >= start_ch,
                Some(to) => to > start_ch,
            };
            out.push(MarkedSpan::new(
                span.marker,
                span.from,
                if ends_after { None } else { span.to },
            ));
        }
    }
    out
}

/// Spans of `old` that stick out to the right of an edit ending at `end_ch`, re-based so that
/// offsets are relative to `end_ch`.
fn spans_after(
    old: &[MarkedSpan],
    end_ch: usize,
    is_insert: bool,
    store: &MarkerStore,
) -> Vec<MarkedSpan> {
    let mut out = Vec::new();
    for span in old {
        let f = flags(store, span.marker);
        let ends_after = match span.to {
            None => true,
            Some(to) if f.inclusive_right => to >= end_ch,
            Some(to) => to > end_ch,
        };
        let bookmark_here =
            span.from == Some(end_ch) && f.bookmark && (!is_insert || f.insert_left);
        if ends_after || bookmark_here {
            let starts_before = match span.from {
                None => true,
                Some(from) if f.inclusive_left => from <= end_ch,
                Some(from) => from < end_ch,
            };
            out.push(MarkedSpan::new(
                span.marker,
                if starts_before {
                    None
                } else {
                    span.from.map(|from| from - end_ch)
                },
                span.to.map(|to| to.saturating_sub(end_ch)),
            ));
        }
    }
    out
}

/// Drop zero-length spans unless their marker survives becoming empty.
pub fn clear_empty_spans(spans: &mut Vec<MarkedSpan>, store: &MarkerStore) {
    spans.retain(|span| {
        !(span.from.is_some()
            && span.from == span.to
            && flags(store, span.marker).clear_when_empty)
    });
}

/// Compute the spans of the lines that replace the edited range.
///
/// `first` holds the spans of the line at `change.from.line`, `last` those of the line at
/// `change.to.line`. The result has one entry per line of `change.text`, or is `None` if no
/// span survives.
pub fn stretch_spans_over_change(
    first: &[MarkedSpan],
    last: &[MarkedSpan],
    change: &Change,
    store: &MarkerStore,
) -> Option<SpanSnapshot> {
    if first.is_empty() && last.is_empty() {
        return None;
    }
    let start_ch = change.from.ch;
    let end_ch = change.to.ch;
    let is_insert = change.from == change.to;

    let mut first = spans_before(first, start_ch, is_insert, store);
    let mut last = spans_after(last, end_ch, is_insert, store);

    let same_line = change.text.len() == 1;
    let offset = change.text.last().map(|t| char_len(t)).unwrap_or(0)
        + if same_line { start_ch } else { 0 };

    for span in first.iter_mut() {
        if span.to.is_none() {
            match span_for(&last, span.marker) {
                None => span.to = Some(start_ch),
                Some(found) if same_line => span.to = found.to.map(|to| to + offset),
                Some(_) => {}
            }
        }
    }

    let mut moved_to_first = Vec::new();
    for span in last.iter_mut() {
        if let Some(to) = span.to.as_mut() {
            *to += offset;
        }
        match span.from {
            None => {
                if span_for(&first, span.marker).is_none() {
                    span.from = Some(offset);
                    if same_line {
                        moved_to_first.push(*span);
                    }
                }
            }
            Some(from) => {
                span.from = Some(from + offset);
                if same_line {
                    moved_to_first.push(*span);
                }
            }
        }
    }
    first.extend(moved_to_first);

    clear_empty_spans(&mut first, store);

    let mut result = vec![first];
    if !same_line {
        clear_empty_spans(&mut last, store);
        let gap = change.text.len() - 2;
        let gap_spans: Vec<MarkedSpan> = if gap > 0 {
            result[0]
                .iter()
                .filter(|s| s.to.is_none())
                .map(|s| MarkedSpan::new(s.marker, None, None))
                .collect()
        } else {
            Vec::new()
        };
        for _ in 0..gap {
            result.push(gap_spans.clone());
        }
        result.push(last);
    }
    if result.iter().all(Vec::is_empty) {
        return None;
    }
    Some(result)
}

/// Remove spans whose marker has been cleared since the snapshot was taken.
pub fn remove_cleared_spans(snapshot: &SpanSnapshot, store: &MarkerStore) -> SpanSnapshot {
    snapshot
        .iter()
        .map(|spans| {
            spans
                .iter()
                .filter(|s| store.get(s.marker).is_some())
                .copied()
                .collect()
        })
        .collect()
}

/// Combine spans restored from history with the spans stretched over the change.
///
/// Restored spans win; stretched spans of other markers are added.
pub fn merge_old_spans(
    old: Option<SpanSnapshot>,
    stretched: Option<SpanSnapshot>,
) -> Option<SpanSnapshot> {
    let Some(mut old) = old else {
        return stretched;
    };
    let Some(stretched) = stretched else {
        return Some(old);
    };
    for (i, stretch_cur) in stretched.into_iter().enumerate() {
        if i >= old.len() {
            break;
        }
        let old_cur = &mut old[i];
        if old_cur.is_empty() {
            *old_cur = stretch_cur;
            continue;
        }
        for span in stretch_cur {
            if span_for_mut(old_cur, span.marker).is_none() {
                old_cur.push(span);
            }
        }
    }
    Some(old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{MarkerOptions, TextMarker};
    use crate::pos::Pos;

    fn store_with(options: MarkerOptions, kind: MarkerKind) -> (MarkerStore, MarkerId) {
        let mut store = MarkerStore::default();
        let id = store.insert(TextMarker::new(kind, options));
        (store, id)
    }

    #[test]
    fn test_insert_inside_span_stretches_it() {
        let (store, id) = store_with(MarkerOptions::default(), MarkerKind::Range);
        let spans = vec![MarkedSpan::new(id, Some(2), Some(6))];
        let change = Change::new(Pos::new(0, 4), Pos::new(0, 4), "xyz");
        let out = stretch_spans_over_change(&spans, &spans, &change, &store).unwrap();
        assert_eq!(out, vec![vec![MarkedSpan::new(id, Some(2), Some(9))]]);
    }

    #[test]
    fn test_insert_at_exclusive_edges_does_not_grow() {
        let (store, id) = store_with(MarkerOptions::default(), MarkerKind::Range);
        let spans = vec![MarkedSpan::new(id, Some(2), Some(6))];
        let at_start = Change::new(Pos::new(0, 2), Pos::new(0, 2), "ab");
        let out = stretch_spans_over_change(&spans, &spans, &at_start, &store).unwrap();
        assert_eq!(out[0], vec![MarkedSpan::new(id, Some(4), Some(8))]);

        let at_end = Change::new(Pos::new(0, 6), Pos::new(0, 6), "ab");
        let out = stretch_spans_over_change(&spans, &spans, &at_end, &store).unwrap();
        assert_eq!(out[0], vec![MarkedSpan::new(id, Some(2), Some(6))]);
    }

    #[test]
    fn test_deleting_whole_span_drops_it() {
        let (store, id) = store_with(MarkerOptions::default(), MarkerKind::Range);
        let spans = vec![MarkedSpan::new(id, Some(2), Some(6))];
        let change = Change::new(Pos::new(0, 1), Pos::new(0, 7), "");
        assert_eq!(stretch_spans_over_change(&spans, &spans, &change, &store), None);
    }

    #[test]
    fn test_multi_line_insert_fills_gap_lines() {
        let (store, id) = store_with(MarkerOptions::default(), MarkerKind::Range);
        let spans = vec![MarkedSpan::new(id, Some(1), Some(5))];
        let change = Change::new(Pos::new(0, 3), Pos::new(0, 3), "a\nb\nc");
        let out = stretch_spans_over_change(&spans, &spans, &change, &store).unwrap();
        assert_eq!(
            out,
            vec![
                vec![MarkedSpan::new(id, Some(1), None)],
                vec![MarkedSpan::new(id, None, None)],
                vec![MarkedSpan::new(id, None, Some(3))],
            ]
        );
    }

    #[test]
    fn test_bookmark_insert_left() {
        let options = MarkerOptions {
            insert_left: true,
            clear_when_empty: false,
            ..MarkerOptions::default()
        };
        let (store, id) = store_with(options, MarkerKind::Bookmark);
        let spans = vec![MarkedSpan::new(id, Some(3), Some(3))];
        let change = Change::new(Pos::new(0, 3), Pos::new(0, 3), "zz");
        let out = stretch_spans_over_change(&spans, &spans, &change, &store).unwrap();
        // The bookmark stays right of the inserted text.
        assert_eq!(out[0], vec![MarkedSpan::new(id, Some(5), Some(5))]);
    }

    #[test]
    fn test_merge_old_spans_prefers_restored() {
        let a = MarkerId::next();
        let b = MarkerId::next();
        let old = vec![vec![MarkedSpan::new(a, Some(0), Some(1))], vec![]];
        let stretched = vec![
            vec![
                MarkedSpan::new(a, Some(0), Some(4)),
                MarkedSpan::new(b, Some(2), Some(3)),
            ],
            vec![MarkedSpan::new(b, None, Some(1))],
        ];
        let merged = merge_old_spans(Some(old), Some(stretched)).unwrap();
        assert_eq!(
            merged[0],
            vec![
                MarkedSpan::new(a, Some(0), Some(1)),
                MarkedSpan::new(b, Some(2), Some(3)),
            ]
        );
        assert_eq!(merged[1], vec![MarkedSpan::new(b, None, Some(1))]);
    }
}
