//! Text markers: annotated ranges and bookmarks.
//!
//! The marker itself only holds its options and the ids of the lines it currently touches; the
//! actual offsets live in the per-line [`crate::spans::MarkedSpan`]s.

use crate::line::LineId;
use crate::mode::StyleId;
use crate::pos::Pos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MARKER: AtomicU64 = AtomicU64::new(1);

/// Identifier of a marker.
///
/// Ids are allocated from a process-wide counter, so they are unique across documents and
/// increase with creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

impl MarkerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MARKER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a marker covers a range or sits at a single position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    /// A range between two positions.
    Range,
    /// A zero-width marker at one position.
    Bookmark,
}

/// Opaque id of a host widget that replaces a collapsed range.
pub type WidgetId = u64;

/// Options of a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerOptions {
    /// Style applied to the marked text.
    pub style: Option<StyleId>,
    /// Tooltip text.
    pub title: Option<String>,
    /// Text inserted at the start position goes inside the marker.
    pub inclusive_left: bool,
    /// Text inserted at the end position goes inside the marker.
    pub inclusive_right: bool,
    /// The cursor cannot be placed inside the range.
    pub atomic: bool,
    /// The range is hidden. Implies `atomic`.
    pub collapsed: bool,
    /// Edits touching the range are rejected.
    pub read_only: bool,
    /// Clear the marker when the cursor enters it.
    pub clear_on_enter: bool,
    /// Clear the marker once its range becomes empty.
    pub clear_when_empty: bool,
    /// Widget shown instead of the range. Implies `collapsed`.
    pub replaced_with: Option<WidgetId>,
    /// Override which side the cursor lands on when leaving leftwards.
    pub select_left: Option<bool>,
    /// Override which side the cursor lands on when leaving rightwards.
    pub select_right: Option<bool>,
    /// For bookmarks: text inserted at the bookmark goes to its left.
    pub insert_left: bool,
    /// Creating the marker is recorded as an undo step.
    pub add_to_history: bool,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            style: None,
            title: None,
            inclusive_left: false,
            inclusive_right: false,
            atomic: false,
            collapsed: false,
            read_only: false,
            clear_on_enter: false,
            clear_when_empty: true,
            replaced_with: None,
            select_left: None,
            select_right: None,
            insert_left: false,
            add_to_history: false,
        }
    }
}

impl MarkerOptions {
    /// Apply the implications between options.
    pub(crate) fn normalized(mut self) -> Self {
        if self.replaced_with.is_some() {
            self.collapsed = true;
        }
        if self.collapsed {
            self.atomic = true;
        }
        self
    }
}

/// A marker as stored by a document.
#[derive(Debug, Clone)]
pub struct TextMarker {
    /// Marker id.
    pub id: MarkerId,
    /// Range or bookmark.
    pub kind: MarkerKind,
    /// Effective options.
    pub options: MarkerOptions,
    pub(crate) lines: Vec<LineId>,
}

impl TextMarker {
    pub(crate) fn new(kind: MarkerKind, options: MarkerOptions) -> Self {
        Self {
            id: MarkerId::next(),
            kind,
            options: options.normalized(),
            lines: Vec::new(),
        }
    }

    /// Number of lines the marker touches.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn attach_line(&mut self, line: LineId) {
        self.lines.push(line);
    }

    pub(crate) fn detach_line(&mut self, line: LineId) {
        if let Some(i) = self.lines.iter().position(|&l| l == line) {
            self.lines.remove(i);
        }
    }
}

/// Current extent of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerRange {
    /// Start position.
    pub from: Pos,
    /// End position (equal to `from` for bookmarks).
    pub to: Pos,
}

/// The markers of one document, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    markers: BTreeMap<MarkerId, TextMarker>,
}

impl MarkerStore {
    /// Look up a marker.
    pub fn get(&self, id: MarkerId) -> Option<&TextMarker> {
        self.markers.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: MarkerId) -> Option<&mut TextMarker> {
        self.markers.get_mut(&id)
    }

    pub(crate) fn insert(&mut self, marker: TextMarker) -> MarkerId {
        let id = marker.id;
        self.markers.insert(id, marker);
        id
    }

    pub(crate) fn remove(&mut self, id: MarkerId) -> Option<TextMarker> {
        self.markers.remove(&id)
    }

    /// Iterate markers in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &TextMarker> {
        self.markers.values()
    }

    /// Number of live markers.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// `true` if there are no live markers.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// `true` if any live marker is collapsed.
    pub fn any_collapsed(&self) -> bool {
        self.markers.values().any(|m| m.options.collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_implications() {
        let options = MarkerOptions {
            replaced_with: Some(7),
            ..MarkerOptions::default()
        }
        .normalized();
        assert!(options.collapsed);
        assert!(options.atomic);
        assert!(options.clear_when_empty);
    }

    #[test]
    fn test_any_collapsed_tracks_live_markers() {
        let mut store = MarkerStore::default();
        store.insert(TextMarker::new(MarkerKind::Range, MarkerOptions::default()));
        assert!(!store.any_collapsed());
        let fold = store.insert(TextMarker::new(
            MarkerKind::Range,
            MarkerOptions {
                collapsed: true,
                ..MarkerOptions::default()
            },
        ));
        assert!(store.any_collapsed());
        store.remove(fold);
        assert!(!store.any_collapsed());
    }

    #[test]
    fn test_ids_increase() {
        let a = TextMarker::new(MarkerKind::Range, MarkerOptions::default());
        let b = TextMarker::new(MarkerKind::Bookmark, MarkerOptions::default());
        assert!(a.id < b.id);
    }
}
