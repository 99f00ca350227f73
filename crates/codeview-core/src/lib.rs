#![warn(missing_docs)]
//! Codeview Core - document and analysis layer of an embedded code-view editor
//!
//! # Overview
//!
//! `codeview-core` keeps the state behind a source view: the text as an indexed tree of lines,
//! annotation ranges (markers), undo history, incremental tokenization and bidirectional text
//! ordering. It does not render or measure anything; a host reads lines, styles and marker spans
//! and turns them into pixels.
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Workspace (linked documents)               │  ← Multiple views
//! ├─────────────────────────────────────────────┤
//! │  Document + operations + events             │  ← Public API
//! ├──────────────┬──────────────┬───────────────┤
//! │  Selection   │  History     │  Highlighter  │  ← Editing state
//! ├──────────────┴──────────────┴───────────────┤
//! │  Markers / marked spans                     │  ← Annotations
//! ├─────────────────────────────────────────────┤
//! │  Line tree (arena B-tree)                   │  ← Line storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use codeview_core::{Collapse, Document, MarkerOptions, Pos};
//!
//! let mut doc = Document::new("fn main() {\n    body();\n}");
//!
//! // Protect the signature
//! let sig = doc
//!     .mark_text(
//!         Pos::new(0, 0),
//!         Pos::new(0, 9),
//!         MarkerOptions { read_only: true, ..MarkerOptions::default() },
//!     )
//!     .unwrap();
//! assert!(doc.replace_range("x", Pos::new(0, 3), Pos::new(0, 4), None).is_err());
//!
//! // Edit elsewhere
//! doc.set_cursor(Pos::new(1, 4));
//! doc.replace_selection("new_", Collapse::End, None).unwrap();
//! assert_eq!(doc.get_line(1).unwrap().text, "    new_body();");
//!
//! // Undo it again
//! assert!(doc.undo());
//! assert_eq!(doc.get_line(1).unwrap().text, "    body();");
//! assert!(doc.find_marker(sig).is_some());
//! ```
//!
//! # Module Description
//!
//! - [`line_tree`] / [`line`] - line storage with cached counts and heights
//! - [`markers`] / [`spans`] - annotation ranges and their per-line spans
//! - [`history`] - undo/redo events, coalescing and rebasing
//! - [`mode`] / [`stream`] / [`highlight`] - tokenizer modes and incremental highlighting
//! - [`bidi`] / [`movement`] - bidi ordering and cursor motion
//! - [`selection_set`] - ranges, normalization and change mapping
//! - [`operation`] - batching and event delivery
//! - [`document`] - the document tying it all together
//! - [`workspace`] - linked documents

pub mod bidi;
pub mod change;
pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod history;
pub mod line;
pub mod line_tree;
pub mod markers;
pub mod mode;
pub mod movement;
pub mod operation;
pub mod pos;
pub mod selection_set;
pub mod spans;
pub mod stream;
pub mod workspace;

pub use bidi::{BidiSpan, Direction, PartAt, bidi_ordering, part_at};
pub use change::{Change, ChangeRecord, adjust_for_change, change_end};
pub use config::DocConfig;
pub use document::{ChangeOptions, Document, IndentHow, LineView, Motion, MoveUnit, SelectionOptions};
pub use error::DocError;
pub use highlight::{Frontiers, HighlightProgress, LineStyles, StyleSpan, Token};
pub use history::{HistoryDirection, HistorySize, HistorySnapshot};
pub use markers::{MarkerId, MarkerKind, MarkerOptions, MarkerRange, TextMarker};
pub use mode::{Mode, ModeHandle, ModeHooks, ModeRegistry, ModeStateBox, NullMode, StyleId};
pub use movement::MoveDir;
pub use operation::{DocEvent, SubscriptionId};
pub use pos::{Pos, Sticky};
pub use selection_set::{Collapse, Range, Selection};
pub use spans::MarkedSpan;
pub use stream::StringStream;
pub use workspace::{DocId, LinkOptions, Workspace};

pub use codeview_lang::{MimeTable, ModeSpec};
