//! Document configuration.
//!
//! [`DocConfig`] collects the tunables of the engine. It deserializes with serde (every field has
//! a default), so hosts can load it from JSON:
//!
//! ```rust
//! use codeview_core::DocConfig;
//!
//! let config = DocConfig::from_json(r#"{ "undo_depth": 50, "tab_size": 8 }"#).unwrap();
//! assert_eq!(config.undo_depth, 50);
//! assert_eq!(config.history_event_delay_ms, 1250);
//! ```

use crate::bidi::Direction;
use crate::error::DocError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration for a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocConfig {
    /// Maximum number of undo steps (change groups) kept.
    pub undo_depth: usize,
    /// Window in which `+`-prefixed origins coalesce into one undo step.
    pub history_event_delay_ms: u64,
    /// Wall-clock budget of one highlight worker step.
    pub work_time_ms: u64,
    /// Suggested delay before the host reschedules a yielded worker.
    pub work_delay_ms: u64,
    /// Lines longer than this (in bytes) are only tokenized up to this point.
    pub max_highlight_length: usize,
    /// Tab width used for column computations.
    pub tab_size: usize,
    /// Indentation unit used by smart indentation.
    pub indent_unit: usize,
    /// Height assigned to visible lines.
    pub line_height: f64,
    /// Base text direction.
    pub direction: Direction,
    /// Line separator for splitting and joining; `None` splits on any of `\r\n`, `\r`, `\n`
    /// and joins with `\n`.
    pub line_separator: Option<String>,
    /// Keep touching (but not overlapping) non-empty selection ranges apart.
    pub selections_may_touch: bool,
    /// Merge adjacent tokens with the same style into one style span.
    pub flatten_spans: bool,
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            undo_depth: 200,
            history_event_delay_ms: 1250,
            work_time_ms: 200,
            work_delay_ms: 100,
            max_highlight_length: 10_000,
            tab_size: 4,
            indent_unit: 2,
            line_height: 1.0,
            direction: Direction::Ltr,
            line_separator: None,
            selections_may_touch: false,
            flatten_spans: true,
        }
    }
}

impl DocConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, DocError> {
        serde_json::from_str(json).map_err(|err| DocError::Config(err.to_string()))
    }

    /// History coalescing window as a [`Duration`].
    pub fn history_event_delay(&self) -> Duration {
        Duration::from_millis(self.history_event_delay_ms)
    }

    /// Highlight worker budget as a [`Duration`].
    pub fn work_time(&self) -> Duration {
        Duration::from_millis(self.work_time_ms)
    }

    /// Worker reschedule delay as a [`Duration`].
    pub fn work_delay(&self) -> Duration {
        Duration::from_millis(self.work_delay_ms)
    }

    /// Split text into lines according to [`DocConfig::line_separator`].
    pub fn split_lines(&self, text: &str) -> Vec<String> {
        match self.line_separator.as_deref() {
            Some(sep) if !sep.is_empty() => text.split(sep).map(str::to_string).collect(),
            _ => split_lines_auto(text),
        }
    }

    /// The separator used when joining lines.
    pub fn join_separator(&self) -> &str {
        self.line_separator.as_deref().unwrap_or("\n")
    }
}

/// Split on `\r\n`, `\r` and `\n`. Always yields at least one (possibly empty) line.
pub fn split_lines_auto(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(text[start..i].to_string());
                i += 1;
                start = i;
            }
            b'\r' => {
                lines.push(text[start..i].to_string());
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(text[start..].to_string());
    lines
}
