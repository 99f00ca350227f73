//! Tokenizer-facing queries and the highlight worker entry point.

use super::{Document, SelectionOptions};
use crate::error::DocError;
use crate::highlight::{Frontiers, HighlightProgress, Highlighter, LineStyles, Token};
use crate::mode::{ModeHandle, ModeStateBox};
use crate::operation::DocEvent;
use crate::pos::{Pos, char_len};
use crate::selection_set::{Range, normalize_selection};
use crate::stream::count_column;
use std::time::Duration;
use tracing::debug;

/// Indentations above this are treated as a failed smart indent.
const MAX_SMART_INDENT: usize = 150;

/// How [`Document::indent_line`] computes the new indentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentHow {
    /// Ask the mode; falls back to [`IndentHow::Prev`] for modes without an indent hook.
    Smart,
    /// Copy the previous line's indentation.
    Prev,
    /// Add one indent unit.
    Add,
    /// Remove one indent unit.
    Subtract,
    /// Add (or remove) this many columns.
    By(isize),
}

impl Document {
    /// The tokenizer mode.
    pub fn mode(&self) -> &ModeHandle {
        &self.mode
    }

    /// Switch to another mode. All parse states and styles become stale.
    pub fn set_mode(&mut self, mode: ModeHandle) {
        self.mode = mode;
        self.mode_gen += 1;
        for id in self.tree.ids(0, self.tree.len()) {
            let line = self.tree.line_mut(id);
            line.state_after = None;
            line.styles = None;
        }
        self.frontiers = Frontiers::new(self.first);
        debug!(mode = self.mode.name(), "mode changed");
    }

    /// Current mode and highlight frontiers.
    pub fn frontiers(&self) -> Frontiers {
        self.frontiers
    }

    /// `true` while some lines still need styling.
    pub fn needs_highlight(&self) -> bool {
        self.frontiers.highlight < self.first + self.tree.len()
    }

    fn highlighter(&mut self) -> Highlighter<'_> {
        Highlighter {
            tree: &mut self.tree,
            first: self.first,
            mode: &self.mode,
            mode_gen: self.mode_gen,
            config: &self.config,
            frontiers: &mut self.frontiers,
            viewport: self.viewport,
        }
    }

    /// Run the highlight worker for at most `budget` (at least one line is always styled).
    ///
    /// Lines whose styles changed are reported in a [`DocEvent::LinesRestyled`] event. Call it
    /// again after [`work_delay`](crate::DocConfig::work_delay) while it returns
    /// [`HighlightProgress::Yielded`].
    pub fn highlight_step(&mut self, budget: Duration) -> HighlightProgress {
        self.operation(|doc| {
            let (progress, changed) = doc.highlighter().step(budget);
            if !changed.is_empty() {
                doc.op.push(DocEvent::LinesRestyled(changed));
            }
            progress
        })
    }

    /// Styles of line `n`, computed on demand.
    pub fn line_styles(&mut self, n: usize) -> Result<LineStyles, DocError> {
        self.check_line(n)?;
        let styles = self.highlighter().line_styles(n, true);
        styles.ok_or(DocError::LineOutOfRange {
            line: n,
            first: self.first,
            end: self.first + self.tree.len(),
        })
    }

    /// The token at `pos`.
    ///
    /// With `precise` the parse state is replayed from a state known to be valid instead of a
    /// nearby saved one.
    pub fn token_at(&mut self, pos: Pos, precise: bool) -> Token {
        let pos = self.clip_pos(pos);
        self.highlighter().token_at(pos, precise)
    }

    /// All tokens of line `n`.
    pub fn line_tokens(&mut self, n: usize, precise: bool) -> Result<Vec<Token>, DocError> {
        self.check_line(n)?;
        Ok(self.highlighter().tokens(n, None, precise))
    }

    /// Mode state after line `n`.
    pub fn state_after(&mut self, n: usize, precise: bool) -> Result<ModeStateBox, DocError> {
        self.check_line(n)?;
        Ok(self.highlighter().context_before(n + 1, precise).state)
    }

    /// Indentation the mode suggests for line `n`, or `None` if the mode has no opinion.
    pub fn smart_indent(&mut self, n: usize) -> Result<Option<usize>, DocError> {
        let id = self.check_line(n)?;
        if !self.mode.has_indent() {
            return Ok(None);
        }
        let state = self.highlighter().context_before(n, false).state;
        let text = self.tree.line(id).text();
        Ok(self
            .mode
            .indent(&state, text.trim_start(), self.config.indent_unit))
    }

    /// Re-indent line `n`. Returns `true` if the line changed.
    ///
    /// A line holding only whitespace is emptied. When the mode cannot decide a smart
    /// indentation the line is left alone.
    ///
    /// ```rust
    /// use codeview_core::{Document, IndentHow};
    ///
    /// let mut doc = Document::new("a\nb");
    /// assert!(doc.indent_line(1, IndentHow::Add).unwrap());
    /// assert_eq!(doc.get_value(None), "a\n  b");
    /// assert!(!doc.indent_line(1, IndentHow::By(0)).unwrap());
    /// ```
    pub fn indent_line(&mut self, n: usize, how: IndentHow) -> Result<bool, DocError> {
        let id = self.check_line(n)?;
        self.operation(|doc| {
            let tab_size = doc.config.tab_size;
            let (cur_space, space_chars, blank) = {
                let text = doc.tree.line(id).text();
                let trimmed = text.trim_start();
                (
                    count_column(text, None, tab_size),
                    char_len(&text[..text.len() - trimmed.len()]),
                    trimmed.is_empty(),
                )
            };
            let how = match how {
                IndentHow::Smart if !doc.mode.has_indent() => IndentHow::Prev,
                other => other,
            };

            let indentation = if blank {
                0
            } else {
                match how {
                    IndentHow::Smart => match doc.smart_indent(n)? {
                        Some(indent) if indent <= MAX_SMART_INDENT => indent,
                        _ => return Ok(false),
                    },
                    IndentHow::Prev if n > doc.first => count_column(doc.text_at(n - 1), None, tab_size),
                    IndentHow::Prev => 0,
                    IndentHow::Add => cur_space + doc.config.indent_unit,
                    IndentHow::Subtract => cur_space.saturating_sub(doc.config.indent_unit),
                    IndentHow::By(delta) => cur_space.saturating_add_signed(delta),
                }
            };

            let indent_string = " ".repeat(indentation);
            let current: String = doc.text_at(n).chars().take(space_chars).collect();
            if indent_string != current {
                doc.replace_range(&indent_string, Pos::new(n, 0), Pos::new(n, space_chars), Some("+input"))?;
                if let Some(id) = doc.id_at(n) {
                    doc.tree.line_mut(id).state_after = None;
                }
                return Ok(true);
            }

            // Move a cursor sitting inside the leading whitespace to its end.
            let stuck = doc
                .sel
                .ranges
                .iter()
                .position(|r| r.head.line == n && r.head.ch < space_chars);
            if let Some(i) = stuck {
                let mut ranges = doc.sel.ranges.clone();
                ranges[i] = Range::cursor(Pos::new(n, space_chars));
                let sel = normalize_selection(ranges, doc.sel.prim_index, doc.config.selections_may_touch);
                doc.set_selection(sel, SelectionOptions::default());
            }
            Ok(false)
        })
    }
}
