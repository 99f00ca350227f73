//! Incremental tokenization.
//!
//! Two frontiers track how far derived data is valid: the mode frontier (lines before it have a
//! trustworthy parse state) and the highlight frontier (lines before it have up-to-date styles).
//! Edits retreat both with [`retreat_frontier`]; [`Highlighter::step`] moves the highlight
//! frontier forward again within a wall-clock budget.
//!
//! Parse states are saved on every fifth line and on lines inside the host viewport, so that
//! re-tokenizing a line only has to replay a few lines before it.

use crate::config::DocConfig;
use crate::line::LineId;
use crate::line_tree::LineTree;
use crate::mode::{ModeHandle, ModeStateBox, StyleId};
use crate::pos::{Pos, char_len};
use crate::stream::{StringStream, count_column};
use std::time::{Duration, Instant};
use tracing::debug;

/// How many non-advancing `token` calls are tolerated before giving up on a mode.
const MAX_STALLED_TOKENS: usize = 10;
/// How far back [`Highlighter`] searches for a saved state.
const START_SEARCH_WINDOW: usize = 100;
/// Parse states are kept on every line whose number is a multiple of this.
const SAVE_STATE_EVERY: usize = 5;

/// One styled run of a line: chars up to `end` (exclusive) carry `style`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSpan {
    /// End offset in chars.
    pub end: usize,
    /// Style of the run.
    pub style: Option<StyleId>,
}

/// Cached styles of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineStyles {
    /// Mode generation the styles were computed with.
    pub mode_gen: u64,
    /// Runs in order; the last one ends at the line length.
    pub spans: Vec<StyleSpan>,
}

/// Parse state stored after a line.
#[derive(Debug, Clone)]
pub struct SavedContext {
    pub(crate) state: ModeStateBox,
    /// How many lines past this one the mode peeked at while producing the state.
    pub(crate) look_ahead: usize,
}

/// Line numbers up to which parse states and styles are valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontiers {
    /// Parse states are valid for lines before this one.
    pub mode: usize,
    /// Styles are valid for lines before this one.
    pub highlight: usize,
}

impl Frontiers {
    /// Both frontiers at `first`.
    pub fn new(first: usize) -> Self {
        Self {
            mode: first,
            highlight: first,
        }
    }

    pub(crate) fn clamp(&mut self, end: usize) {
        self.mode = self.mode.min(end);
        self.highlight = self.highlight.min(self.mode);
    }
}

/// Result of a highlight worker step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightProgress {
    /// The budget ran out; call again to continue at `next_line`.
    Yielded {
        /// First line that still needs styling.
        next_line: usize,
    },
    /// Every line is styled.
    Done,
}

/// A token read by the mode, as returned by token queries.
#[derive(Debug, Clone)]
pub struct Token {
    /// Start offset (chars).
    pub start: usize,
    /// End offset (chars).
    pub end: usize,
    /// Token text.
    pub string: String,
    /// Style assigned by the mode.
    pub style: Option<StyleId>,
    /// Mode state after the token.
    pub state: ModeStateBox,
}

/// Tokenization cursor: the state plus the line it applies to.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) state: ModeStateBox,
    pub(crate) line: usize,
    max_look_ahead: usize,
}

impl Context {
    fn new(state: ModeStateBox, line: usize) -> Self {
        Self {
            state,
            line,
            max_look_ahead: 0,
        }
    }

    fn from_saved(saved: SavedContext, line: usize) -> Self {
        Self {
            state: saved.state,
            line,
            max_look_ahead: saved.look_ahead,
        }
    }

    fn save(&self) -> SavedContext {
        SavedContext {
            state: self.state.clone(),
            look_ahead: self.max_look_ahead,
        }
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.max_look_ahead = self.max_look_ahead.saturating_sub(1);
    }

    fn record_look_ahead(&mut self, n: usize) {
        self.max_look_ahead = self.max_look_ahead.max(n);
    }
}

/// Read one token, retrying while the mode only changes state.
///
/// # Panics
///
/// Panics if the mode fails to advance the stream [`MAX_STALLED_TOKENS`] times in a row.
pub(crate) fn read_token(
    mode: &ModeHandle,
    stream: &mut StringStream<'_>,
    state: &mut ModeStateBox,
) -> Option<StyleId> {
    for _ in 0..MAX_STALLED_TOKENS {
        let style = mode.token(stream, state);
        if stream.pos > stream.start {
            return style;
        }
    }
    panic!("mode {} failed to advance stream", mode.name());
}

/// Tokenizer settings taken from the document configuration and the mode.
#[derive(Debug, Clone, Copy)]
struct RunSettings {
    tab_size: usize,
    max_length: usize,
    flatten: bool,
}

/// Advance `ctx` over `text` without collecting styles.
fn process_line(
    mode: &ModeHandle,
    text: &str,
    tab_size: usize,
    ctx: &mut Context,
    look_ahead: &dyn Fn(usize) -> Option<String>,
) {
    let mut stream = StringStream::new(text, tab_size).with_look_ahead(look_ahead);
    if text.is_empty() {
        mode.blank_line(&mut ctx.state);
    }
    while !stream.eol() {
        read_token(mode, &mut stream, &mut ctx.state);
        stream.start = stream.pos;
    }
    ctx.record_look_ahead(stream.looked_ahead);
}

/// Tokenize `text` into style runs, advancing `ctx`.
fn run_mode(
    mode: &ModeHandle,
    text: &str,
    settings: RunSettings,
    ctx: &mut Context,
    look_ahead: &dyn Fn(usize) -> Option<String>,
) -> Vec<StyleSpan> {
    let mut flatten = settings.flatten;
    let mut spans = Vec::new();
    let mut stream = StringStream::new(text, settings.tab_size).with_look_ahead(look_ahead);
    if text.is_empty() {
        mode.blank_line(&mut ctx.state);
    }
    // Byte and char offsets of the start of the pending run.
    let mut cur_start = 0;
    let mut cur_char = 0;
    let mut cur_style: Option<StyleId> = None;
    let mut push = |spans: &mut Vec<StyleSpan>, end: usize, style: Option<StyleId>| {
        if end > cur_start {
            cur_char += char_len(&text[cur_start..end]);
            cur_start = end;
            spans.push(StyleSpan {
                end: cur_char,
                style,
            });
        }
    };
    while !stream.eol() {
        let style = if stream.pos > settings.max_length {
            flatten = false;
            stream.pos = text.len();
            None
        } else {
            read_token(mode, &mut stream, &mut ctx.state)
        };
        if !flatten || cur_style != style {
            push(&mut spans, stream.start, cur_style);
            cur_style = style;
        }
        stream.start = stream.pos;
    }
    push(&mut spans, stream.pos, cur_style);
    ctx.record_look_ahead(stream.looked_ahead);
    spans
}

/// Move the frontiers back so that line `n` (and everything after it) gets re-tokenized.
pub(crate) fn retreat_frontier(tree: &LineTree, first: usize, frontiers: &mut Frontiers, n: usize) {
    frontiers.mode = frontiers.mode.min(n);
    if frontiers.highlight + 10 < n {
        return;
    }
    let mut start = first;
    let mut line = n.saturating_sub(1);
    while line > first {
        let saved = tree
            .line_at(line - first)
            .and_then(|id| tree.line(id).state_after.as_ref());
        if let Some(saved) = saved {
            if line + saved.look_ahead < n {
                start = line + 1;
                break;
            }
        }
        line -= 1;
    }
    frontiers.highlight = frontiers.highlight.min(start);
}

/// Tokenization entry points over one document's lines.
///
/// Line numbers are absolute (offset by `first`).
pub(crate) struct Highlighter<'a> {
    pub(crate) tree: &'a mut LineTree,
    pub(crate) first: usize,
    pub(crate) mode: &'a ModeHandle,
    pub(crate) mode_gen: u64,
    pub(crate) config: &'a DocConfig,
    pub(crate) frontiers: &'a mut Frontiers,
    pub(crate) viewport: Option<(usize, usize)>,
}

impl Highlighter<'_> {
    fn end(&self) -> usize {
        self.first + self.tree.len()
    }

    fn id(&self, n: usize) -> Option<LineId> {
        n.checked_sub(self.first).and_then(|i| self.tree.line_at(i))
    }

    fn in_viewport(&self, n: usize) -> bool {
        self.viewport.is_some_and(|(from, to)| n >= from && n < to)
    }

    fn settings(&self) -> RunSettings {
        RunSettings {
            tab_size: self.config.tab_size,
            max_length: self.config.max_highlight_length,
            flatten: self
                .mode
                .flatten_spans()
                .unwrap_or(self.config.flatten_spans),
        }
    }

    /// Line from which to start replaying to get the state before line `n`.
    fn find_start_line(&self, n: usize, precise: bool) -> usize {
        // `None` searches all the way back to the first line.
        let lim = if precise {
            None
        } else {
            n.checked_sub(START_SEARCH_WINDOW)
        };
        let mut best: Option<(usize, usize)> = None;
        let mut search = n;
        while lim.is_none_or(|lim| search > lim) {
            if search <= self.first {
                return self.first;
            }
            let Some(id) = self.id(search - 1) else {
                return self.first;
            };
            let line = self.tree.line(id);
            if let Some(after) = &line.state_after {
                if !precise || search + after.look_ahead <= self.frontiers.mode {
                    return search;
                }
            }
            let indented = count_column(line.text(), None, self.config.tab_size);
            if best.is_none_or(|(_, indent)| indent > indented) {
                best = Some((search - 1, indented));
            }
            search -= 1;
        }
        best.map(|(line, _)| line).unwrap_or(self.first)
    }

    /// Parse state at the start of line `n`.
    ///
    /// With `precise` the state is replayed from a state known to be valid, and the mode
    /// frontier moves up to `n`.
    pub(crate) fn context_before(&mut self, n: usize, precise: bool) -> Context {
        let n = n.clamp(self.first, self.end());
        let start = self.find_start_line(n, precise);
        let saved = if start > self.first {
            self.id(start - 1)
                .and_then(|id| self.tree.line(id).state_after.clone())
        } else {
            None
        };
        let mut ctx = match saved {
            Some(saved) => Context::from_saved(saved, start),
            None => Context::new(self.mode.start_state(), start),
        };
        for line in start..n {
            let Some(id) = self.id(line) else {
                break;
            };
            {
                let tree = &*self.tree;
                let index = line - self.first;
                let look = |k: usize| tree.line_at(index + k).map(|id| tree.line(id).text().to_string());
                process_line(self.mode, tree.line(id).text(), self.config.tab_size, &mut ctx, &look);
            }
            let keep = line + 1 == n || line % SAVE_STATE_EVERY == 0 || self.in_viewport(line);
            self.tree.line_mut(id).state_after = keep.then(|| ctx.save());
            ctx.next_line();
        }
        if precise {
            self.frontiers.mode = ctx.line;
        }
        ctx
    }

    fn highlight_line(&self, id: LineId, ctx: &mut Context) -> Vec<StyleSpan> {
        let tree = &*self.tree;
        let index = ctx.line - self.first;
        let look = |k: usize| tree.line_at(index + k).map(|id| tree.line(id).text().to_string());
        run_mode(self.mode, tree.line(id).text(), self.settings(), ctx, &look)
    }

    /// Compute the styles of a line, advancing `ctx` past it.
    fn restyle(&self, id: LineId, ctx: &mut Context) -> LineStyles {
        let overlong = self.tree.line(id).text().len() > self.config.max_highlight_length;
        let reset = overlong.then(|| ctx.state.clone());
        let spans = self.highlight_line(id, ctx);
        if let Some(reset) = reset {
            ctx.state = reset;
        }
        LineStyles {
            mode_gen: self.mode_gen,
            spans,
        }
    }

    /// Styles of line `n`, computing them if the cache is stale.
    ///
    /// With `update_frontier`, styling the line right at the highlight frontier advances it.
    pub(crate) fn line_styles(&mut self, n: usize, update_frontier: bool) -> Option<LineStyles> {
        let id = self.id(n)?;
        if let Some(styles) = &self.tree.line(id).styles {
            if styles.mode_gen == self.mode_gen {
                return Some(styles.clone());
            }
        }
        let mut ctx = self.context_before(n, false);
        let styles = self.restyle(id, &mut ctx);
        let line = self.tree.line_mut(id);
        line.state_after = Some(ctx.save());
        line.styles = Some(styles.clone());
        if update_frontier && n == self.frontiers.highlight {
            self.frontiers.highlight += 1;
            self.frontiers.mode = self.frontiers.mode.max(self.frontiers.highlight);
        }
        Some(styles)
    }

    /// Re-tokenize from the highlight frontier until the document end or the budget runs out.
    ///
    /// Always styles at least one line. Returns the progress and the lines whose styles
    /// changed.
    pub(crate) fn step(&mut self, budget: Duration) -> (HighlightProgress, Vec<usize>) {
        let end = self.end();
        if self.frontiers.highlight >= end {
            return (HighlightProgress::Done, Vec::new());
        }
        let deadline = Instant::now() + budget;
        let mut ctx = self.context_before(self.frontiers.highlight, false);
        let mut changed = Vec::new();
        while ctx.line < end {
            let n = ctx.line;
            let Some(id) = self.id(n) else {
                break;
            };
            let styles = self.restyle(id, &mut ctx);
            let keep = n % SAVE_STATE_EVERY == 0 || self.in_viewport(n);
            let line = self.tree.line_mut(id);
            if line.styles.as_ref() != Some(&styles) {
                changed.push(n);
            }
            line.styles = Some(styles);
            line.state_after = keep.then(|| ctx.save());
            ctx.next_line();
            if Instant::now() >= deadline {
                break;
            }
        }
        self.frontiers.highlight = ctx.line;
        self.frontiers.mode = self.frontiers.mode.max(ctx.line);
        if ctx.line < end {
            debug!(next_line = ctx.line, restyled = changed.len(), "highlight worker yielded");
            (
                HighlightProgress::Yielded {
                    next_line: ctx.line,
                },
                changed,
            )
        } else {
            (HighlightProgress::Done, changed)
        }
    }

    /// Tokens of line `n`. With `until`, stops once the token covering that char offset was
    /// read.
    pub(crate) fn tokens(&mut self, n: usize, until: Option<usize>, precise: bool) -> Vec<Token> {
        let Some(id) = self.id(n) else {
            return Vec::new();
        };
        let mut ctx = self.context_before(n, precise);
        let tree = &*self.tree;
        let text = tree.line(id).text();
        let index = n - self.first;
        let look = |k: usize| tree.line_at(index + k).map(|id| tree.line(id).text().to_string());
        let mut stream = StringStream::new(text, self.config.tab_size).with_look_ahead(&look);
        let mut tokens = Vec::new();
        let mut char_pos = 0;
        while until.is_none_or(|ch| char_pos < ch) && !stream.eol() {
            stream.start = stream.pos;
            let style = read_token(self.mode, &mut stream, &mut ctx.state);
            let string = stream.current().to_string();
            let start = char_pos;
            char_pos += char_len(&string);
            tokens.push(Token {
                start,
                end: char_pos,
                string,
                style,
                state: ctx.state.clone(),
            });
        }
        tokens
    }

    /// The token at `pos`: the last one read while scanning up to `pos.ch`.
    pub(crate) fn token_at(&mut self, pos: Pos, precise: bool) -> Token {
        let mut tokens = self.tokens(pos.line, Some(pos.ch), precise);
        match tokens.pop() {
            Some(token) => token,
            None => Token {
                start: 0,
                end: 0,
                string: String::new(),
                style: None,
                state: self.context_before(pos.line, precise).state,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::Line;
    use crate::mode::{Mode, ModeHooks};
    use pretty_assertions::assert_eq;

    /// Styles every char with the nesting depth of parentheses, carried across lines.
    struct DepthMode;

    impl Mode for DepthMode {
        type State = u32;

        fn name(&self) -> &str {
            "depth"
        }

        fn start_state(&self) -> u32 {
            0
        }

        fn token(&self, stream: &mut StringStream<'_>, depth: &mut u32) -> Option<StyleId> {
            match stream.next() {
                Some('(') => *depth += 1,
                Some(')') => *depth = depth.saturating_sub(1),
                _ => {}
            }
            Some(*depth)
        }
    }

    struct StuckMode;

    impl Mode for StuckMode {
        type State = ();

        fn name(&self) -> &str {
            "stuck"
        }

        fn start_state(&self) {}

        fn token(&self, _stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleId> {
            None
        }
    }

    struct Unflattened;

    impl Mode for Unflattened {
        type State = ();

        fn name(&self) -> &str {
            "chars"
        }

        fn start_state(&self) {}

        fn token(&self, stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleId> {
            stream.next();
            Some(7)
        }

        fn hooks(&self) -> ModeHooks<()> {
            ModeHooks {
                flatten_spans: Some(false),
                ..ModeHooks::default()
            }
        }
    }

    fn tree_of(texts: &[&str]) -> LineTree {
        LineTree::from_lines(
            texts
                .iter()
                .map(|t| Line::new(t.to_string(), Vec::new(), 1.0))
                .collect(),
        )
    }

    fn spans(pairs: &[(usize, Option<StyleId>)]) -> Vec<StyleSpan> {
        pairs
            .iter()
            .map(|&(end, style)| StyleSpan { end, style })
            .collect()
    }

    #[test]
    fn test_styles_follow_state_across_lines() {
        let mut tree = tree_of(&["a(b", "c)d"]);
        let mode = ModeHandle::new(DepthMode);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        let second = hl.line_styles(1, false).unwrap();
        assert_eq!(second.spans, spans(&[(1, Some(1)), (3, Some(0))]));
        let first = hl.line_styles(0, true).unwrap();
        assert_eq!(first.spans, spans(&[(1, Some(0)), (3, Some(1))]));
        assert_eq!(frontiers.highlight, 1);
    }

    #[test]
    fn test_overlong_line_is_cut_and_state_restored() {
        let mut tree = tree_of(&["((((((((", "x"]);
        let mode = ModeHandle::new(DepthMode);
        let config = DocConfig {
            max_highlight_length: 4,
            ..DocConfig::default()
        };
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        let (progress, changed) = hl.step(Duration::from_secs(10));
        assert_eq!(progress, HighlightProgress::Done);
        assert_eq!(changed, vec![0, 1]);
        let long = hl.line_styles(0, false).unwrap();
        assert_eq!(long.spans.last().map(|s| (s.end, s.style)), Some((8, None)));
        // The state after the cut line is the state before it.
        assert_eq!(hl.line_styles(1, false).unwrap().spans, spans(&[(1, Some(0))]));
    }

    #[test]
    fn test_flatten_override() {
        let mut tree = tree_of(&["abc"]);
        let mode = ModeHandle::new(Unflattened);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        let styles = hl.line_styles(0, false).unwrap();
        assert_eq!(
            styles.spans,
            spans(&[(1, Some(7)), (2, Some(7)), (3, Some(7))])
        );
    }

    #[test]
    fn test_step_with_zero_budget_makes_progress() {
        let texts: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut tree = tree_of(&refs);
        let mode = ModeHandle::new(DepthMode);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        let mut steps = 0;
        while let (HighlightProgress::Yielded { next_line }, _) = hl.step(Duration::ZERO) {
            steps += 1;
            assert_eq!(next_line, steps);
        }
        assert_eq!(steps, 19);
        assert_eq!(frontiers.highlight, 20);
        assert!(frontiers.mode >= frontiers.highlight);
    }

    #[test]
    fn test_retreat_frontier_stops_after_saved_state() {
        let texts: Vec<String> = (0..30).map(|i| format!("{i}")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut tree = tree_of(&refs);
        let mode = ModeHandle::new(DepthMode);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        {
            let mut hl = Highlighter {
                tree: &mut tree,
                first: 0,
                mode: &mode,
                mode_gen: 1,
                config: &config,
                frontiers: &mut frontiers,
                viewport: None,
            };
            hl.step(Duration::from_secs(10));
        }
        assert_eq!(frontiers.highlight, 30);
        retreat_frontier(&tree, 0, &mut frontiers, 12);
        assert_eq!(frontiers.mode, 12);
        // Line 10 holds a saved state, so styling resumes right after it.
        assert_eq!(frontiers.highlight, 11);
    }

    #[test]
    fn test_tokens_and_token_at() {
        let mut tree = tree_of(&["(x)"]);
        let mode = ModeHandle::new(DepthMode);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        let tokens = hl.tokens(0, None, true);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].string, "x");
        assert_eq!(tokens[1].state.downcast_ref::<u32>(), Some(&1));
        let at = hl.token_at(Pos::new(0, 2), true);
        assert_eq!((at.start, at.end, at.style), (1, 2, Some(1)));
        let none = hl.token_at(Pos::new(0, 0), true);
        assert_eq!((none.start, none.end), (0, 0));
    }

    #[test]
    #[should_panic(expected = "failed to advance stream")]
    fn test_stuck_mode_panics() {
        let mut tree = tree_of(&["abc"]);
        let mode = ModeHandle::new(StuckMode);
        let config = DocConfig::default();
        let mut frontiers = Frontiers::new(0);
        let mut hl = Highlighter {
            tree: &mut tree,
            first: 0,
            mode: &mode,
            mode_gen: 1,
            config: &config,
            frontiers: &mut frontiers,
            viewport: None,
        };
        hl.line_styles(0, false);
    }
}
