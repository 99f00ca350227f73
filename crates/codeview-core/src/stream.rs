//! The character cursor handed to modes while tokenizing a line.

use regex::Regex;

/// Something that can match a single character: a `char` or a predicate.
pub trait CharMatcher {
    /// Returns `true` if `ch` matches.
    fn matches(&self, ch: char) -> bool;
}

impl CharMatcher for char {
    fn matches(&self, ch: char) -> bool {
        *self == ch
    }
}

impl<F: Fn(char) -> bool> CharMatcher for F {
    fn matches(&self, ch: char) -> bool {
        self(ch)
    }
}

/// Callback giving access to the lines after the current one (`1` = next line).
pub type LookAhead<'a> = &'a dyn Fn(usize) -> Option<String>;

/// Cursor over one line of text.
///
/// `start` marks the beginning of the token being read; `pos` is the current position. Both are
/// byte offsets into the line and always sit on char boundaries.
pub struct StringStream<'a> {
    string: &'a str,
    pub(crate) pos: usize,
    pub(crate) start: usize,
    tab_size: usize,
    line_start: usize,
    look_ahead: Option<LookAhead<'a>>,
    pub(crate) looked_ahead: usize,
}

impl<'a> StringStream<'a> {
    /// A stream over `string`.
    pub fn new(string: &'a str, tab_size: usize) -> Self {
        Self {
            string,
            pos: 0,
            start: 0,
            tab_size: tab_size.max(1),
            line_start: 0,
            look_ahead: None,
            looked_ahead: 0,
        }
    }

    pub(crate) fn with_look_ahead(mut self, look_ahead: LookAhead<'a>) -> Self {
        self.look_ahead = Some(look_ahead);
        self
    }

    /// The whole line.
    pub fn string(&self) -> &'a str {
        self.string
    }

    /// At end of line.
    pub fn eol(&self) -> bool {
        self.pos >= self.string.len()
    }

    /// At start of line.
    pub fn sol(&self) -> bool {
        self.pos == self.line_start
    }

    /// Next char without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.string[self.pos..].chars().next()
    }

    /// Consume and return the next char.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    /// Consume the next char if it matches.
    pub fn eat(&mut self, pattern: impl CharMatcher) -> Option<char> {
        let ch = self.peek()?;
        if pattern.matches(ch) {
            self.pos += ch.len_utf8();
            Some(ch)
        } else {
            None
        }
    }

    /// Consume chars while they match. Returns `true` if anything was consumed.
    pub fn eat_while(&mut self, pattern: impl CharMatcher) -> bool {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pattern.matches(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        self.pos > start
    }

    /// Consume whitespace. Returns `true` if anything was consumed.
    pub fn eat_space(&mut self) -> bool {
        self.eat_while(|c: char| c.is_whitespace() || c == '\u{a0}')
    }

    /// Move to the end of the line.
    pub fn skip_to_end(&mut self) {
        self.pos = self.string.len();
    }

    /// Move to the next occurrence of `ch`. Returns `false` (and stays put) if there is none.
    pub fn skip_to(&mut self, ch: char) -> bool {
        match self.string[self.pos..].find(ch) {
            Some(offset) => {
                self.pos += offset;
                true
            }
            None => false,
        }
    }

    /// Move back `n` chars (not past the token start).
    pub fn back_up(&mut self, n: usize) {
        for _ in 0..n {
            if self.pos <= self.start {
                break;
            }
            let ch_len = self.string[..self.pos]
                .chars()
                .next_back()
                .map(char::len_utf8)
                .unwrap_or(1);
            self.pos -= ch_len;
        }
    }

    /// Display column of the token start, with tabs expanded.
    pub fn column(&self) -> usize {
        let col = count_column(self.string, Some(self.start), self.tab_size);
        col.saturating_sub(self.line_start_column())
    }

    /// Display column of the first non-whitespace char.
    pub fn indentation(&self) -> usize {
        count_column(self.string, None, self.tab_size).saturating_sub(self.line_start_column())
    }

    /// Check whether `pattern` follows; consume it if `consume` is set.
    pub fn match_str(&mut self, pattern: &str, consume: bool, case_insensitive: bool) -> bool {
        let rest = &self.string[self.pos..];
        let matched = if case_insensitive {
            rest.len() >= pattern.len()
                && rest.is_char_boundary(pattern.len())
                && rest[..pattern.len()].eq_ignore_ascii_case(pattern)
        } else {
            rest.starts_with(pattern)
        };
        if matched && consume {
            self.pos += pattern.len();
        }
        matched
    }

    /// Match `re` at the current position; consume the match if `consume` is set.
    pub fn match_regex(&mut self, re: &Regex, consume: bool) -> Option<&'a str> {
        let string = self.string;
        let found = re.find_at(string, self.pos)?;
        if found.start() != self.pos {
            return None;
        }
        if consume {
            self.pos = found.end();
        }
        Some(&string[found.start()..found.end()])
    }

    /// Text of the current token.
    pub fn current(&self) -> &'a str {
        &self.string[self.start..self.pos]
    }

    /// Text of line `n` lines below the current one.
    pub fn look_ahead(&mut self, n: usize) -> Option<String> {
        let line = (self.look_ahead?)(n)?;
        self.looked_ahead = self.looked_ahead.max(n);
        Some(line)
    }

    /// Run `inner` as if the line started `n` chars later.
    pub fn hide_first_chars<R>(&mut self, n: usize, inner: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.line_start;
        let offset = self.string[self.line_start..]
            .char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(self.string.len() - self.line_start);
        self.line_start += offset;
        let result = inner(self);
        self.line_start = saved;
        result
    }

    fn line_start_column(&self) -> usize {
        if self.line_start == 0 {
            0
        } else {
            count_column(self.string, Some(self.line_start), self.tab_size)
        }
    }
}

fn first_non_space(text: &str) -> usize {
    text.char_indices()
        .find(|(_, c)| !(c.is_whitespace() || *c == '\u{a0}'))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Display width of `text` with tabs expanded to `tab_size` stops.
///
/// With `end == None` only the leading whitespace is measured (the indentation).
pub fn count_column(text: &str, end: Option<usize>, tab_size: usize) -> usize {
    let tab_size = tab_size.max(1);
    let end = end.unwrap_or_else(|| first_non_space(text)).min(text.len());
    let mut n = 0;
    for ch in text[..end].chars() {
        if ch == '\t' {
            n += tab_size - (n % tab_size);
        } else {
            n += 1;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_cursor_operations() {
        let mut s = StringStream::new("  foo(bar)", 4);
        assert!(s.sol());
        assert!(s.eat_space());
        assert_eq!(s.column(), 0);
        s.start = s.pos;
        assert_eq!(s.column(), 2);
        assert!(s.eat_while(char::is_alphabetic));
        assert_eq!(s.current(), "foo");
        assert_eq!(s.eat('('), Some('('));
        assert!(s.skip_to(')'));
        assert_eq!(s.peek(), Some(')'));
        s.back_up(2);
        assert_eq!(s.current(), "foo(b");
        s.skip_to_end();
        assert!(s.eol());
        assert_eq!(s.next(), None);
    }

    #[test]
    fn test_match_helpers() {
        let re = Regex::new(r"[0-9]+").unwrap();
        let mut s = StringStream::new("ABC 123", 4);
        assert!(s.match_str("abc", true, true));
        assert_eq!(s.match_regex(&re, true), None);
        s.eat_space();
        assert_eq!(s.match_regex(&re, true), Some("123"));
        assert!(s.eol());
    }

    #[test]
    fn test_indentation_with_tabs() {
        let s = StringStream::new("\t  x", 4);
        assert_eq!(s.indentation(), 6);
        assert_eq!(count_column("a\tb", Some(3), 4), 5);
    }

    #[test]
    fn test_look_ahead_records_distance() {
        let lines = ["next", "after"];
        let oracle = |n: usize| lines.get(n - 1).map(|l| l.to_string());
        let mut s = StringStream::new("x", 4).with_look_ahead(&oracle);
        assert_eq!(s.look_ahead(2).as_deref(), Some("after"));
        assert_eq!(s.look_ahead(5), None);
        assert_eq!(s.looked_ahead, 2);
    }
}
