//! Stateless modes driven by an ordered list of regex rules.

use codeview_core::{Mode, StringStream, StyleId};
use regex::Regex;

use crate::{
    SIMPLE_STYLE_BOOLEAN, SIMPLE_STYLE_COMMENT, SIMPLE_STYLE_KEY, SIMPLE_STYLE_NULL,
    SIMPLE_STYLE_NUMBER, SIMPLE_STYLE_PROPERTY, SIMPLE_STYLE_SECTION, SIMPLE_STYLE_STRING,
};

/// A single regex highlighting rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    style_id: StyleId,
    capture_group: Option<usize>,
    line_start: bool,
}

impl RegexRule {
    /// A rule styling every match of `pattern` found at the current position.
    pub fn new(pattern: &str, style_id: StyleId) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            style_id,
            capture_group: None,
            line_start: false,
        })
    }

    /// Consume (and style) only a capture group of each match. The group must start where
    /// the match starts.
    ///
    /// Example (INI key):
    /// - pattern: `([^=\s]+)\s*=`
    /// - capture_group: `1` (the key)
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// Only try the rule on the first non-whitespace token of a line.
    pub fn at_line_start(mut self) -> Self {
        self.line_start = true;
        self
    }

    /// Style assigned to matches.
    pub fn style_id(&self) -> StyleId {
        self.style_id
    }

    /// Try the rule at the stream position; on success the token is consumed.
    fn consume(&self, stream: &mut StringStream<'_>) -> bool {
        let Some(found) = stream.match_regex(&self.regex, false) else {
            return false;
        };
        let token = match self.capture_group {
            None => found,
            Some(group) => match self.regex.captures(found).and_then(|caps| caps.get(group)) {
                Some(m) if m.start() == 0 => &found[..m.end()],
                _ => return false,
            },
        };
        if token.is_empty() {
            return false;
        }
        for _ in token.chars() {
            stream.next();
        }
        true
    }
}

/// A mode that tries its rules in order at every position.
///
/// Designed for simple formats (JSON/INI/etc.). It is *not* intended to be a full parser.
#[derive(Debug, Clone)]
pub struct RegexMode {
    name: String,
    rules: Vec<RegexRule>,
}

impl RegexMode {
    /// A mode registered under `name`.
    pub fn new(name: impl Into<String>, rules: Vec<RegexRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// The rules, in priority order.
    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    /// A small default JSON grammar (property names, strings, numbers, booleans, null).
    pub fn json_default(styles: SimpleJsonStyles) -> Result<Self, regex::Error> {
        Ok(Self::new(
            "json",
            vec![
                RegexRule::new(r#"("(?:\\.|[^"\\])*")\s*:"#, styles.property)?.with_capture_group(1),
                // Unterminated strings run to the end of the line.
                RegexRule::new(r#""(?:\\.|[^"\\])*"?"#, styles.string)?,
                RegexRule::new(r#"-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?"#, styles.number)?,
                RegexRule::new(r#"(?:true|false)\b"#, styles.boolean)?,
                RegexRule::new(r#"null\b"#, styles.null)?,
            ],
        ))
    }

    /// A small default INI grammar (section, key, comment).
    pub fn ini_default(styles: SimpleIniStyles) -> Result<Self, regex::Error> {
        Ok(Self::new(
            "ini",
            vec![
                RegexRule::new(r#"[;#].*"#, styles.comment)?.at_line_start(),
                RegexRule::new(r#"\[[^\]]*\]"#, styles.section)?.at_line_start(),
                RegexRule::new(r#"([^=\s]+)\s*="#, styles.key)?
                    .with_capture_group(1)
                    .at_line_start(),
            ],
        ))
    }
}

impl Mode for RegexMode {
    type State = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn start_state(&self) {}

    fn token(&self, stream: &mut StringStream<'_>, _state: &mut ()) -> Option<StyleId> {
        if stream.eat_space() {
            return None;
        }
        let at_line_start = stream.column() == stream.indentation();
        for rule in &self.rules {
            if rule.line_start && !at_line_start {
                continue;
            }
            if rule.consume(stream) {
                return Some(rule.style_id);
            }
        }
        // Plain text up to the next candidate token start.
        stream.next();
        stream.eat_while(|c: char| c.is_alphanumeric() || c == '_');
        None
    }
}

/// Styles used by [`RegexMode::json_default`].
#[derive(Debug, Clone, Copy)]
pub struct SimpleJsonStyles {
    /// Object keys.
    pub property: StyleId,
    /// String values.
    pub string: StyleId,
    /// Numbers.
    pub number: StyleId,
    /// `true` / `false`.
    pub boolean: StyleId,
    /// `null`.
    pub null: StyleId,
}

impl Default for SimpleJsonStyles {
    fn default() -> Self {
        Self {
            property: SIMPLE_STYLE_PROPERTY,
            string: SIMPLE_STYLE_STRING,
            number: SIMPLE_STYLE_NUMBER,
            boolean: SIMPLE_STYLE_BOOLEAN,
            null: SIMPLE_STYLE_NULL,
        }
    }
}

/// Styles used by [`RegexMode::ini_default`].
#[derive(Debug, Clone, Copy)]
pub struct SimpleIniStyles {
    /// `[section]` headers.
    pub section: StyleId,
    /// Keys of `key = value` lines.
    pub key: StyleId,
    /// `;` and `#` comments.
    pub comment: StyleId,
}

impl Default for SimpleIniStyles {
    fn default() -> Self {
        Self {
            section: SIMPLE_STYLE_SECTION,
            key: SIMPLE_STYLE_KEY,
            comment: SIMPLE_STYLE_COMMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeview_core::{DocConfig, Document, ModeHandle};
    use pretty_assertions::assert_eq;

    /// Styled tokens of a one-line document.
    fn styled(mode: RegexMode, line: &str) -> Vec<(String, StyleId)> {
        let mut doc = Document::with_mode(line, DocConfig::default(), ModeHandle::new(mode));
        doc.line_tokens(0, true)
            .unwrap()
            .into_iter()
            .filter_map(|token| token.style.map(|style| (token.string, style)))
            .collect()
    }

    fn t(text: &str, style: StyleId) -> (String, StyleId) {
        (text.to_string(), style)
    }

    #[test]
    fn test_json_tokens() {
        let mode = RegexMode::json_default(SimpleJsonStyles::default()).unwrap();
        let got = styled(mode, r#"{ "key": "值", "n": -12.5e3, "ok": true, "x": null }"#);
        assert_eq!(
            got,
            vec![
                t(r#""key""#, SIMPLE_STYLE_PROPERTY),
                t(r#""值""#, SIMPLE_STYLE_STRING),
                t(r#""n""#, SIMPLE_STYLE_PROPERTY),
                t("-12.5e3", SIMPLE_STYLE_NUMBER),
                t(r#""ok""#, SIMPLE_STYLE_PROPERTY),
                t("true", SIMPLE_STYLE_BOOLEAN),
                t(r#""x""#, SIMPLE_STYLE_PROPERTY),
                t("null", SIMPLE_STYLE_NULL),
            ]
        );
    }

    #[test]
    fn test_ini_rules_only_at_line_start() {
        let ini = || RegexMode::ini_default(SimpleIniStyles::default()).unwrap();
        assert_eq!(styled(ini(), "[core]"), vec![t("[core]", SIMPLE_STYLE_SECTION)]);
        assert_eq!(styled(ini(), "  name = a;b"), vec![t("name", SIMPLE_STYLE_KEY)]);
        assert_eq!(styled(ini(), "; note"), vec![t("; note", SIMPLE_STYLE_COMMENT)]);
    }
}
