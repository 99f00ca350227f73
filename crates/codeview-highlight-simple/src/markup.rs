//! A stateful mode for HTML and XML source.
//!
//! The state tracks where the tokenizer is (text, tag, attribute value, comment, ...) and the
//! stack of open elements, which drives smart indentation.

use codeview_core::{Mode, ModeHooks, StringStream, StyleId};

use crate::{
    SIMPLE_STYLE_ATTRIBUTE, SIMPLE_STYLE_COMMENT, SIMPLE_STYLE_ENTITY, SIMPLE_STYLE_META,
    SIMPLE_STYLE_STRING, SIMPLE_STYLE_TAG,
};

/// HTML elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Where the tokenizer currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Inside {
    /// Character data.
    #[default]
    Text,
    /// `<!-- ... -->`.
    Comment,
    /// `<![CDATA[ ... ]]>`.
    CData,
    /// `<!DOCTYPE ...>` or `<? ... ?>`; holds the closing delimiter.
    Declaration(&'static str),
    /// Between `<name` (or `</name`) and `>`.
    Tag {
        /// Element name.
        name: String,
        /// A closing tag.
        closing: bool,
    },
    /// A quoted attribute value continuing on the next line.
    AttrValue {
        /// Element name.
        name: String,
        /// The quote that ends the value.
        quote: char,
    },
}

/// Tokenizer state of [`MarkupMode`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkupState {
    /// Open elements, outermost first.
    pub open: Vec<String>,
    /// Current context.
    pub inside: Inside,
}

/// Tokenizer for HTML (`html = true`: case-insensitive names, void elements) or XML source.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupMode {
    html: bool,
}

impl MarkupMode {
    /// XML flavour.
    pub fn xml() -> Self {
        Self { html: false }
    }

    /// HTML flavour.
    pub fn html() -> Self {
        Self { html: true }
    }

    fn normalize(&self, name: &str) -> String {
        if self.html {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }

    fn text_token(
        &self,
        stream: &mut StringStream<'_>,
        state: &mut MarkupState,
    ) -> Option<StyleId> {
        if stream.match_str("<!--", true, false) {
            state.inside = Inside::Comment;
            return Some(SIMPLE_STYLE_COMMENT);
        }
        if stream.match_str("<![CDATA[", true, false) {
            state.inside = Inside::CData;
            return Some(SIMPLE_STYLE_META);
        }
        if stream.match_str("<!", true, false) {
            state.inside = Inside::Declaration(">");
            return Some(SIMPLE_STYLE_META);
        }
        if stream.match_str("<?", true, false) {
            state.inside = Inside::Declaration("?>");
            return Some(SIMPLE_STYLE_META);
        }
        if stream.eat('<').is_some() {
            let closing = stream.eat('/').is_some();
            let before = stream.current().len();
            stream.eat_while(is_name_char);
            let name = self.normalize(&stream.current()[before..]);
            state.inside = Inside::Tag { name, closing };
            return Some(SIMPLE_STYLE_TAG);
        }
        if stream.eat('&').is_some() {
            let ok = stream.eat_while(|c: char| c.is_ascii_alphanumeric() || c == '#');
            if ok && stream.eat(';').is_some() {
                return Some(SIMPLE_STYLE_ENTITY);
            }
            return None;
        }
        stream.next();
        stream.eat_while(|c: char| c != '<' && c != '&');
        None
    }

    fn tag_token(
        &self,
        stream: &mut StringStream<'_>,
        state: &mut MarkupState,
        name: String,
        closing: bool,
    ) -> Option<StyleId> {
        // `state.inside` is `Text` here; paths that stay in the tag put it back.
        if stream.match_str("/>", true, false) {
            return Some(SIMPLE_STYLE_TAG);
        }
        if stream.eat('>').is_some() {
            if closing {
                if let Some(index) = state.open.iter().rposition(|open| *open == name) {
                    state.open.truncate(index);
                }
            } else if !(self.html && VOID_ELEMENTS.contains(&name.as_str())) && !name.is_empty() {
                state.open.push(name);
            }
            return Some(SIMPLE_STYLE_TAG);
        }
        if let Some(quote) = stream.eat(|c: char| c == '"' || c == '\'') {
            return self.attr_value(stream, state, name, quote);
        }
        state.inside = Inside::Tag { name, closing };
        if stream.eat_space() || stream.eat('=').is_some() {
            return None;
        }
        let attribute_char =
            |c: char| !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'');
        if stream.eat_while(attribute_char) {
            return Some(SIMPLE_STYLE_ATTRIBUTE);
        }
        stream.next();
        None
    }

    fn attr_value(
        &self,
        stream: &mut StringStream<'_>,
        state: &mut MarkupState,
        name: String,
        quote: char,
    ) -> Option<StyleId> {
        if stream.skip_to(quote) {
            stream.next();
            state.inside = Inside::Tag {
                name,
                closing: false,
            };
        } else {
            stream.skip_to_end();
            state.inside = Inside::AttrValue { name, quote };
        }
        Some(SIMPLE_STYLE_STRING)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
}

/// Consume up to and including `end`, or the whole line. Returns `true` if `end` was found.
fn skip_past(stream: &mut StringStream<'_>, end: &str) -> bool {
    while !stream.eol() {
        if stream.match_str(end, true, false) {
            return true;
        }
        stream.next();
    }
    false
}

fn indent(state: &MarkupState, text_after: &str, indent_unit: usize) -> Option<usize> {
    match state.inside {
        Inside::Text => {}
        Inside::Tag { .. } => return Some((state.open.len() + 1) * indent_unit),
        _ => return None,
    }
    let mut depth = state.open.len();
    if text_after.starts_with("</") {
        depth = depth.saturating_sub(1);
    }
    Some(depth * indent_unit)
}

impl Mode for MarkupMode {
    type State = MarkupState;

    fn name(&self) -> &str {
        "xml"
    }

    fn start_state(&self) -> MarkupState {
        MarkupState::default()
    }

    fn token(&self, stream: &mut StringStream<'_>, state: &mut MarkupState) -> Option<StyleId> {
        match std::mem::take(&mut state.inside) {
            Inside::Text => self.text_token(stream, state),
            Inside::Comment => {
                if !skip_past(stream, "-->") {
                    state.inside = Inside::Comment;
                }
                Some(SIMPLE_STYLE_COMMENT)
            }
            Inside::CData => {
                if !skip_past(stream, "]]>") {
                    state.inside = Inside::CData;
                }
                Some(SIMPLE_STYLE_META)
            }
            Inside::Declaration(end) => {
                if !skip_past(stream, end) {
                    state.inside = Inside::Declaration(end);
                }
                Some(SIMPLE_STYLE_META)
            }
            Inside::Tag { name, closing } => self.tag_token(stream, state, name, closing),
            Inside::AttrValue { name, quote } => self.attr_value(stream, state, name, quote),
        }
    }

    fn hooks(&self) -> ModeHooks<MarkupState> {
        ModeHooks {
            indent: Some(indent),
            electric_chars: Some("/"),
            ..ModeHooks::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeview_core::{DocConfig, Document, ModeHandle, Pos};
    use pretty_assertions::assert_eq;

    fn doc(text: &str, mode: MarkupMode) -> Document {
        Document::with_mode(text, DocConfig::default(), ModeHandle::new(mode))
    }

    fn styled(doc: &mut Document, line: usize) -> Vec<(String, StyleId)> {
        doc.line_tokens(line, true)
            .unwrap()
            .into_iter()
            .filter_map(|token| token.style.map(|style| (token.string, style)))
            .collect()
    }

    #[test]
    fn test_tag_with_attributes() {
        let mut doc = doc(r#"<a href="x.html" hidden>go &amp; see</a>"#, MarkupMode::html());
        assert_eq!(
            styled(&mut doc, 0),
            vec![
                ("<a".to_string(), SIMPLE_STYLE_TAG),
                ("href".to_string(), SIMPLE_STYLE_ATTRIBUTE),
                (r#""x.html""#.to_string(), SIMPLE_STYLE_STRING),
                ("hidden".to_string(), SIMPLE_STYLE_ATTRIBUTE),
                (">".to_string(), SIMPLE_STYLE_TAG),
                ("&amp;".to_string(), SIMPLE_STYLE_ENTITY),
                ("</a".to_string(), SIMPLE_STYLE_TAG),
                (">".to_string(), SIMPLE_STYLE_TAG),
            ]
        );
    }

    #[test]
    fn test_comment_spans_lines() {
        let mut doc = doc("<!-- one\ntwo -->\n<b>", MarkupMode::xml());
        assert_eq!(styled(&mut doc, 1), vec![("two -->".to_string(), SIMPLE_STYLE_COMMENT)]);
        assert_eq!(doc.token_at(Pos::new(2, 1), true).style, Some(SIMPLE_STYLE_TAG));

        let mut open = Document::with_mode(
            "<!--\nx\ny",
            DocConfig::default(),
            ModeHandle::new(MarkupMode::xml()),
        );
        let state = open.state_after(2, true).unwrap();
        assert_eq!(
            state.downcast_ref::<MarkupState>().map(|s| s.inside.clone()),
            Some(Inside::Comment)
        );
        assert_eq!(open.token_at(Pos::new(2, 1), false).style, Some(SIMPLE_STYLE_COMMENT));
    }

    #[test]
    fn test_open_elements_drive_indentation() {
        let mut doc = doc("<ul>\n<li>\nitem\n</li>\n<br>\n</ul>", MarkupMode::html());
        assert_eq!(doc.smart_indent(1).unwrap(), Some(2));
        assert_eq!(doc.smart_indent(2).unwrap(), Some(4));
        assert_eq!(doc.smart_indent(3).unwrap(), Some(2));
        // `<br>` is void, so `</ul>` closes back to the top level.
        assert_eq!(doc.smart_indent(5).unwrap(), Some(0));

        let state = doc.state_after(4, true).unwrap();
        let state = state.downcast_ref::<MarkupState>().unwrap();
        assert_eq!(state.open, vec!["ul".to_string()]);
    }

    #[test]
    fn test_xml_keeps_case_and_has_no_void_elements() {
        let mut doc = doc("<Root><br>", MarkupMode::xml());
        let state = doc.state_after(0, true).unwrap();
        let state = state.downcast_ref::<MarkupState>().unwrap();
        assert_eq!(state.open, vec!["Root".to_string(), "br".to_string()]);
    }
}
