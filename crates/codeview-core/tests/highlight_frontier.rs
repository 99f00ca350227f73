use codeview_core::{
    DocConfig, DocEvent, Document, HighlightProgress, Mode, ModeHandle, ModeRegistry, ModeSpec,
    Pos, StringStream, StyleId,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

const COMMENT: StyleId = 1;
const WORD: StyleId = 2;

/// `/* ... */` block comments spanning lines, words everywhere else.
struct BlockComments;

impl Mode for BlockComments {
    type State = bool;

    fn name(&self) -> &str {
        "block-comments"
    }

    fn start_state(&self) -> bool {
        false
    }

    fn token(&self, stream: &mut StringStream<'_>, in_comment: &mut bool) -> Option<StyleId> {
        if *in_comment {
            loop {
                if stream.match_str("*/", true, false) {
                    *in_comment = false;
                    break;
                }
                if stream.next().is_none() {
                    break;
                }
            }
            return Some(COMMENT);
        }
        if stream.match_str("/*", true, false) {
            *in_comment = true;
            return Some(COMMENT);
        }
        if stream.eat_while(|c: char| c.is_alphanumeric()) {
            return Some(WORD);
        }
        stream.next();
        None
    }
}

fn run_worker(doc: &mut Document) {
    let mut rounds = 0;
    let budget = doc.config().work_time();
    while let HighlightProgress::Yielded { .. } = doc.highlight_step(budget) {
        rounds += 1;
        assert!(rounds < 10_000, "highlight worker does not make progress");
    }
}

fn thousand_lines() -> String {
    (0..1000).map(|i| format!("word{i} more")).collect::<Vec<_>>().join("\n")
}

#[test]
fn test_edit_retreats_frontier_and_worker_catches_up() {
    let mut doc = Document::with_mode(
        &thousand_lines(),
        DocConfig::default(),
        ModeHandle::new(BlockComments),
    );
    assert!(doc.needs_highlight());
    run_worker(&mut doc);
    assert_eq!(doc.frontiers().highlight, 1000);
    assert!(!doc.needs_highlight());

    doc.replace_range("x", Pos::new(10, 0), Pos::new(10, 0), None).unwrap();
    assert!(doc.frontiers().highlight <= 10);
    assert!(doc.frontiers().mode <= 10);

    run_worker(&mut doc);
    assert_eq!(doc.frontiers().highlight, doc.line_count());
}

#[test]
fn test_opening_comment_restyles_following_lines() {
    let mut doc = Document::with_mode(
        "a\nb\nc\nd",
        DocConfig::default(),
        ModeHandle::new(BlockComments),
    );
    run_worker(&mut doc);
    let restyled = Rc::new(RefCell::new(Vec::new()));
    let log = restyled.clone();
    doc.subscribe(move |event| {
        if let DocEvent::LinesRestyled(lines) = event {
            log.borrow_mut().extend(lines.iter().copied());
        }
    });

    doc.replace_range("/*", Pos::new(1, 0), Pos::new(1, 0), None).unwrap();
    run_worker(&mut doc);
    assert_eq!(*restyled.borrow(), vec![1, 2, 3]);
    assert_eq!(doc.token_at(Pos::new(3, 1), true).style, Some(COMMENT));
    assert_eq!(doc.token_at(Pos::new(0, 1), true).style, Some(WORD));

    let state = doc.state_after(3, true).unwrap();
    assert_eq!(state.downcast_ref::<bool>(), Some(&true));
}

#[test]
fn test_registry_resolves_mime_types() {
    let mut registry = ModeRegistry::new();
    registry.define_mode("block-comments", |_| ModeHandle::new(BlockComments));
    registry.define_mime("text/x-blocks", ModeSpec::new("block-comments"));

    assert_eq!(registry.get_mode("text/x-blocks").name(), "block-comments");
    assert_eq!(registry.get_mode("block-comments").name(), "block-comments");
    assert_eq!(registry.get_mode("text/unknown").name(), "null");

    let mut doc = Document::new("plain");
    doc.set_mode(registry.get_mode("text/x-blocks"));
    assert_eq!(doc.line_styles(0).unwrap().spans.len(), 1);
}

#[test]
fn test_queries_replay_from_first_line_without_saved_states() {
    let mut doc = Document::with_mode("/* open\nx\ny", DocConfig::default(), ModeHandle::new(BlockComments));

    let state = doc.state_after(2, true).unwrap();
    assert_eq!(state.downcast_ref::<bool>(), Some(&true));
    assert_eq!(doc.token_at(Pos::new(2, 1), false).style, Some(COMMENT));
    assert_eq!(doc.token_at(Pos::new(1, 1), true).style, Some(COMMENT));
}
