use codeview_core::{BidiSpan, DocConfig, Direction, Document, MoveDir, MoveUnit, Pos, Sticky};
use pretty_assertions::assert_eq;

const MIXED: &str = "abc\u{5d0}\u{5d1}\u{5d2}";

#[test]
fn test_document_order_of_mixed_line() {
    let mut doc = Document::new(&format!("plain\n{MIXED}"));
    assert_eq!(doc.bidi_order(0).unwrap(), None);
    assert_eq!(
        doc.bidi_order(1).unwrap(),
        Some(vec![
            BidiSpan { from: 0, to: 3, level: 0 },
            BidiSpan { from: 3, to: 6, level: 1 },
        ])
    );
}

#[test]
fn test_edit_drops_cached_order() {
    let mut doc = Document::new(MIXED);
    assert!(doc.bidi_order(0).unwrap().is_some());
    doc.replace_range("def", Pos::new(0, 3), Pos::new(0, 6), None).unwrap();
    assert_eq!(doc.bidi_order(0).unwrap(), None);
}

#[test]
fn test_rtl_configured_document() {
    let config = DocConfig {
        direction: Direction::Rtl,
        ..DocConfig::default()
    };
    let mut doc = Document::with_config("abc \u{5d0}\u{5d1}", config);
    let order = doc.bidi_order(0).unwrap().unwrap();
    assert_eq!(order.first().map(|s| s.level), Some(1));
    assert_eq!(order.last().map(|s| (s.from, s.level)), Some((0, 0)));
}

#[test]
fn test_visual_motion_enters_rtl_run_from_its_start() {
    let mut doc = Document::new(MIXED);
    let start = Pos::with_sticky(0, 3, Sticky::After);
    let motion = doc.move_h(start, MoveDir::Backward, MoveUnit::Char, true);
    assert_eq!(motion.pos, Pos::new(0, 4));
    assert!(!motion.hit_side);

    let motion = doc.move_h(Pos::new(0, 1), MoveDir::Forward, MoveUnit::Char, true);
    assert_eq!(motion.pos, Pos::new(0, 2));
}
