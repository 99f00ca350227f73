use codeview_core::{
    Collapse, DocConfig, DocError, Document, HistorySize, HistorySnapshot, MarkerOptions, Pos,
    Selection, SelectionOptions,
};
use pretty_assertions::assert_eq;

fn type_text(doc: &mut Document, text: &str) {
    for ch in text.chars() {
        doc.replace_selection(&ch.to_string(), Collapse::End, Some("+input"))
            .unwrap();
    }
}

#[test]
fn test_typing_is_one_step_and_redo_reapplies_it() {
    let mut doc = Document::new("");
    type_text(&mut doc, "hello");
    assert_eq!(doc.get_value(None), "hello");
    assert_eq!(doc.history_size(), HistorySize { undo: 1, redo: 0 });

    assert!(doc.undo());
    assert_eq!(doc.get_value(None), "");
    assert_eq!(doc.selection().primary().head, Pos::new(0, 0));

    assert!(doc.redo());
    assert_eq!(doc.get_value(None), "hello");
    assert_eq!(doc.selection().primary().head, Pos::new(0, 5));
}

#[test]
fn test_different_origins_do_not_merge() {
    let mut doc = Document::new("");
    type_text(&mut doc, "ab");
    doc.replace_selection("c", Collapse::End, Some("paste")).unwrap();
    doc.replace_selection("d", Collapse::End, Some("paste")).unwrap();
    assert_eq!(doc.history_size().undo, 3);

    doc.undo();
    assert_eq!(doc.get_value(None), "abc");
    doc.undo();
    assert_eq!(doc.get_value(None), "ab");
}

#[test]
fn test_star_origins_always_merge() {
    let mut doc = Document::new("x");
    doc.replace_range("1", Pos::new(0, 0), Pos::new(0, 0), Some("*compose")).unwrap();
    doc.replace_range("2", Pos::new(0, 2), Pos::new(0, 2), Some("*compose")).unwrap();
    assert_eq!(doc.get_value(None), "1x2");
    assert!(doc.undo());
    assert_eq!(doc.get_value(None), "x");
}

#[test]
fn test_new_change_clears_redo() {
    let mut doc = Document::new("abc");
    doc.replace_range("1", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
    doc.undo();
    assert_eq!(doc.history_size().redo, 1);
    doc.replace_range("2", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
    assert_eq!(doc.history_size(), HistorySize { undo: 1, redo: 0 });
    assert!(!doc.redo());
}

#[test]
fn test_undo_depth_evicts_oldest_steps() {
    let config = DocConfig {
        undo_depth: 2,
        ..DocConfig::default()
    };
    let mut doc = Document::with_config("", config);
    for (i, text) in ["a", "b", "c"].into_iter().enumerate() {
        doc.replace_range(text, Pos::new(0, i), Pos::new(0, i), None).unwrap();
    }
    assert_eq!(doc.history_size().undo, 2);
    assert!(doc.undo());
    assert!(doc.undo());
    assert!(!doc.undo());
    assert_eq!(doc.get_value(None), "a");
}

#[test]
fn test_multi_range_replace_undoes_together() {
    let mut doc = Document::new("one\ntwo\nthree");
    doc.set_selections(
        vec![
            codeview_core::Range::new(Pos::new(0, 0), Pos::new(0, 3)),
            codeview_core::Range::new(Pos::new(2, 0), Pos::new(2, 5)),
        ],
        Some(1),
        SelectionOptions::default(),
    );
    doc.replace_selection("X", Collapse::Around, None).unwrap();
    assert_eq!(doc.get_value(None), "X\ntwo\nX");
    assert_eq!(doc.get_selections(None), vec!["X", "X"]);

    assert!(doc.undo());
    assert_eq!(doc.get_value(None), "one\ntwo\nthree");
    assert_eq!(doc.get_selections(None), vec!["one", "three"]);
    assert_eq!(doc.history_size().undo, 0);
}

#[test]
fn test_selection_only_undo_walks_cursor_history() {
    let mut doc = Document::new("abcdef");
    doc.replace_range("!", Pos::new(0, 6), Pos::new(0, 6), None).unwrap();
    doc.set_selection(Selection::cursor(Pos::new(0, 1)), SelectionOptions::default());
    doc.set_selection(
        Selection::simple(Pos::new(0, 1), Pos::new(0, 3)),
        SelectionOptions::default(),
    );

    assert!(doc.undo_selection());
    assert_eq!(doc.selection().primary().head, Pos::new(0, 1));
    assert_eq!(doc.get_value(None), "abcdef!");
}

#[test]
fn test_snapshot_json_round_trip_keeps_undo_working() {
    let mut doc = Document::new("first");
    doc.replace_range(" second", Pos::new(0, 5), Pos::new(0, 5), None).unwrap();
    doc.replace_range("\nthird", Pos::new(0, 12), Pos::new(0, 12), None).unwrap();
    let json = doc.history_snapshot().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value.get("done").is_some());

    let mut reloaded = Document::new(&doc.get_value(None));
    reloaded.set_history(HistorySnapshot::from_json(&json).unwrap());
    assert_eq!(reloaded.history_size(), doc.history_size());
    assert!(reloaded.undo());
    assert_eq!(reloaded.get_value(None), "first second");
    assert!(reloaded.undo());
    assert_eq!(reloaded.get_value(None), "first");

    assert!(HistorySnapshot::from_json("{not json").is_err());
}

#[test]
fn test_failed_batch_is_reverted_by_one_undo() {
    let mut doc = Document::new("one\ntwo\nthree");
    doc.mark_text(
        Pos::new(2, 0),
        Pos::new(2, 5),
        MarkerOptions {
            read_only: true,
            ..MarkerOptions::default()
        },
    )
    .unwrap();

    let result = doc.operation(|doc| {
        doc.replace_range("ONE", Pos::new(0, 0), Pos::new(0, 3), None)?;
        doc.replace_range("TWO", Pos::new(1, 0), Pos::new(1, 3), None)?;
        doc.replace_range("x", Pos::new(2, 1), Pos::new(2, 2), None)
    });
    assert!(matches!(result, Err(DocError::ReadOnlyRange { .. })));
    assert!(!doc.in_operation());
    assert_eq!(doc.get_value(None), "ONE\nTWO\nthree");

    assert!(doc.undo());
    assert_eq!(doc.get_value(None), "one\ntwo\nthree");
}
