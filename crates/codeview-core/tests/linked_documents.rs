use codeview_core::{Change, DocConfig, DocError, LinkOptions, MarkerOptions, Pos, Workspace};
use pretty_assertions::assert_eq;

fn value(ws: &Workspace, id: codeview_core::DocId) -> String {
    ws.doc(id).unwrap().get_value(None)
}

#[test]
fn test_sub_view_follows_edits_around_it() {
    let mut ws = Workspace::new();
    let main = ws.open("a\nb\nc\nd\ne", DocConfig::default());
    let view = ws
        .link(
            main,
            LinkOptions {
                from: Some(1),
                to: Some(4),
                ..LinkOptions::default()
            },
        )
        .unwrap();
    assert_eq!(value(&ws, view), "b\nc\nd");
    assert_eq!(ws.doc(view).unwrap().first_line(), 1);

    // Edits in the view reach the main document.
    ws.replace_range(view, "B", Pos::new(1, 0), Pos::new(1, 1), None).unwrap();
    assert_eq!(value(&ws, main), "a\nB\nc\nd\ne");

    // Lines added above shift the view.
    ws.replace_range(main, "z\n", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
    assert_eq!(ws.doc(view).unwrap().first_line(), 2);
    assert_eq!(value(&ws, view), "B\nc\nd");

    // Edits below it are ignored.
    ws.replace_range(main, "E", Pos::new(5, 0), Pos::new(5, 1), None).unwrap();
    assert_eq!(value(&ws, main), "z\na\nB\nc\nd\nE");
    assert_eq!(value(&ws, view), "B\nc\nd");

    // A change straddling its first line is clipped.
    ws.replace_range(main, "", Pos::new(1, 0), Pos::new(2, 1), None).unwrap();
    assert_eq!(value(&ws, main), "z\n\nc\nd\nE");
    let view_doc = ws.doc(view).unwrap();
    assert_eq!(view_doc.first_line(), 1);
    assert_eq!(view_doc.get_value(None), "\nc\nd");
}

#[test]
fn test_unshared_history_is_rebased() {
    let mut ws = Workspace::new();
    let a = ws.open("one\ntwo", DocConfig::default());
    let b = ws.link(a, LinkOptions::default()).unwrap();

    ws.replace_range(b, "X", Pos::new(1, 0), Pos::new(1, 0), None).unwrap();
    ws.replace_range(a, "new\n", Pos::new(0, 0), Pos::new(0, 0), None).unwrap();
    assert_eq!(value(&ws, b), "new\none\nXtwo");

    // b's own step moved down with the inserted line.
    assert_eq!(ws.undo(b), Ok(true));
    assert_eq!(value(&ws, a), "new\none\ntwo");
    assert_eq!(value(&ws, b), "new\none\ntwo");

    // a still undoes its own step.
    assert_eq!(ws.undo(a), Ok(true));
    assert_eq!(value(&ws, a), "one\ntwo");
    assert_eq!(value(&ws, b), "one\ntwo");
    assert_eq!(ws.undo(b), Ok(false));
}

#[test]
fn test_overlapping_edit_drops_unshared_history() {
    let mut ws = Workspace::new();
    let a = ws.open("one\ntwo", DocConfig::default());
    let b = ws.link(a, LinkOptions::default()).unwrap();

    ws.replace_range(b, "X", Pos::new(1, 0), Pos::new(1, 0), None).unwrap();
    ws.replace_range(a, "Y", Pos::new(1, 1), Pos::new(1, 1), None).unwrap();
    assert_eq!(ws.doc(b).unwrap().history_size().undo, 0);
    assert_eq!(ws.doc(a).unwrap().history_size().undo, 1);
}

#[test]
fn test_shared_history_chain() {
    let mut ws = Workspace::new();
    let shared = LinkOptions {
        shared_history: true,
        ..LinkOptions::default()
    };
    let a = ws.open("text", DocConfig::default());
    let b = ws.link(a, shared.clone()).unwrap();
    let c = ws.link(b, shared).unwrap();

    ws.apply_change(c, Change::new(Pos::new(0, 4), Pos::new(0, 4), "!")).unwrap();
    for id in [a, b, c] {
        assert_eq!(value(&ws, id), "text!");
        assert_eq!(ws.doc(id).unwrap().history_size().undo, 1);
    }
    assert_eq!(ws.undo(a), Ok(true));
    for id in [a, b, c] {
        assert_eq!(value(&ws, id), "text");
    }
    assert_eq!(ws.redo(b), Ok(true));
    assert_eq!(value(&ws, c), "text!");
}

#[test]
fn test_read_only_marker_in_source_blocks_propagation() {
    let mut ws = Workspace::new();
    let a = ws.open("locked", DocConfig::default());
    let b = ws.link(a, LinkOptions::default()).unwrap();
    ws.with_doc(a, |doc| {
        doc.mark_text(
            Pos::new(0, 0),
            Pos::new(0, 6),
            MarkerOptions {
                read_only: true,
                ..MarkerOptions::default()
            },
        )
    })
    .unwrap()
    .unwrap();

    let err = ws.replace_range(a, "x", Pos::new(0, 2), Pos::new(0, 3), None);
    assert!(matches!(err, Err(DocError::ReadOnlyRange { .. })));
    assert_eq!(value(&ws, b), "locked");
}

#[test]
fn test_with_doc_on_missing_document() {
    let mut ws = Workspace::new();
    let a = ws.open("x", DocConfig::default());
    ws.close(a).unwrap();
    assert_eq!(ws.with_doc(a, |doc| doc.line_count()), Err(DocError::UnknownDocument(a)));
    assert!(ws.is_empty());
}
