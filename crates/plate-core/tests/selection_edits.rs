use plate_core::{Document, Editor, Node, PluginRegistry, Point, Selection, Slice, Transaction};
use pretty_assertions::assert_eq;

fn editor(children: Vec<Node>, anchor: Point, focus: Point) -> Editor {
    Editor::new(
        Document::new(children),
        Selection { anchor, focus },
        PluginRegistry::richtext(),
    )
}

fn delete_selection(editor: &mut Editor) {
    let (ops, caret) = editor.delete_selection_ops().unwrap();
    editor
        .apply(Transaction::new(ops).selection_after(Selection::collapsed(caret)))
        .unwrap();
}

#[test]
fn deletes_range_inside_one_leaf() {
    let mut editor = editor(
        vec![Node::paragraph("hello world")],
        Point::new(vec![0, 0], 5),
        Point::new(vec![0, 0], 11),
    );
    delete_selection(&mut editor);
    assert_eq!(editor.doc().children, vec![Node::paragraph("hello")]);
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 5)));
}

#[test]
fn deletes_backwards_selection_across_blocks() {
    let mut editor = editor(
        vec![
            Node::paragraph("abc"),
            Node::paragraph("middle"),
            Node::paragraph("xyz"),
        ],
        Point::new(vec![2, 0], 1),
        Point::new(vec![0, 0], 2),
    );
    delete_selection(&mut editor);
    assert_eq!(editor.doc().children, vec![Node::paragraph("abyz")]);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn collapsed_selection_deletes_nothing() {
    let editor = editor(
        vec![Node::paragraph("abc")],
        Point::new(vec![0, 0], 1),
        Point::new(vec![0, 0], 1),
    );
    let (ops, caret) = editor.delete_selection_ops().unwrap();
    assert!(ops.is_empty());
    assert_eq!(caret, Point::new(vec![0, 0], 1));
}

#[test]
fn selection_across_containers_is_rejected() {
    let editor = editor(
        vec![
            Node::paragraph("abc"),
            Node::element("blockquote", vec![Node::paragraph("quoted")]),
        ],
        Point::new(vec![0, 0], 1),
        Point::new(vec![1, 0, 0], 2),
    );
    assert!(editor.delete_selection_ops().is_err());
}

#[test]
fn insert_slice_places_blocks_after_caret_block() {
    let mut editor = editor(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        Point::new(vec![0, 0], 1),
        Point::new(vec![0, 0], 1),
    );
    editor
        .insert_slice(Slice::new(
            vec![Node::paragraph("pasted"), Node::divider()],
            1,
            1,
        ))
        .unwrap();

    assert_eq!(
        editor.doc().children,
        vec![
            Node::paragraph("one"),
            Node::paragraph("pasted"),
            Node::divider(),
            Node::paragraph("two"),
        ]
    );
    assert!(editor.undo());
    assert_eq!(editor.doc().children.len(), 2);
}

#[test]
fn set_selection_clamps_onto_existing_text() {
    let mut editor = editor(
        vec![Node::paragraph("ab"), Node::paragraph("cd")],
        Point::new(vec![0, 0], 0),
        Point::new(vec![0, 0], 0),
    );

    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 99)));
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![0, 0], 2)));

    editor.set_selection(Selection::collapsed(Point::new(vec![5, 3], 1)));
    assert_eq!(editor.selection(), &Selection::collapsed(Point::new(vec![1, 0], 1)));
}
