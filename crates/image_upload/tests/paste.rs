mod common;

use std::rc::Rc;

use futures::executor::LocalPool;
use plate_core::{Attrs, Node, Point, Selection, Slice};
use plate_image_upload::{
    ClipboardData, ClipboardItem, ImageFile, ImageUploader, SRC_ATTR, UploadOptions,
    UploaderConfig, placeholder_node,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

use common::{Harness, ScriptedUploader, png};

fn hello() -> Harness {
    Harness::new(vec![Node::paragraph("hello")], Point::new(vec![0, 0], 5))
}

fn placeholder_for(image: &Node, upload_id: &str) -> Node {
    placeholder_node(image.attrs().cloned().unwrap_or_default(), upload_id)
}

#[test]
fn pasted_image_becomes_placeholder_and_is_reuploaded() {
    let mut h = hello();
    let image = Node::image("https://elsewhere.test/a.png", Some(300));

    let slice = h
        .images
        .transform_pasted(Slice::closed(vec![Node::paragraph("x"), image.clone()]));
    assert_eq!(
        slice.content,
        vec![Node::paragraph("x"), placeholder_for(&image, "up-1")]
    );

    h.surface.borrow_mut().insert_slice(slice).unwrap();
    h.run();
    assert_eq!(
        h.fetcher.urls(),
        vec!["https://elsewhere.test/a.png".to_string()]
    );
    assert_eq!(h.uploader.call_ids(), vec!["up-1".to_string()]);

    h.uploader.resolve("up-1", "https://cdn.test/a.png");
    h.run();
    assert_eq!(
        h.children(),
        vec![
            Node::paragraph("hello"),
            Node::paragraph("x"),
            Node::image("https://cdn.test/a.png", Some(300)),
        ]
    );
}

#[test]
fn nested_images_are_spliced_in_document_order() {
    let mut h = hello();
    let deep = Node::image("https://elsewhere.test/deep.png", None);
    let top = Node::image("https://elsewhere.test/top.png", None);
    let pasted = vec![
        Node::element(
            "blockquote",
            vec![
                Node::paragraph("q"),
                Node::element("blockquote", vec![deep.clone(), Node::paragraph("tail")]),
            ],
        ),
        top.clone(),
    ];

    let slice = h.images.transform_pasted(Slice::new(pasted, 2, 1));
    assert_eq!(slice.open_start, 2);
    assert_eq!(slice.open_end, 1);
    assert_eq!(
        slice.content,
        vec![
            Node::element(
                "blockquote",
                vec![
                    Node::paragraph("q"),
                    Node::element(
                        "blockquote",
                        vec![placeholder_for(&deep, "up-1"), Node::paragraph("tail")],
                    ),
                ],
            ),
            placeholder_for(&top, "up-2"),
        ]
    );

    h.run();
    assert_eq!(
        h.fetcher.urls(),
        vec![
            "https://elsewhere.test/deep.png".to_string(),
            "https://elsewhere.test/top.png".to_string(),
        ]
    );
}

#[test]
fn images_without_src_and_other_nodes_pass_through() {
    let mut h = hello();
    let mut empty_src = Attrs::default();
    empty_src.insert(SRC_ATTR.to_string(), Value::from(""));
    let content = vec![
        Node::void("image", Attrs::default()),
        Node::void("image", empty_src),
        Node::divider(),
        Node::paragraph("plain"),
    ];

    let slice = h.images.transform_pasted(Slice::closed(content.clone()));
    assert_eq!(slice, Slice::closed(content));

    h.run();
    assert!(h.uploader.calls().is_empty());
}

#[test]
fn pasted_data_url_is_decoded_without_fetching() {
    let mut h = hello();
    let slice = h.images.transform_pasted(Slice::closed(vec![Node::image(
        "data:image/gif;base64,R0lG",
        None,
    )]));
    assert_eq!(slice.content.len(), 1);

    h.run();
    assert!(h.fetcher.urls().is_empty());
    let calls = h.uploader.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.mime, "image/gif");
    assert_eq!(calls[0].1.bytes, b"GIF".to_vec());
}

#[test]
fn paste_without_surface_is_left_alone() {
    common::init_tracing();
    let mut pool = LocalPool::new();
    let uploader = Rc::new(ScriptedUploader::default());
    let images = ImageUploader::new(
        UploaderConfig::new(UploadOptions::default()).uploader(uploader.clone()),
        pool.spawner(),
    );

    let slice = Slice::closed(vec![Node::image("https://elsewhere.test/a.png", None)]);
    assert_eq!(images.transform_pasted(slice.clone()), slice);

    pool.run_until_stalled();
    assert!(uploader.calls().is_empty());
}

#[test]
fn clipboard_with_html_goes_to_default_paste() {
    let mut h = hello();
    let before = h.children();
    let clipboard =
        ClipboardData::new(vec![ClipboardItem::html(), ClipboardItem::file(png("a.png"))]);

    assert!(!h.images.handle_paste(&h.surface, clipboard));
    h.run();
    assert_eq!(h.children(), before);
    assert!(h.uploader.calls().is_empty());
}

#[test]
fn clipboard_image_is_uploaded_at_caret() {
    let mut h = hello();
    let clipboard = ClipboardData::new(vec![
        ClipboardItem {
            mime: "text/plain".to_string(),
            file: None,
        },
        ClipboardItem::file(png("shot.png")),
    ]);

    assert!(h.images.handle_paste(&h.surface, clipboard));
    assert_eq!(h.placeholder_ids(), vec!["up-1".to_string()]);

    h.run();
    assert_eq!(h.uploader.calls()[0].1.name, "shot.png");
}

#[test]
fn clipboard_without_accepted_file_is_ignored() {
    let mut h = hello();
    let before = h.children();

    let webp = ClipboardData::new(vec![ClipboardItem::file(ImageFile::new(
        "a.webp",
        "image/webp",
        vec![1, 2, 3],
    ))]);
    assert!(!h.images.handle_paste(&h.surface, webp));

    let no_file = ClipboardData::new(vec![ClipboardItem {
        mime: "image/png".to_string(),
        file: None,
    }]);
    assert!(!h.images.handle_paste(&h.surface, no_file));
    assert!(!h.images.handle_paste(&h.surface, ClipboardData::default()));

    h.run();
    assert_eq!(h.children(), before);
}

#[test]
fn clipboard_paste_binds_target_surface() {
    let mut h = hello();
    let other = common::surface(
        &UploadOptions::default(),
        vec![Node::paragraph("other")],
        Selection::collapsed(Point::new(vec![0, 0], 5)),
    );

    let clipboard = ClipboardData::new(vec![ClipboardItem::file(png("a.png"))]);
    assert!(h.images.handle_paste(&other, clipboard));
    assert!(h.placeholder_ids().is_empty());
    assert_eq!(
        common::placeholder_ids(&other.borrow()),
        vec!["up-1".to_string()]
    );

    h.run();
    h.uploader.resolve("up-1", "https://cdn.test/a.png");
    h.run();
    assert_eq!(
        common::image_srcs(&other.borrow()),
        vec!["https://cdn.test/a.png".to_string()]
    );
}
