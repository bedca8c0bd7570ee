use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::task::{LocalSpawn, LocalSpawnExt};
use plate_core::{
    Attrs, Document, Editor, Node, NodeRole, Op, Point, Selection, Transaction,
    clamp_to_char_boundary,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::events::{ClipboardData, DropEvent, SurfaceEvent, UploadPosition, UploadSource};
use crate::file::ImageFile;
use crate::placeholder::{
    MediaKind, PLACEHOLDER_KIND, SRC_ATTR, UPLOAD_ID_ATTR, placeholder_node, resolved_image,
};

/// An editing surface the uploader can insert into.
///
/// Upload tasks borrow it mutably when they complete. A task that finds the
/// surface already borrowed gives up and leaves its placeholders alone.
pub type Surface = Rc<RefCell<Editor>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Every placeholder still carrying the id was swapped for the final image.
    Resolved { replaced: usize },
    /// All placeholders were removed before the upload finished.
    Vanished,
    /// The upload (or the resolving edit) failed; placeholders stay as they are.
    Failed,
}

/// Drives image uploads for whichever editing surface is currently active.
pub struct ImageUploader {
    config: Rc<UploaderConfig>,
    spawner: Rc<dyn LocalSpawn>,
    active: RefCell<Option<Surface>>,
}

impl ImageUploader {
    pub fn new(config: UploaderConfig, spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            config: Rc::new(config),
            spawner: Rc::new(spawner),
            active: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn set_active_surface(&self, surface: Surface) {
        *self.active.borrow_mut() = Some(surface);
    }

    pub fn active_surface(&self) -> Option<Surface> {
        self.active.borrow().clone()
    }

    /// Keydown/drop/focus hook: binds `surface` and lets the event through.
    pub fn capture_view(&self, event: SurfaceEvent, surface: &Surface) -> bool {
        debug!(?event, "binding image uploader to surface");
        self.set_active_surface(Rc::clone(surface));
        false
    }

    /// Inserts a placeholder for `source` and starts its upload.
    ///
    /// Returns the caret right after the placeholder, where a follow-up
    /// insert should go to keep several images in order.
    pub fn insert_upload(
        &self,
        source: UploadSource,
        position: UploadPosition,
    ) -> Result<Point, UploadError> {
        let surface = self.active_surface().ok_or(UploadError::NoActiveSurface)?;
        let upload_id = self.config.next_upload_id();

        let mut attrs = Attrs::default();
        attrs.insert(SRC_ATTR.to_string(), Value::String(source.preview_src()));
        let placeholder = placeholder_node(attrs, &upload_id);

        let caret = {
            let mut editor = surface.borrow_mut();
            let tx = placeholder_insertion(&editor, position, placeholder)?;
            editor.apply(tx)?;
            editor.selection().focus.clone()
        };
        debug!(%upload_id, "inserted image placeholder");

        self.spawn_upload(surface, source, upload_id);
        Ok(caret)
    }

    /// Uploads `source` and swaps every placeholder tagged `upload_id` on the
    /// active surface for the final image.
    pub fn complete_upload(
        &self,
        source: UploadSource,
        upload_id: String,
    ) -> impl Future<Output = UploadOutcome> + use<> {
        let config = Rc::clone(&self.config);
        let surface = self.active_surface();
        async move {
            let Some(surface) = surface else {
                warn!(%upload_id, "no active surface to resolve image upload into");
                return UploadOutcome::Failed;
            };
            run_upload(config, surface, source, upload_id).await
        }
    }

    pub(crate) fn spawn_upload(&self, surface: Surface, source: UploadSource, upload_id: String) {
        let task = run_upload(Rc::clone(&self.config), surface, source, upload_id.clone());
        if let Err(err) = self.spawner.spawn_local(async move {
            task.await;
        }) {
            warn!(%upload_id, error = %err, "failed to spawn image upload task");
        }
    }

    /// Drop hook for `surface`; binds it first, like [`Self::capture_view`].
    pub fn handle_drop(&self, surface: &Surface, event: DropEvent) -> bool {
        self.set_active_surface(Rc::clone(surface));
        if event.files.is_empty() {
            return false;
        }
        let Some(mut at) = event.position else {
            return false;
        };

        let accepted: Vec<ImageFile> = event
            .files
            .into_iter()
            .filter(|file| self.config.options.accepts(&file.mime))
            .collect();
        if accepted.is_empty() {
            return false;
        }

        for file in accepted {
            match self.insert_upload(UploadSource::File(file), UploadPosition::At(at)) {
                Ok(next) => at = next,
                Err(err) => {
                    warn!(error = %err, "failed to queue dropped image");
                    return false;
                }
            }
        }
        true
    }

    /// Clipboard hook for `surface`, which it binds first. Pastes carrying
    /// HTML go to the default handler, since word processors and spreadsheets
    /// put images next to real markup.
    pub fn handle_paste(&self, surface: &Surface, clipboard: ClipboardData) -> bool {
        self.set_active_surface(Rc::clone(surface));
        if clipboard.has_html() {
            return false;
        }

        let Some(file) = clipboard
            .items
            .into_iter()
            .filter(|item| self.config.options.accepts(&item.mime))
            .find_map(|item| item.file)
        else {
            return false;
        };

        match self.insert_upload(UploadSource::File(file), UploadPosition::Selection) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "failed to queue pasted image");
                false
            }
        }
    }

    /// The "upload image" command. True when the upload was started, which
    /// says nothing about whether it will succeed.
    pub fn upload_image(&self, file: ImageFile) -> bool {
        self.upload_images([UploadSource::File(file)])
    }

    /// Queues several files or URLs one after another, starting at the caret.
    pub fn upload_images(&self, sources: impl IntoIterator<Item = UploadSource>) -> bool {
        let mut position = UploadPosition::Selection;
        let mut started = false;
        for source in sources {
            match self.insert_upload(source, position) {
                Ok(next) => {
                    position = UploadPosition::At(next);
                    started = true;
                }
                Err(err) => {
                    warn!(error = %err, "failed to start image upload");
                    return false;
                }
            }
        }
        started
    }
}

async fn run_upload(
    config: Rc<UploaderConfig>,
    surface: Surface,
    source: UploadSource,
    upload_id: String,
) -> UploadOutcome {
    let url = match upload(&config, source, &upload_id).await {
        Ok(url) => url,
        Err(err) => {
            // No retry: the placeholder keeps showing until the user removes it.
            warn!(%upload_id, error = %err, "image upload failed");
            return UploadOutcome::Failed;
        }
    };

    let Ok(mut editor) = surface.try_borrow_mut() else {
        warn!(%upload_id, "editor is borrowed; uploaded image not swapped in");
        return UploadOutcome::Failed;
    };
    resolve_placeholders(&mut editor, &upload_id, &url)
}

async fn upload(
    config: &UploaderConfig,
    source: UploadSource,
    upload_id: &str,
) -> Result<String, UploadError> {
    let file = match source {
        UploadSource::File(file) => file,
        UploadSource::Url(url) if url.starts_with("data:") => ImageFile::from_data_url(&url)?,
        UploadSource::Url(url) => config.fetcher.fetch(&url).await?,
    };
    config.uploader.upload(file, upload_id).await
}

/// Replaces every placeholder tagged `upload_id` in the current document with
/// an image pointing at `url`, as one edit kept out of undo history.
pub fn resolve_placeholders(editor: &mut Editor, upload_id: &str, url: &str) -> UploadOutcome {
    let mut ops: Vec<Op> = Vec::new();
    for (path, node) in editor.doc().descendants() {
        let Node::Void(void) = node else {
            continue;
        };
        if MediaKind::of_void(void) != Some(MediaKind::Placeholder)
            || void.attr_str(UPLOAD_ID_ATTR) != Some(upload_id)
        {
            continue;
        }
        ops.push(Op::RemoveNode { path: path.clone() });
        ops.push(Op::InsertNode {
            path,
            node: resolved_image(void, url),
        });
    }

    if ops.is_empty() {
        debug!(%upload_id, "image placeholders gone before upload finished");
        return UploadOutcome::Vanished;
    }

    let replaced = ops.len() / 2;
    let tx = Transaction::new(ops)
        .add_to_history(false)
        .source("image_upload:resolve");
    match editor.apply(tx) {
        Ok(()) => {
            debug!(%upload_id, replaced, "resolved image placeholders");
            UploadOutcome::Resolved { replaced }
        }
        Err(err) => {
            warn!(%upload_id, error = %err, "failed to swap in uploaded image");
            UploadOutcome::Failed
        }
    }
}

/// One edit that clears a non-empty selection and inserts `placeholder` so
/// the caret ends up after it.
fn placeholder_insertion(
    editor: &Editor,
    position: UploadPosition,
    placeholder: Node,
) -> Result<Transaction, UploadError> {
    let (mut ops, caret) = editor
        .delete_selection_ops()
        .map_err(UploadError::Position)?;

    let target = match &position {
        UploadPosition::Selection => caret.clone(),
        UploadPosition::At(point) => point.clone(),
    };
    let (doc, mapped) = editor.preview_ops(&ops, Selection::collapsed(target))?;
    let target = match position {
        UploadPosition::At(point) => {
            point_after_deletion(editor.doc(), editor.selection(), &caret, &point)
                .unwrap_or(mapped.focus)
        }
        UploadPosition::Selection => mapped.focus,
    };
    let point = editor
        .registry()
        .normalize_selection(&doc, &Selection::collapsed(target))
        .focus;

    let inline = editor
        .node_spec(PLACEHOLDER_KIND)
        .is_some_and(|spec| spec.role == NodeRole::Inline);
    let (mut insert_ops, caret) = if inline {
        inline_insertion(&doc, &point, placeholder)?
    } else {
        block_insertion(&doc, &point, placeholder)
    };
    ops.append(&mut insert_ops);

    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(caret))
        .source("image_upload:insert"))
}

/// Where `point` lands once `selection` is deleted, for the points the
/// deletion ops cannot carry: inside the deleted range, or in the part of the
/// last selected block that is joined onto the caret's leaf.
fn point_after_deletion(
    doc: &Document,
    selection: &Selection,
    caret: &Point,
    point: &Point,
) -> Option<Point> {
    if selection.is_collapsed() {
        return None;
    }
    let (start, end) = selection.ordered();
    let key = |p: &Point| (p.path.clone(), p.offset);
    if key(&start) <= key(point) && key(point) <= key(&end) {
        return Some(caret.clone());
    }
    if start.path == end.path {
        return None;
    }

    let (start_leaf, start_block) = start.path.split_last()?;
    let (end_leaf, end_block) = end.path.split_last()?;
    let (point_leaf, point_block) = point.path.split_last()?;
    if point_block != end_block || point_leaf < end_leaf {
        return None;
    }
    if start_block == end_block && point_leaf > end_leaf {
        return None;
    }

    // The end leaf's tail merges into the start leaf when their marks match.
    let joined = match (doc.node(&start.path), doc.node(&end.path)) {
        (Some(Node::Text(a)), Some(Node::Text(b))) => a.marks == b.marks,
        _ => false,
    };
    let mut path = start_block.to_vec();
    if point_leaf == end_leaf {
        let tail = point.offset - end.offset;
        if joined {
            return Some(Point::new(caret.path.clone(), caret.offset + tail));
        }
        path.push(start_leaf + 1);
        return Some(Point::new(path, tail));
    }
    path.push(start_leaf + 1 + (point_leaf - end_leaf) - usize::from(joined));
    Some(Point::new(path, point.offset))
}

/// Splits the text leaf at `point` and puts the placeholder between the halves.
fn inline_insertion(
    doc: &Document,
    point: &Point,
    placeholder: Node,
) -> Result<(Vec<Op>, Point), UploadError> {
    let not_in_text = || UploadError::Position("caret is not in a text node".into());
    let (leaf_ix, block_path) = point.path.split_last().ok_or_else(not_in_text)?;
    let Some(Node::Element(block)) = doc.node(block_path) else {
        return Err(not_in_text());
    };
    let Some(Node::Text(text)) = block.children.get(*leaf_ix) else {
        return Err(not_in_text());
    };

    let cursor = clamp_to_char_boundary(&text.text, point.offset);
    let child = |ix: usize| {
        let mut path = block_path.to_vec();
        path.push(ix);
        path
    };

    let ops = vec![
        Op::RemoveText {
            path: point.path.clone(),
            range: cursor..text.text.len(),
        },
        Op::InsertNode {
            path: child(leaf_ix + 1),
            node: placeholder,
        },
        Op::InsertNode {
            path: child(leaf_ix + 2),
            node: Node::Text(plate_core::TextNode {
                text: text.text[cursor..].to_string(),
                marks: text.marks.clone(),
            }),
        },
    ];
    Ok((ops, Point::new(child(leaf_ix + 2), 0)))
}

/// An empty paragraph at the caret takes the placeholder before it and keeps
/// the caret; otherwise the placeholder and a fresh paragraph go after the
/// caret's block.
fn block_insertion(doc: &Document, point: &Point, placeholder: Node) -> (Vec<Op>, Point) {
    let block_path = point.path.split_last().map(|(_, p)| p).unwrap_or(&[]);

    if doc.node(block_path).is_some_and(is_empty_paragraph) {
        let mut caret_path = block_path.to_vec();
        if let Some(last) = caret_path.last_mut() {
            *last += 1;
        }
        caret_path.push(0);
        let ops = vec![Op::InsertNode {
            path: block_path.to_vec(),
            node: placeholder,
        }];
        return (ops, Point::new(caret_path, 0));
    }

    let slot = doc.slot_after_block(point);
    let mut paragraph_path = slot.clone();
    if let Some(last) = paragraph_path.last_mut() {
        *last += 1;
    }
    let mut caret_path = paragraph_path.clone();
    caret_path.push(0);

    let ops = vec![
        Op::InsertNode {
            path: slot,
            node: placeholder,
        },
        Op::InsertNode {
            path: paragraph_path,
            node: Node::paragraph(""),
        },
    ];
    (ops, Point::new(caret_path, 0))
}

fn is_empty_paragraph(node: &Node) -> bool {
    match node {
        Node::Element(el) if el.kind == "paragraph" => el
            .children
            .iter()
            .all(|child| matches!(child, Node::Text(t) if t.text.is_empty())),
        _ => false,
    }
}
