#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::executor::LocalPool;
use plate_core::{Document, Editor, Node, Point, Selection};
use plate_image_upload::{
    IMAGE_KIND, ImageFile, ImageUploader, RemoteImageFetcher, SRC_ATTR, Surface, UploadError,
    UploadOptions, Uploader, UploaderConfig, placeholder_upload_id, registry,
};
use tracing_subscriber::EnvFilter;

type Reply = oneshot::Sender<Result<String, UploadError>>;

/// Uploader whose calls stay pending until the test settles them by id.
#[derive(Default)]
pub struct ScriptedUploader {
    calls: RefCell<Vec<(String, ImageFile)>>,
    pending: RefCell<HashMap<String, Reply>>,
}

impl ScriptedUploader {
    pub fn calls(&self) -> Vec<(String, ImageFile)> {
        self.calls.borrow().clone()
    }

    pub fn call_ids(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn resolve(&self, upload_id: &str, url: &str) {
        self.settle(upload_id, Ok(url.to_string()));
    }

    pub fn reject(&self, upload_id: &str, message: &str) {
        self.settle(upload_id, Err(UploadError::Rejected(message.to_string())));
    }

    fn settle(&self, upload_id: &str, reply: Result<String, UploadError>) {
        let sender = self
            .pending
            .borrow_mut()
            .remove(upload_id)
            .unwrap_or_else(|| panic!("no pending upload {upload_id}"));
        let _ = sender.send(reply);
    }
}

#[async_trait(?Send)]
impl Uploader for ScriptedUploader {
    async fn upload(&self, file: ImageFile, upload_id: &str) -> Result<String, UploadError> {
        let (tx, rx) = oneshot::channel();
        self.calls.borrow_mut().push((upload_id.to_string(), file));
        self.pending.borrow_mut().insert(upload_id.to_string(), tx);
        match rx.await {
            Ok(reply) => reply,
            Err(_) => Err(UploadError::Rejected("test dropped the upload".to_string())),
        }
    }
}

/// Fetcher that answers every URL with a tiny PNG and remembers what it saw.
#[derive(Default)]
pub struct StubFetcher {
    urls: RefCell<Vec<String>>,
}

impl StubFetcher {
    pub fn urls(&self) -> Vec<String> {
        self.urls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl RemoteImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageFile, UploadError> {
        self.urls.borrow_mut().push(url.to_string());
        Ok(png("remote.png"))
    }
}

pub fn png(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

/// Yields `up-1`, `up-2`, ... so tests can predict upload ids.
pub fn counting_ids() -> impl Fn() -> String + 'static {
    let next = Cell::new(0);
    move || {
        next.set(next.get() + 1);
        format!("up-{}", next.get())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn surface(options: &UploadOptions, children: Vec<Node>, selection: Selection) -> Surface {
    Rc::new(RefCell::new(Editor::new(
        Document::new(children),
        selection,
        registry(options),
    )))
}

pub struct Harness {
    pub pool: LocalPool,
    pub uploader: Rc<ScriptedUploader>,
    pub fetcher: Rc<StubFetcher>,
    pub images: ImageUploader,
    pub surface: Surface,
}

impl Harness {
    /// Block-mode uploader bound to a document, caret at `caret`.
    pub fn new(children: Vec<Node>, caret: Point) -> Self {
        Self::with_options(
            UploadOptions::default(),
            children,
            Selection::collapsed(caret),
        )
    }

    pub fn with_options(options: UploadOptions, children: Vec<Node>, selection: Selection) -> Self {
        init_tracing();
        let pool = LocalPool::new();
        let uploader = Rc::new(ScriptedUploader::default());
        let fetcher = Rc::new(StubFetcher::default());
        let surface = surface(&options, children, selection);

        let config = UploaderConfig::new(options)
            .uploader(uploader.clone())
            .fetcher(fetcher.clone())
            .id_generator(counting_ids());
        let images = ImageUploader::new(config, pool.spawner());
        images.set_active_surface(surface.clone());

        Self {
            pool,
            uploader,
            fetcher,
            images,
            surface,
        }
    }

    /// Drives spawned uploads until each is waiting on the test again.
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn children(&self) -> Vec<Node> {
        self.surface.borrow().doc().children.clone()
    }

    pub fn placeholder_ids(&self) -> Vec<String> {
        placeholder_ids(&self.surface.borrow())
    }

    pub fn image_srcs(&self) -> Vec<String> {
        image_srcs(&self.surface.borrow())
    }
}

pub fn placeholder_ids(editor: &Editor) -> Vec<String> {
    editor
        .doc()
        .descendants()
        .into_iter()
        .filter_map(|(_, node)| placeholder_upload_id(node).map(str::to_string))
        .collect()
}

pub fn image_srcs(editor: &Editor) -> Vec<String> {
    editor
        .doc()
        .descendants()
        .into_iter()
        .filter_map(|(_, node)| match node {
            Node::Void(v) if v.kind == IMAGE_KIND => v.attr_str(SRC_ATTR).map(str::to_string),
            _ => None,
        })
        .collect()
}
