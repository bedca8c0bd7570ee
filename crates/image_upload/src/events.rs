use plate_core::Point;

use crate::file::ImageFile;

pub const HTML_MIME: &str = "text/html";

/// What gets uploaded: local bytes, or a URL to fetch first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    File(ImageFile),
    Url(String),
}

impl UploadSource {
    /// Value stored as the placeholder's `src` while the upload runs.
    pub fn preview_src(&self) -> String {
        match self {
            UploadSource::File(file) => file.to_data_url(),
            UploadSource::Url(url) => url.clone(),
        }
    }
}

impl From<ImageFile> for UploadSource {
    fn from(file: ImageFile) -> Self {
        UploadSource::File(file)
    }
}

impl From<String> for UploadSource {
    fn from(url: String) -> Self {
        UploadSource::Url(url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPosition {
    /// Wherever the caret currently is.
    Selection,
    At(Point),
}

#[derive(Debug, Clone, Default)]
pub struct DropEvent {
    /// Document point under the pointer, resolved by the host view.
    /// `None` when the drop landed outside the document.
    pub position: Option<Point>,
    pub files: Vec<ImageFile>,
}

#[derive(Debug, Clone)]
pub struct ClipboardItem {
    pub mime: String,
    pub file: Option<ImageFile>,
}

impl ClipboardItem {
    pub fn file(file: ImageFile) -> Self {
        Self {
            mime: file.mime.clone(),
            file: Some(file),
        }
    }

    pub fn html() -> Self {
        Self {
            mime: HTML_MIME.to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClipboardData {
    pub items: Vec<ClipboardItem>,
}

impl ClipboardData {
    pub fn new(items: Vec<ClipboardItem>) -> Self {
        Self { items }
    }

    pub fn has_html(&self) -> bool {
        self.items.iter().any(|item| item.mime == HTML_MIME)
    }
}

/// View events after which the uploader rebinds to the surface that fired them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    KeyDown,
    Drop,
    Focus,
}
