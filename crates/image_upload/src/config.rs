use std::rc::Rc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::uploader::{MissingUploader, RemoteImageFetcher, UnsupportedFetcher, Uploader};

pub const DEFAULT_ACCEPT_MIMES: [&str; 4] = ["image/jpeg", "image/gif", "image/png", "image/jpg"];

const UPLOAD_ID_LEN: usize = 6;
const UPLOAD_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn default_accept_mimes() -> Vec<String> {
    DEFAULT_ACCEPT_MIMES.iter().map(|m| m.to_string()).collect()
}

/// Serializable part of the plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// MIME types picked up from drops and clipboard items.
    #[serde(default = "default_accept_mimes")]
    pub accept_mimes: Vec<String>,
    /// Register the placeholder as an inline node instead of a block.
    #[serde(default)]
    pub inline: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            accept_mimes: default_accept_mimes(),
            inline: false,
        }
    }
}

impl UploadOptions {
    pub fn accepts(&self, mime: &str) -> bool {
        self.accept_mimes.iter().any(|m| m.eq_ignore_ascii_case(mime))
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

pub type IdGenerator = Rc<dyn Fn() -> String>;

/// Short random correlation id, e.g. `k3x9qa`.
pub fn random_upload_id() -> String {
    let mut rng = rand::thread_rng();
    (0..UPLOAD_ID_LEN)
        .map(|_| UPLOAD_ID_ALPHABET[rng.gen_range(0..UPLOAD_ID_ALPHABET.len())] as char)
        .collect()
}

pub struct UploaderConfig {
    pub options: UploadOptions,
    pub uploader: Rc<dyn Uploader>,
    pub fetcher: Rc<dyn RemoteImageFetcher>,
    pub id_generator: IdGenerator,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            options: UploadOptions::default(),
            uploader: Rc::new(MissingUploader),
            fetcher: Rc::new(UnsupportedFetcher),
            id_generator: Rc::new(random_upload_id),
        }
    }
}

impl UploaderConfig {
    pub fn new(options: UploadOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn uploader(mut self, uploader: Rc<dyn Uploader>) -> Self {
        self.uploader = uploader;
        self
    }

    pub fn fetcher(mut self, fetcher: Rc<dyn RemoteImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn id_generator(mut self, id_generator: impl Fn() -> String + 'static) -> Self {
        self.id_generator = Rc::new(id_generator);
        self
    }

    pub(crate) fn next_upload_id(&self) -> String {
        (self.id_generator)()
    }
}
