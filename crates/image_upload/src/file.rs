use std::fmt;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::UploadError;

/// Raw image bytes on their way to the uploader.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Reads a file from disk, guessing its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, mime, bytes })
    }

    /// Decodes a base64 `data:` URL such as `data:image/png;base64,...`.
    pub fn from_data_url(url: &str) -> Result<Self, UploadError> {
        let invalid = || UploadError::InvalidDataUrl(truncate(url));
        let (header, payload) = url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(invalid)?;

        let mut params = header.split(';');
        let mime = params.next().filter(|m| !m.is_empty()).ok_or_else(invalid)?;
        if !params.any(|p| p == "base64") {
            return Err(invalid());
        }
        let bytes = BASE64.decode(payload.trim()).map_err(|_| invalid())?;

        let suffix = mime.split_once('/').map(|(_, s)| s).unwrap_or("bin");
        Ok(Self {
            name: format!("pasted-image.{suffix}"),
            mime: mime.to_string(),
            bytes,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn truncate(url: &str) -> String {
    const MAX: usize = 48;
    match url.char_indices().nth(MAX) {
        Some((ix, _)) => format!("{}...", &url[..ix]),
        None => url.to_string(),
    }
}
