use plate_core::ApplyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("[ImageUploader] an `upload` function is required")]
    MissingUploader,
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("failed to fetch remote image {url}: {message}")]
    Fetch { url: String, message: String },
    #[error("invalid data url: {0}")]
    InvalidDataUrl(String),
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("no active editing surface")]
    NoActiveSurface,
    #[error("cannot insert image here: {0}")]
    Position(String),
    #[error("failed to apply edit: {0}")]
    Apply(#[from] ApplyError),
}
