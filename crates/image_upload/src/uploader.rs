use async_trait::async_trait;

use crate::error::UploadError;
use crate::file::ImageFile;

/// Host-supplied transport that stores an image and returns its final URL.
///
/// Everything runs on the editor's UI thread, so implementations need not be `Send`.
#[async_trait(?Send)]
pub trait Uploader {
    async fn upload(&self, file: ImageFile, upload_id: &str) -> Result<String, UploadError>;
}

/// Turns a remote image URL into bytes that can be re-uploaded.
#[async_trait(?Send)]
pub trait RemoteImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageFile, UploadError>;
}

/// Fallback used when the host never configured an uploader.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingUploader;

#[async_trait(?Send)]
impl Uploader for MissingUploader {
    async fn upload(&self, _file: ImageFile, _upload_id: &str) -> Result<String, UploadError> {
        Err(UploadError::MissingUploader)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedFetcher;

#[async_trait(?Send)]
impl RemoteImageFetcher for UnsupportedFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageFile, UploadError> {
        Err(UploadError::Fetch {
            url: url.to_string(),
            message: "no remote image fetcher configured".to_string(),
        })
    }
}
