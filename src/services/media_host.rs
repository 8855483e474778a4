//! Client for the external media host (ImageKit).
//!
//! The host stores the bytes and serves them from its CDN; we only keep the
//! returned URL and host-assigned name. Responses are handed back with their
//! HTTP status intact: deciding what a non-200 means is the caller's job.

use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::{io, path::Path, time::Duration};
use thiserror::Error;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Tag attached to every file this service uploads.
pub const UPLOAD_TAG: &str = "Backend-Upload";

#[derive(Debug, Error)]
pub enum MediaHostError {
    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MediaHostResult<T> = Result<T, MediaHostError>;

/// Options sent with each upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Ask the host to suffix the stored name so uploads never collide.
    pub use_unique_file_name: bool,
    pub tags: Vec<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            use_unique_file_name: true,
            tags: vec![UPLOAD_TAG.to_string()],
        }
    }
}

/// What the host reported for an upload.
///
/// On non-2xx responses `url`, `name` and `file_id` are usually empty and
/// `message` carries the host's explanation.
#[derive(Debug, Clone, Default)]
pub struct UploadedMedia {
    pub status: u16,
    pub url: String,
    pub name: String,
    pub file_id: String,
    pub message: Option<String>,
}

/// Port to the media host so handlers can be exercised without the network.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Upload the file at `path`, presenting it to the host as `file_name`.
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        options: &UploadOptions,
    ) -> MediaHostResult<UploadedMedia>;

    /// Delete a previously uploaded file by its host id.
    async fn delete(&self, file_id: &str) -> MediaHostResult<()>;
}

/// Settings for [`ImageKitClient`].
#[derive(Debug, Clone)]
pub struct ImageKitConfig {
    pub private_key: String,
    pub upload_url: String,
    pub api_url: String,
    pub timeout: Duration,
}

/// ImageKit REST client. Authenticates with the private key as the basic-auth user.
pub struct ImageKitClient {
    http: Client,
    private_key: String,
    upload_url: String,
    api_url: String,
}

/// Subset of the ImageKit upload response we care about. Error responses
/// only carry `message`, so everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageKitUploadResponse {
    #[serde(default)]
    file_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    message: Option<String>,
}

impl ImageKitClient {
    pub fn new(cfg: ImageKitConfig) -> MediaHostResult<Self> {
        let http = Client::builder().timeout(cfg.timeout).build()?;

        tracing::info!(upload_url = %cfg.upload_url, "ImageKit client initialized");

        Ok(Self {
            http,
            private_key: cfg.private_key,
            upload_url: cfg.upload_url,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaHost for ImageKitClient {
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        options: &UploadOptions,
    ) -> MediaHostResult<UploadedMedia> {
        let file = File::open(path).await?;
        let length = file.metadata().await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, length).file_name(file_name.to_string());

        let form = Form::new()
            .part("file", part)
            .text("fileName", file_name.to_string())
            .text("useUniqueFileName", options.use_unique_file_name.to_string())
            .text("tags", options.tags.join(","));

        let response = self
            .http
            .post(&self.upload_url)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let raw = response.text().await?;
        let parsed = serde_json::from_str::<ImageKitUploadResponse>(&raw).unwrap_or_else(|err| {
            tracing::debug!(status, "unparseable ImageKit upload response: {}", err);
            ImageKitUploadResponse {
                message: Some(raw.clone()),
                ..Default::default()
            }
        });

        tracing::debug!(status, name = %parsed.name, "ImageKit upload finished");

        Ok(UploadedMedia {
            status,
            url: parsed.url,
            name: parsed.name,
            file_id: parsed.file_id,
            message: parsed.message,
        })
    }

    async fn delete(&self, file_id: &str) -> MediaHostResult<()> {
        let url = format!("{}/files/{}", self.api_url, file_id);
        let response = self
            .http
            .delete(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(MediaHostError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_request_unique_name_and_tag() {
        let opts = UploadOptions::default();
        assert!(opts.use_unique_file_name);
        assert_eq!(opts.tags, vec!["Backend-Upload".to_string()]);
    }

    #[test]
    fn parses_success_response() {
        let raw = r#"{
            "fileId": "598821f949c0a938d57563bd",
            "name": "cat_x123.jpg",
            "url": "https://ik.imagekit.io/demo/cat_x123.jpg",
            "fileType": "image",
            "size": 83622
        }"#;
        let parsed: ImageKitUploadResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.file_id, "598821f949c0a938d57563bd");
        assert_eq!(parsed.name, "cat_x123.jpg");
        assert_eq!(parsed.url, "https://ik.imagekit.io/demo/cat_x123.jpg");
        assert!(parsed.message.is_none());
    }

    #[test]
    fn parses_error_response() {
        let raw = r#"{"message": "Your account cannot be authenticated.", "help": "..."}"#;
        let parsed: ImageKitUploadResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.url.is_empty());
        assert_eq!(
            parsed.message.as_deref(),
            Some("Your account cannot be authenticated.")
        );
    }

    #[test]
    fn trims_trailing_slash_from_api_url() {
        let client = ImageKitClient::new(ImageKitConfig {
            private_key: "private_key".into(),
            upload_url: "https://upload.imagekit.io/api/v1/files/upload".into(),
            api_url: "https://api.imagekit.io/v1/".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(client.api_url, "https://api.imagekit.io/v1");
    }
}
