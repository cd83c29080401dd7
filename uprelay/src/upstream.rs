//! Client for the workspace Files API.

use crate::config::UpstreamConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    Client,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tracing::instrument;

/// Path prefix of the Files API on a workspace host
pub const FILES_API_PREFIX: &str = "/api/2.0/fs/files";

/// Build the Files API URL for `volume_path` on `workspace_url`.
///
/// Plain concatenation: `workspace_url` is expected without a trailing slash.
pub fn files_api_url(workspace_url: &str, volume_path: &str) -> String {
    format!("{workspace_url}{FILES_API_PREFIX}{volume_path}")
}

/// One object to write into a volume
pub struct VolumeUpload<'a> {
    pub workspace_url: &'a str,
    pub token: &'a str,
    pub volume_path: &'a str,
    pub content: Vec<u8>,
}

// Hand-written so the token never ends up in logs
impl std::fmt::Debug for VolumeUpload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeUpload")
            .field("workspace_url", &self.workspace_url)
            .field("volume_path", &self.volume_path)
            .field("content_len", &self.content.len())
            .finish_non_exhaustive()
    }
}

/// What the Files API answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, empty when unknown
    pub status_text: String,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A trait for writing files into workspace volumes.
/// In practice this is a single HTTP PUT against the Files API, see `FilesApiReqwest`.
#[async_trait]
pub trait VolumeUploader: Send + Sync {
    /// Send the upload. Transport failures are errors; any HTTP status is a response.
    async fn put_file(&self, upload: VolumeUpload<'_>) -> anyhow::Result<UpstreamResponse>;
}

/// The concrete implementation of `VolumeUploader`.
#[derive(Debug, Clone)]
pub struct FilesApiReqwest {
    client: Client,
}

impl FilesApiReqwest {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        let client = builder.build().context("Failed to create Files API HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl VolumeUploader for FilesApiReqwest {
    #[instrument(skip_all, fields(volume_path = %upload.volume_path, bytes = upload.content.len()), err)]
    async fn put_file(&self, upload: VolumeUpload<'_>) -> anyhow::Result<UpstreamResponse> {
        let url = files_api_url(upload.workspace_url, upload.volume_path);
        tracing::info!("Uploading to: {}", url);

        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, format!("Bearer {}", upload.token))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(upload.content)
            .send()
            .await
            .context("Failed to send upload request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read upload response body")?;

        Ok(UpstreamResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
