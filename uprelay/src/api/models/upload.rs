use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};

/// Name used for the destination object when the client sent no filename
pub const DEFAULT_FILE_NAME: &str = "upload";

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully to Databricks";

/// Two-level `catalog/schema` namespace an upload lands in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPath {
    pub catalog: String,
    pub schema: String,
}

impl CatalogPath {
    /// Parse a `catalog/schema` string.
    ///
    /// Only the first two `/`-separated segments are used: `a/b/c` yields catalog `a` and
    /// schema `b`. Both segments must be non-empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = raw.split('/');
        let catalog = segments.next().unwrap_or_default();
        let schema = segments.next().unwrap_or_default();

        if catalog.is_empty() || schema.is_empty() {
            return Err(Error::InvalidCatalogPath);
        }

        Ok(Self {
            catalog: catalog.to_string(),
            schema: schema.to_string(),
        })
    }

    /// Volume path for `file_name` in this namespace.
    ///
    /// Segments are interpolated verbatim: no escaping and no traversal checks.
    pub fn volume_path(&self, file_name: &str) -> String {
        format!("/Volumes/{}/{}/default/{}", self.catalog, self.schema, file_name)
    }
}

/// Successful upload response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool, // Always true
    pub file: UploadedFileSummary,
    pub message: String,
}

impl UploadResponse {
    pub fn new(file: UploadedFileSummary) -> Self {
        Self {
            success: true,
            file,
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
        }
    }
}

/// Where the uploaded file ended up
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadedFileSummary {
    pub name: String,
    /// Full volume path, e.g. `/Volumes/main/raw/default/data.csv`
    pub path: String,
    /// Size in bytes as received from the client
    pub size: u64,
    pub catalog: String,
    pub schema: String,
}

/// Error response body shared by every failure mode
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool, // Always false
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<UpstreamErrorDetails>,
    /// Diagnostic trace, only present when the service runs in development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Diagnostics for a rejected upstream upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamErrorDetails {
    pub status: u16,
    pub status_text: String,
    pub volume_path: String,
}
