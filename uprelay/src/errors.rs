use crate::api::models::upload::{ErrorResponse, UpstreamErrorDetails};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request used a verb other than POST or OPTIONS
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// One or more of the required form fields is absent or empty
    #[error("Missing required fields: file, workspace_url, databricks_token, or catalog_path")]
    MissingFields,

    /// `catalog_path` is not of the form `catalog/schema`
    #[error("Invalid catalog_path format. Expected: catalog/schema")]
    InvalidCatalogPath,

    /// The Files API answered with a non-success status
    #[error("Databricks upload failed: {status} - {body}")]
    UpstreamUploadFailed {
        status: u16,
        status_text: String,
        body: String,
        volume_path: String,
    },

    /// Form parsing, spool file I/O or transport failure
    #[error(transparent)]
    Unhandled(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::MissingFields | Error::InvalidCatalogPath => StatusCode::BAD_REQUEST,
            Error::UpstreamUploadFailed { .. } | Error::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body
    pub fn user_message(&self) -> String {
        match self {
            // Include the cause chain, e.g. "Failed to read spooled upload: No such file or directory"
            Error::Unhandled(e) => format!("{e:#}"),
            _ => self.to_string(),
        }
    }

    /// Render the error as a JSON response.
    ///
    /// `expose_traces` adds a `stack` field to unhandled errors and is only set in development.
    pub fn into_json_response(self, expose_traces: bool) -> Response {
        match &self {
            Error::Unhandled(_) => {
                tracing::error!("Unhandled error: {:#}", self);
            }
            Error::UpstreamUploadFailed { status, volume_path, .. } => {
                tracing::error!(status, volume_path = %volume_path, "Upstream upload failed");
            }
            Error::MethodNotAllowed | Error::MissingFields | Error::InvalidCatalogPath => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let details = match &self {
            Error::UpstreamUploadFailed {
                status,
                status_text,
                volume_path,
                ..
            } => Some(UpstreamErrorDetails {
                status: *status,
                status_text: status_text.clone(),
                volume_path: volume_path.clone(),
            }),
            _ => None,
        };
        let stack = match &self {
            Error::Unhandled(e) if expose_traces => Some(format!("{e:?}")),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: self.user_message(),
            details,
            stack,
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.into_json_response(false)
    }
}

/// Type alias for relay operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(Error::MissingFields.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InvalidCatalogPath.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Unhandled(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_body() {
        let error = Error::UpstreamUploadFailed {
            status: 403,
            status_text: "Forbidden".to_string(),
            body: "Forbidden".to_string(),
            volume_path: "/Volumes/cat/sch/default/a.txt".to_string(),
        };

        let response = error.into_json_response(false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Databricks upload failed: 403 - Forbidden");
        assert_eq!(body["details"]["status"], 403);
        assert_eq!(body["details"]["statusText"], "Forbidden");
        assert_eq!(body["details"]["volumePath"], "/Volumes/cat/sch/default/a.txt");
    }

    #[tokio::test]
    async fn test_unhandled_trace_only_in_development() {
        let make = || {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))
                .context("Failed to read spooled upload")
                .unwrap_err()
        };

        let body = body_json(Error::Unhandled(make()).into_json_response(false)).await;
        assert_eq!(body["error"], "Failed to read spooled upload: gone");
        assert!(body.get("stack").is_none());

        let body = body_json(Error::Unhandled(make()).into_json_response(true)).await;
        assert!(body["stack"].as_str().unwrap().contains("gone"));
    }
}
