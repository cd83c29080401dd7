use crate::AppState;
use crate::api::models::upload::{
    CatalogPath, DEFAULT_FILE_NAME, ErrorResponse, UploadResponse, UploadedFileSummary,
};
use crate::errors::{Error, Result};
use crate::form::parse_form;
use crate::upstream::VolumeUpload;
use anyhow::Context;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Destination object name: the client's filename, or `upload` when it sent none
pub fn destination_file_name(original_filename: Option<&str>) -> &str {
    original_filename.filter(|name| !name.is_empty()).unwrap_or(DEFAULT_FILE_NAME)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/upload-to-databricks",
    tag = "upload",
    summary = "Upload file to a volume",
    description = "Relay a single file into `/Volumes/{catalog}/{schema}/default/` of the given workspace.
Any path other than `/healthz` and `/openapi.json` behaves the same way.",
    request_body(
        content_type = "multipart/form-data",
        description = "Fields: `file` (binary), `workspace_url`, `databricks_token`, `catalog_path` (`catalog/schema`)"
    ),
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "Missing fields or malformed catalog_path", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 500, description = "Upstream rejected the upload or the request could not be processed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_file(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Response {
    let result = match multipart {
        Ok(multipart) => relay_upload(&state, multipart).await,
        Err(rejection) => Err(Error::Unhandled(anyhow::anyhow!(
            "Failed to parse multipart data: {}",
            rejection.body_text()
        ))),
    };

    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => e.into_json_response(state.config.expose_error_traces()),
    }
}

/// Answers every method on the upload surface other than POST (OPTIONS never gets here)
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}

async fn relay_upload(state: &AppState, multipart: Multipart) -> Result<UploadResponse> {
    let mut form = parse_form(multipart, state.config.upload.spool_dir.as_deref()).await?;

    let file = form.take_file("file");
    let workspace_url = non_empty(form.take_field("workspace_url"));
    let token = non_empty(form.take_field("databricks_token"));
    let catalog_path = non_empty(form.take_field("catalog_path"));

    let (Some(file), Some(workspace_url), Some(token), Some(catalog_path)) = (file, workspace_url, token, catalog_path) else {
        return Err(Error::MissingFields);
    };

    let namespace = CatalogPath::parse(&catalog_path)?;

    let content = tokio::fs::read(&file.path).await.context("Failed to read uploaded file")?;

    let file_name = destination_file_name(file.original_filename.as_deref()).to_string();
    let volume_path = namespace.volume_path(&file_name);

    let response = state
        .uploader
        .put_file(VolumeUpload {
            workspace_url: &workspace_url,
            token: &token,
            volume_path: &volume_path,
            content,
        })
        .await?;

    if !response.is_success() {
        return Err(Error::UpstreamUploadFailed {
            status: response.status,
            status_text: response.status_text,
            body: response.body,
            volume_path,
        });
    }

    tracing::info!(volume_path = %volume_path, size = file.size, "File uploaded");

    Ok(UploadResponse::new(UploadedFileSummary {
        name: file_name,
        path: volume_path,
        size: file.size,
        catalog: namespace.catalog,
        schema: namespace.schema,
    }))
}
