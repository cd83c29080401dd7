//! OpenAPI documentation for the upload surface, served at `/openapi.json`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(title = "uprelay", description = "Relay multipart file uploads into workspace volumes"),
    paths(api::handlers::upload::upload_file),
    components(schemas(
        api::models::upload::UploadResponse,
        api::models::upload::UploadedFileSummary,
        api::models::upload::ErrorResponse,
        api::models::upload::UpstreamErrorDetails,
    )),
    tags(
        (name = "upload", description = "File relay to workspace volumes"),
    )
)]
pub struct ApiDoc;
