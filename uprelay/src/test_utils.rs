//! Test utilities shared by handler tests.

use crate::config::Config;
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};

pub const TEST_TOKEN: &str = "dapi-test-token";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..Default::default()
    }
}

/// Build the full router for `config` and wrap it in a test server
pub fn create_test_app(config: Config) -> TestServer {
    crate::install_crypto_provider();

    let app = crate::Application::new(config).expect("Failed to create application");
    app.into_test_server()
}

/// A complete upload form targeting `workspace_url`
pub fn upload_form(workspace_url: &str, catalog_path: &str, file_name: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .add_part("file", Part::bytes(content.to_vec()).file_name(file_name.to_string()))
        .add_text("workspace_url", workspace_url.to_string())
        .add_text("databricks_token", TEST_TOKEN)
        .add_text("catalog_path", catalog_path.to_string())
}
