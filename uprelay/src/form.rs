//! Multipart form parsing with on-disk spooling for file parts.
//!
//! File parts are streamed chunk by chunk into temporary files so request bodies never have to
//! be buffered whole while parsing. The temporary files are removed when the [`UploadedFile`]
//! holding them is dropped, which happens once the response has been produced.

use anyhow::Context;
use axum::extract::Multipart;
use std::{collections::HashMap, path::Path};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

/// A form value that appeared once or several times under the same name.
#[derive(Debug)]
pub enum FormValue<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> FormValue<T> {
    /// Collapse to a single value, taking the first occurrence of a repeated field.
    pub fn first_or_self(self) -> Option<T> {
        match self {
            FormValue::One(value) => Some(value),
            FormValue::Many(values) => values.into_iter().next(),
        }
    }

    fn push(self, value: T) -> Self {
        match self {
            FormValue::One(first) => FormValue::Many(vec![first, value]),
            FormValue::Many(mut values) => {
                values.push(value);
                FormValue::Many(values)
            }
        }
    }
}

/// A file part spooled to disk.
#[derive(Debug)]
pub struct UploadedFile {
    /// Location of the spooled content. The file is deleted when this is dropped.
    pub path: TempPath,
    /// Filename the client sent, if any
    pub original_filename: Option<String>,
    pub content_type: Option<String>,
    /// Bytes written to the spool file
    pub size: u64,
}

/// Parsed multipart body: text fields and file parts keyed by field name.
#[derive(Debug, Default)]
pub struct ParsedForm {
    pub fields: HashMap<String, FormValue<String>>,
    pub files: HashMap<String, FormValue<UploadedFile>>,
}

impl ParsedForm {
    /// Take a text field, normalized to its first occurrence
    pub fn take_field(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name).and_then(FormValue::first_or_self)
    }

    /// Take a file part, normalized to its first occurrence
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).and_then(FormValue::first_or_self)
    }
}

fn insert<T>(map: &mut HashMap<String, FormValue<T>>, name: String, value: T) {
    let entry = match map.remove(&name) {
        Some(existing) => existing.push(value),
        None => FormValue::One(value),
    };
    map.insert(name, entry);
}

/// Parse a multipart body, spooling file parts into `spool_dir` (or the system temp dir).
///
/// A part is treated as a file when its content disposition carries a `filename` parameter,
/// even an empty one. Everything else is read as UTF-8 text.
pub async fn parse_form(mut multipart: Multipart, spool_dir: Option<&Path>) -> anyhow::Result<ParsedForm> {
    let mut form = ParsedForm::default();

    while let Some(mut field) = multipart.next_field().await.context("Failed to parse multipart data")? {
        let name = field.name().unwrap_or_default().to_string();
        let original_filename = field.file_name().map(str::to_string);

        if original_filename.is_none() {
            let value = field
                .text()
                .await
                .with_context(|| format!("Failed to read form field '{name}'"))?;
            insert(&mut form.fields, name, value);
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let spool = match spool_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .context("Failed to create spool file")?;

        let mut writer = tokio::fs::File::from_std(spool.reopen().context("Failed to open spool file")?);
        let mut size = 0u64;
        while let Some(chunk) = field
            .chunk()
            .await
            .with_context(|| format!("Failed to read file part '{name}'"))?
        {
            size += chunk.len() as u64;
            writer.write_all(&chunk).await.context("Failed to write spool file")?;
        }
        writer.flush().await.context("Failed to write spool file")?;

        tracing::debug!(field = %name, filename = ?original_filename, size, "Spooled file part");

        insert(
            &mut form.files,
            name,
            UploadedFile {
                path: spool.into_temp_path(),
                original_filename,
                content_type,
                size,
            },
        );
    }

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, extract::Multipart, routing::post};
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };

    #[test]
    fn test_first_or_self() {
        assert_eq!(FormValue::One("a").first_or_self(), Some("a"));
        assert_eq!(FormValue::Many(vec!["a", "b"]).first_or_self(), Some("a"));
        assert_eq!(FormValue::<&str>::Many(vec![]).first_or_self(), None);
    }

    #[test]
    fn test_repeated_names_accumulate() {
        let mut map = HashMap::new();
        insert(&mut map, "k".to_string(), 1);
        assert!(matches!(map.get("k"), Some(FormValue::One(1))));

        insert(&mut map, "k".to_string(), 2);
        insert(&mut map, "k".to_string(), 3);
        match map.remove("k") {
            Some(FormValue::Many(values)) => assert_eq!(values, vec![1, 2, 3]),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    /// Echo what the parser saw so the tests can inspect it through a real multipart body
    async fn describe_form(multipart: Multipart) -> String {
        let mut form = parse_form(multipart, None).await.unwrap();
        let note = form.take_field("note").unwrap_or_default();
        let file = form.take_file("file").unwrap();
        let content = tokio::fs::read(&file.path).await.unwrap();

        format!(
            "{note}|{}|{}|{}",
            file.original_filename.unwrap_or_default(),
            file.size,
            String::from_utf8(content).unwrap()
        )
    }

    fn server() -> TestServer {
        TestServer::new(Router::new().route("/", post(describe_form))).unwrap()
    }

    #[tokio::test]
    async fn test_parse_form_spools_file() {
        let response = server()
            .post("/")
            .multipart(
                MultipartForm::new()
                    .add_text("note", "first")
                    .add_text("note", "second")
                    .add_part("file", Part::bytes(b"hello world".as_slice()).file_name("greeting.txt")),
            )
            .await;

        response.assert_status_ok();
        response.assert_text("first|greeting.txt|11|hello world");
    }

    async fn describe_file_field(multipart: Multipart) -> String {
        let mut form = parse_form(multipart, None).await.unwrap();
        format!("{}|{:?}", form.take_file("file").is_some(), form.take_field("file"))
    }

    #[tokio::test]
    async fn test_part_without_filename_is_text() {
        let server = TestServer::new(Router::new().route("/", post(describe_file_field))).unwrap();
        let response = server
            .post("/")
            .multipart(MultipartForm::new().add_part("file", Part::text("not a file")))
            .await;

        response.assert_status_ok();
        response.assert_text("false|Some(\"not a file\")");
    }

    #[tokio::test]
    async fn test_spool_file_removed_on_drop() {
        let spool = NamedTempFile::new().unwrap();
        let file = UploadedFile {
            path: spool.into_temp_path(),
            original_filename: None,
            content_type: None,
            size: 0,
        };
        let location = file.path.to_path_buf();
        assert!(location.exists());

        drop(file);
        assert!(!location.exists());
    }
}
