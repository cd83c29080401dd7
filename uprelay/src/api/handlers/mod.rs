//! HTTP request handlers.
//!
//! - [`upload`]: Multipart upload relay to a workspace volume
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] on failure. Errors are rendered as
//! `{"success": false, "error": ...}` JSON bodies with the matching status code.

pub mod upload;
