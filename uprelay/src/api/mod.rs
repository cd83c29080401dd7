//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! The relay exposes a single upload surface: any path except `/healthz` and `/openapi.json`
//! accepts `POST` multipart uploads (and `OPTIONS` preflights). Everything else on that surface
//! answers `405`.

pub mod handlers;
pub mod models;
