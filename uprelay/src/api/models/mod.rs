//! Request and response data structures for the upload API.

pub mod upload;
