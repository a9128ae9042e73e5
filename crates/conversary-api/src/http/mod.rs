//! HTTP/REST API layer for Conversary.
//!
//! Axum-based REST API at `/api/` with envelope response format and CORS
//! support.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
