//! Business operations behind the HTTP handlers.
//!
//! Operations take the shared [`AppState`](crate::state::AppState) and
//! return domain values or an [`ApiError`](crate::error::ApiError); they
//! know nothing about requests, headers or status codes.

pub mod catalog;
pub mod dashboard;
pub mod fuel;
pub mod processing;
