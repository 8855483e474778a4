//! Core data models for the photo feed.
//!
//! These map to database rows via `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod post;
pub mod user;
