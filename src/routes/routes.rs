//! Defines routes for the photo feed API.
//!
//! ## Structure
//! - **Status endpoints**
//!   - `GET    /`        — liveness
//!   - `GET    /health`  — health
//!   - `GET    /readyz`  — readiness (SQLite + staging directory)
//!
//! - **Post endpoints**
//!   - `POST   /upload`     — multipart upload (`file`, optional `caption`)
//!   - `GET    /feed`       — all posts, newest first
//!   - `DELETE /post/{id}`  — delete a post by UUID

use crate::{
    handlers::{
        health_handlers::{readyz, server_health, server_live},
        post_handlers::{delete_post, get_feed, upload_post},
    },
    services::post_service::PostService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Build the router carrying `PostService` as shared state.
///
/// `max_upload_bytes` replaces axum's default request body limit on `/upload`
/// so videos are not rejected.
pub fn routes(max_upload_bytes: usize) -> Router<PostService> {
    Router::new()
        .route("/", get(server_live))
        .route("/health", get(server_health))
        .route("/readyz", get(readyz))
        .route(
            "/upload",
            post(upload_post).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/feed", get(get_feed))
        .route("/post/{id}", delete(delete_post))
}
