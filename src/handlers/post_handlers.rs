//! HTTP handlers for uploading, listing and deleting posts.
//! Upload bodies are streamed to a staging file rather than buffered, and
//! everything past request parsing is delegated to `PostService`.

use crate::{
    errors::AppError,
    models::post::Post,
    services::{post_service::PostService, staging::StagedFile},
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use futures::StreamExt;
use serde::Serialize;
use std::io;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST `/upload` — multipart with a `file` part and an optional `caption`
/// (stored as an empty string when absent).
///
/// The staged copy of the file is removed before returning, on success and on
/// every error path.
pub async fn upload_post(
    State(service): State<PostService>,
    mut multipart: Multipart,
) -> Result<Json<Post>, AppError> {
    let mut staged: Option<StagedFile> = None;
    let mut caption = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::bad_request("`file` part has no filename"))?;

                let body = field
                    .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
                staged = Some(service.stage_upload(&original_name, body).await?);
            }
            Some("caption") => caption = field.text().await?,
            other => tracing::debug!("ignoring multipart field {:?}", other),
        }
    }

    let staged = staged.ok_or_else(|| AppError::bad_request("missing `file` field"))?;
    let result = service.publish(&staged, Some(caption)).await;
    staged.discard();

    Ok(Json(result?))
}

/// GET `/feed` — every post, newest first.
pub async fn get_feed(State(service): State<PostService>) -> Result<Json<FeedResponse>, AppError> {
    let posts = service.list_feed().await?;
    Ok(Json(FeedResponse { posts }))
}

/// DELETE `/post/{id}`
pub async fn delete_post(
    State(service): State<PostService>,
    Path(post_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = Uuid::parse_str(&post_id)
        .map_err(|_| AppError::bad_request("Invalid post ID format"))?;

    service.delete_post(id).await?;

    Ok(Json(MessageResponse {
        message: "Post deleted successfully".into(),
    }))
}
