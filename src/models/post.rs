//! Represents a shared photo or video post.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Filename suffixes classified as video. Matching is case-sensitive.
const VIDEO_SUFFIXES: [&str; 2] = [".mp4", ".mov"];

/// Media classification stored alongside each post.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum FileType {
    Photo,
    Video,
}

impl FileType {
    /// Classify an upload by the suffix of the client-supplied filename.
    ///
    /// Names ending in `.mp4` or `.mov` are videos; everything else is a photo.
    pub fn from_file_name(file_name: &str) -> Self {
        if VIDEO_SUFFIXES
            .iter()
            .any(|suffix| file_name.ends_with(suffix))
        {
            Self::Video
        } else {
            Self::Photo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

/// A single post in the feed.
///
/// `url`, `file_type` and `file_name` describe media that has already been
/// accepted by the media host; rows are only written after that succeeds.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct Post {
    /// Primary key, generated when the post is created.
    pub id: Uuid,

    /// Owning user. Not exposed in API responses.
    #[serde(skip_serializing)]
    pub user_id: Uuid,

    /// Optional caption supplied with the upload.
    pub caption: Option<String>,

    /// Public URL of the media on the host.
    pub url: String,

    /// Photo or video, derived from the uploaded filename.
    pub file_type: FileType,

    /// Name assigned by the media host (not the client-supplied name).
    pub file_name: String,

    /// Creation time; the feed's sort key.
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a post once the media host has accepted the file.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub caption: Option<String>,
    pub url: String,
    pub file_type: FileType,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_and_mov_are_videos() {
        assert_eq!(FileType::from_file_name("cat.mp4"), FileType::Video);
        assert_eq!(FileType::from_file_name("holiday.mov"), FileType::Video);
    }

    #[test]
    fn suffix_match_is_case_sensitive() {
        assert_eq!(FileType::from_file_name("CLIP.MOV"), FileType::Photo);
        assert_eq!(FileType::from_file_name("clip.Mp4"), FileType::Photo);
    }

    #[test]
    fn everything_else_is_a_photo() {
        assert_eq!(FileType::from_file_name("cat.jpg"), FileType::Photo);
        assert_eq!(FileType::from_file_name("movie.mp4.png"), FileType::Photo);
        assert_eq!(FileType::from_file_name("mp4"), FileType::Photo);
        assert_eq!(FileType::from_file_name("archive.webm"), FileType::Photo);
    }

    #[test]
    fn serializes_without_owner() {
        let post = Post {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            caption: Some("hi".into()),
            url: "https://cdn/x".into(),
            file_type: FileType::Video,
            file_name: "x123".into(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&post).unwrap();
        assert!(value.get("user_id").is_none());
        assert_eq!(value["file_type"], "video");
        assert_eq!(value["id"], post.id.to_string());
    }
}
