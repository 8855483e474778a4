//! PostService: publishes staged uploads through the media host and keeps
//! post metadata in SQLite.
//!
//! A post row is only written after the host has accepted the file with a 200.
//! If the row cannot be written afterwards, the hosted file is deleted again
//! on a best-effort basis so it does not linger unreferenced.

use crate::{
    models::{
        post::{FileType, NewPost, Post},
        user::User,
    },
    services::{
        media_host::{MediaHost, MediaHostError, UploadOptions, UploadedMedia},
        staging::{self, StagedFile},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use sqlx::SqlitePool;
use std::{io, path::PathBuf, sync::Arc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PostError {
    #[error("post `{0}` not found")]
    NotFound(Uuid),
    #[error("media host rejected upload with status {status}: {message}")]
    UpstreamRejected { status: u16, message: String },
    #[error(transparent)]
    MediaHost(#[from] MediaHostError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type PostResult<T> = Result<T, PostError>;

/// Shared handle passed to every handler as axum state.
#[derive(Clone)]
pub struct PostService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,

    /// External media host uploads are forwarded to.
    pub media: Arc<dyn MediaHost>,

    /// Directory where uploads are staged before forwarding.
    pub staging_dir: PathBuf,

    /// User new posts are attributed to.
    pub owner_id: Uuid,
}

const POST_COLUMNS: &str = "id, user_id, caption, url, file_type, file_name, created_at";

impl PostService {
    pub fn new(
        db: Arc<SqlitePool>,
        media: Arc<dyn MediaHost>,
        staging_dir: impl Into<PathBuf>,
        owner_id: Uuid,
    ) -> Self {
        Self {
            db,
            media,
            staging_dir: staging_dir.into(),
            owner_id,
        }
    }

    /// Stage an incoming upload body in the staging directory.
    pub async fn stage_upload<S>(&self, original_name: &str, body: S) -> PostResult<StagedFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        Ok(staging::stage_stream(&self.staging_dir, original_name, body).await?)
    }

    /// Forward a staged file to the media host and record the resulting post.
    ///
    /// Returns `UpstreamRejected` when the host answers with anything but 200,
    /// or with a 200 that carries no url or name; no row is written in either case.
    pub async fn publish(&self, staged: &StagedFile, caption: Option<String>) -> PostResult<Post> {
        let uploaded = self
            .media
            .upload(
                staged.path(),
                staged.original_name(),
                &UploadOptions::default(),
            )
            .await?;

        if uploaded.status != 200 {
            warn!(
                status = uploaded.status,
                file = staged.original_name(),
                "media host did not accept upload"
            );
            return Err(PostError::UpstreamRejected {
                status: uploaded.status,
                message: uploaded
                    .message
                    .unwrap_or_else(|| "no message from media host".into()),
            });
        }

        if uploaded.url.is_empty() || uploaded.name.is_empty() {
            warn!(
                file = staged.original_name(),
                "media host answered 200 without a url or name"
            );
            self.release_orphan(&uploaded).await;
            return Err(PostError::UpstreamRejected {
                status: uploaded.status,
                message: "media host response is missing the file url or name".into(),
            });
        }

        let new_post = NewPost {
            user_id: self.owner_id,
            caption,
            url: uploaded.url.clone(),
            file_type: FileType::from_file_name(staged.original_name()),
            file_name: uploaded.name.clone(),
        };

        match self.insert_post(new_post).await {
            Ok(post) => {
                info!(
                    post_id = %post.id,
                    file_type = post.file_type.as_str(),
                    size_bytes = staged.size_bytes(),
                    "post created"
                );
                Ok(post)
            }
            Err(err) => {
                self.release_orphan(&uploaded).await;
                Err(err)
            }
        }
    }

    /// Insert a post inside its own transaction and return the stored row.
    pub async fn insert_post(&self, new_post: NewPost) -> PostResult<Post> {
        let mut tx = self.db.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_post.user_id)
        .bind(new_post.caption)
        .bind(new_post.url)
        .bind(new_post.file_type)
        .bind(new_post.file_name)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(post)
    }

    /// All posts, newest first. Rows created within the same timestamp keep
    /// insertion order (latest first).
    pub async fn list_feed(&self) -> PostResult<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&*self.db)
        .await?;

        debug!("feed loaded {} posts", posts.len());
        Ok(posts)
    }

    /// Delete a post by id. Returns `NotFound` if no such row exists.
    pub async fn delete_post(&self, id: Uuid) -> PostResult<()> {
        let mut tx = self.db.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(PostError::NotFound(id));
        }

        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(post_id = %id, "post deleted");
        Ok(())
    }

    /// Find or create the user that owns uploaded posts.
    ///
    /// The seeded account has no usable password.
    pub async fn ensure_owner(db: &SqlitePool, email: &str) -> PostResult<User> {
        let mut tx = db.begin().await?;

        let existing = sqlx::query_as::<_, User>(
            r#"SELECT id, email, hashed_password, is_active, is_superuser, is_verified
               FROM "user" WHERE email = ?"#,
        )
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(user) = existing {
            return Ok(user);
        }

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO "user" (id, email, hashed_password, is_active, is_superuser, is_verified)
               VALUES (?, ?, '', 1, 0, 0)
               RETURNING id, email, hashed_password, is_active, is_superuser, is_verified"#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(user_id = %user.id, "created owner account {}", email);
        Ok(user)
    }

    async fn release_orphan(&self, uploaded: &UploadedMedia) {
        if uploaded.file_id.is_empty() {
            warn!(
                name = %uploaded.name,
                "media host returned no file id; hosted file left in place"
            );
            return;
        }

        match self.media.delete(&uploaded.file_id).await {
            Ok(()) => info!(file_id = %uploaded.file_id, "removed orphaned hosted file"),
            Err(err) => warn!(
                file_id = %uploaded.file_id,
                "failed to remove orphaned hosted file: {}", err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{database, media_host::MediaHostResult};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::{path::Path, sync::Mutex};

    #[derive(Default)]
    struct StubHost {
        status: u16,
        empty_body: bool,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaHost for StubHost {
        async fn upload(
            &self,
            path: &Path,
            _file_name: &str,
            _options: &UploadOptions,
        ) -> MediaHostResult<UploadedMedia> {
            assert!(path.exists(), "staged file must exist during upload");
            if self.empty_body {
                return Ok(UploadedMedia {
                    status: self.status,
                    file_id: "file-1".into(),
                    ..Default::default()
                });
            }
            Ok(UploadedMedia {
                status: self.status,
                url: "https://cdn/x".into(),
                name: "x123".into(),
                file_id: "file-1".into(),
                message: None,
            })
        }

        async fn delete(&self, file_id: &str) -> MediaHostResult<()> {
            self.deleted.lock().unwrap().push(file_id.to_string());
            Ok(())
        }
    }

    async fn service(host: Arc<StubHost>, staging_dir: &Path) -> PostService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        database::run_migrations(&pool).await.unwrap();
        let owner = PostService::ensure_owner(&pool, "owner@localhost")
            .await
            .unwrap();
        PostService::new(Arc::new(pool), host, staging_dir, owner.id)
    }

    async fn staged(service: &PostService, name: &str) -> StagedFile {
        let body = futures::stream::iter(vec![Ok(Bytes::from_static(b"bytes"))]);
        service.stage_upload(name, body).await.unwrap()
    }

    async fn count_posts(service: &PostService) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&*service.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn publish_records_host_url_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost {
            status: 200,
            ..Default::default()
        });
        let service = service(host, dir.path()).await;

        let file = staged(&service, "cat.mp4").await;
        let post = service.publish(&file, Some("hi".into())).await.unwrap();

        assert_eq!(post.file_type, FileType::Video);
        assert_eq!(post.url, "https://cdn/x");
        assert_eq!(post.file_name, "x123");
        assert_eq!(post.caption.as_deref(), Some("hi"));
        assert_eq!(post.user_id, service.owner_id);
        assert_eq!(count_posts(&service).await, 1);
    }

    #[tokio::test]
    async fn non_200_is_rejected_without_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost {
            status: 401,
            ..Default::default()
        });
        let service = service(host, dir.path()).await;

        let file = staged(&service, "cat.jpg").await;
        let err = service.publish(&file, None).await.unwrap_err();

        assert!(matches!(err, PostError::UpstreamRejected { status: 401, .. }));
        assert_eq!(count_posts(&service).await, 0);
    }

    #[tokio::test]
    async fn ok_status_without_url_is_rejected_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost {
            status: 200,
            empty_body: true,
            ..Default::default()
        });
        let service = service(host.clone(), dir.path()).await;

        let file = staged(&service, "cat.jpg").await;
        let err = service.publish(&file, None).await.unwrap_err();

        assert!(matches!(err, PostError::UpstreamRejected { status: 200, .. }));
        assert_eq!(count_posts(&service).await, 0);
        assert_eq!(*host.deleted.lock().unwrap(), vec!["file-1".to_string()]);
    }

    #[tokio::test]
    async fn failed_insert_deletes_hosted_file() {
        let dir = tempfile::tempdir().unwrap();
        let host = Arc::new(StubHost {
            status: 200,
            ..Default::default()
        });
        let service = service(host.clone(), dir.path()).await;
        sqlx::query("DROP TABLE posts")
            .execute(&*service.db)
            .await
            .unwrap();

        let file = staged(&service, "cat.jpg").await;
        let err = service.publish(&file, None).await.unwrap_err();

        assert!(matches!(err, PostError::Sqlx(_)));
        assert_eq!(*host.deleted.lock().unwrap(), vec!["file-1".to_string()]);
    }

    #[tokio::test]
    async fn feed_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(StubHost::default()), dir.path()).await;

        let base = Utc::now();
        for (offset, caption) in [(1, "t1"), (3, "t3"), (2, "t2")] {
            sqlx::query(
                "INSERT INTO posts (id, user_id, caption, url, file_type, file_name, created_at)
                 VALUES (?, ?, ?, 'https://cdn/x', 'photo', 'x', ?)",
            )
            .bind(Uuid::new_v4())
            .bind(service.owner_id)
            .bind(caption)
            .bind(base + Duration::seconds(offset))
            .execute(&*service.db)
            .await
            .unwrap();
        }

        let captions: Vec<String> = service
            .list_feed()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|p| p.caption)
            .collect();
        assert_eq!(captions, vec!["t3", "t2", "t1"]);
    }

    #[tokio::test]
    async fn delete_missing_post_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(StubHost::default()), dir.path()).await;

        let id = Uuid::new_v4();
        let err = service.delete_post(id).await.unwrap_err();
        assert!(matches!(err, PostError::NotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn ensure_owner_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(Arc::new(StubHost::default()), dir.path()).await;

        let again = PostService::ensure_owner(&service.db, "owner@localhost")
            .await
            .unwrap();
        assert_eq!(again.id, service.owner_id);

        let users: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "user""#)
            .fetch_one(&*service.db)
            .await
            .unwrap();
        assert_eq!(users, 1);
    }
}
