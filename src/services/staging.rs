//! Scoped on-disk staging for uploads.
//!
//! A `StagedFile` owns a uniquely named temporary file inside the staging
//! directory. The file is unlinked when the value is dropped, whichever way
//! the request ends.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{
    io,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::{fs::File, io::AsyncWriteExt};

const STAGING_PREFIX: &str = ".upload-";

/// An uploaded payload written to a temporary file.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    original_name: String,
    size_bytes: u64,
}

impl StagedFile {
    /// Location of the staged bytes on disk.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Filename the client supplied with the upload.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Remove the staged file now, logging (not failing) if removal errors.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(err) = self.file.close() {
            tracing::warn!("failed to remove staged file {}: {}", path.display(), err);
        }
    }
}

/// Stream `body` into a fresh temporary file under `dir`.
///
/// The temp file keeps the original extension so the host can sniff it.
/// On any read or write error the partially written file is removed before
/// the error is returned.
pub async fn stage_stream<S>(dir: &Path, original_name: &str, body: S) -> io::Result<StagedFile>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let suffix = extension_suffix(original_name);
    let file = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(&suffix)
        .tempfile_in(dir)?;

    let mut writer = File::from_std(file.reopen()?);
    let mut size_bytes: u64 = 0;

    pin_mut!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;
    writer.sync_all().await?;

    tracing::debug!(
        path = %file.path().display(),
        size_bytes,
        "staged upload {}",
        original_name
    );

    Ok(StagedFile {
        file,
        original_name: original_name.to_string(),
        size_bytes,
    })
}

/// Default staging directory when none is configured.
pub fn default_dir() -> PathBuf {
    std::env::temp_dir()
}

fn extension_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}
