//! Writing rendered documents into the output directory.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Extension given to every rendered file.
pub const OUTPUT_EXTENSION: &str = "md";

/// Errors that can occur while writing a rendered document.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to create output directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Creates the output directory and its parents. Succeeds if it already exists.
pub async fn ensure_output_dir(dir: &Path) -> Result<(), WriteError> {
    let existed = tokio::fs::try_exists(dir).await.unwrap_or(false);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| WriteError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    if !existed {
        tracing::info!(path = %dir.display(), "Created output directory");
    }
    Ok(())
}

/// Path a slug is written to: `{dir}/{slug}.md`.
pub fn output_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{slug}.{OUTPUT_EXTENSION}"))
}

/// Writes `contents` to `{dir}/{slug}.md`, replacing any existing file.
///
/// The directory is created if missing. The document is written to a
/// temporary file in the same directory, synced, then renamed over the
/// destination, so a reader never sees a half-written file.
pub async fn write_document(
    dir: &Path,
    slug: &str,
    contents: &str,
) -> Result<PathBuf, WriteError> {
    ensure_output_dir(dir).await?;

    let path = output_path(dir, slug);

    // Randomized temp filename, created with create_new so an
    // existing file or symlink at that path is never followed.
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dir.join(format!(".{slug}.{OUTPUT_EXTENSION}.tmp.{random_suffix:016x}"));

    let write_err = |source| WriteError::Write {
        path: path.clone(),
        source,
    };

    if let Err(source) = write_temp(&temp_path, contents).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(write_err(source));
    }

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        if let Err(source) = tokio::fs::remove_file(&path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(write_err(source));
        }
    }

    if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(write_err(source));
    }

    tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote document");
    Ok(path)
}

async fn write_temp(temp_path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}
