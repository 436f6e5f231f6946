//! Generated-file helpers

use crate::error::{KubeformError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> KubeformError + '_ {
    move |source| KubeformError::IoError {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Write `content` next to `path` and rename it into place
pub async fn write_atomic(path: &Path, content: &[u8], mode: Option<u32>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let tmp = temp_path(path);
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if let Some(mode) = mode {
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(&tmp).await.map_err(io_error(&tmp))?;
    file.write_all(content).await.map_err(io_error(&tmp))?;
    file.flush().await.map_err(io_error(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).await.map_err(io_error(path))?;
    tracing::debug!(path = %path.display(), "Wrote file");
    Ok(())
}

/// Write an SSH private key readable only by the owner
pub async fn write_private_key(path: &Path, private_key: &str) -> Result<()> {
    write_atomic(path, private_key.as_bytes(), Some(0o600)).await
}

/// Remove a file; a missing file is not an error
pub async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "Removed file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(KubeformError::IoError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read a file as text, None if it cannot be read
pub async fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "File not readable");
            None
        }
    }
}
