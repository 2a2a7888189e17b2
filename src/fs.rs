//! Filesystem helpers with the modes the installer promises.

use std::{fs::Permissions, os::unix::fs::PermissionsExt};

use camino::Utf8Path;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{IoContext, Result};

pub const DIR_MODE: u32 = 0o755;
pub const SCRIPT_MODE: u32 = 0o600;

/// `mkdir -p` with [`DIR_MODE`] for newly created directories.
pub async fn create_dir(path: &Utf8Path, context: &str) -> Result<()> {
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .await
        .io_context(|| format!("{context} {path}"))
}

pub async fn exists(path: &Utf8Path) -> Result<bool> {
    fs::try_exists(path)
        .await
        .io_context(|| format!("checking {path}"))
}

/// Writes `contents` and forces [`SCRIPT_MODE`], also on files left by an earlier run.
pub async fn write_private(path: &Utf8Path, contents: &str, context: &str) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(SCRIPT_MODE)
        .open(path)
        .await
        .io_context(|| format!("{context} {path}"))?;

    file.write_all(contents.as_bytes())
        .await
        .io_context(|| format!("{context} {path}"))?;
    file.flush()
        .await
        .io_context(|| format!("{context} {path}"))?;

    fs::set_permissions(path, Permissions::from_mode(SCRIPT_MODE))
        .await
        .io_context(|| format!("{context} {path}"))?;

    debug!("Wrote {} bytes to {path}", contents.len());
    Ok(())
}

/// Removes a directory tree, logging instead of failing.
pub async fn remove_best_effort(path: &Utf8Path) -> bool {
    match fs::remove_dir_all(path).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to clean up {path}: {e}");
            false
        }
    }
}
