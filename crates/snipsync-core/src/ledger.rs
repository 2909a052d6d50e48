//! Enable/disable bookkeeping for snippet files
//!
//! A disabled snippet file is the same file renamed with [`DISABLED_SUFFIX`].
//! Every state change is a single rename, so other readers only ever see the
//! old path or the new one.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::join_all;

use crate::snippet::{SnippetFile, disabled_form};
use crate::{DISABLED_SUFFIX, Result, SnippetError};

/// True iff the path carries the disabled suffix.
pub fn is_disabled(path: &Path) -> bool {
    path.as_os_str()
        .to_string_lossy()
        .ends_with(DISABLED_SUFFIX)
}

/// Rename `path` to its disabled form and return the new path.
pub async fn disable(path: &Path) -> Result<PathBuf> {
    if is_disabled(path) {
        return Ok(path.to_path_buf());
    }
    let target = disabled_form(path);
    rename_exclusive(path, &target).await?;
    tracing::debug!("Disabled {}", path.display());
    Ok(target)
}

/// Rename a disabled path back to its enabled form. No-op for enabled paths.
pub async fn enable(path: &Path) -> Result<PathBuf> {
    if !is_disabled(path) {
        return Ok(path.to_path_buf());
    }
    let target = SnippetFile::from_disk_path(path).logical_path;
    rename_exclusive(path, &target).await?;
    tracing::debug!("Enabled {}", target.display());
    Ok(target)
}

/// Pick the path a save should write to.
///
/// If the other variant (enabled or disabled) of `expected` exists on disk it
/// is returned, so saving never creates a second copy of the same file.
pub async fn resolve_save_target(expected: &Path) -> PathBuf {
    let other = if is_disabled(expected) {
        SnippetFile::from_disk_path(expected).logical_path
    } else {
        disabled_form(expected)
    };
    if tokio::fs::try_exists(&other).await.unwrap_or(false) {
        other
    } else {
        expected.to_path_buf()
    }
}

/// Run `callback` with every disabled file in `files` temporarily enabled.
///
/// Files that were disabled beforehand are disabled again once the callback
/// finishes, whether it returned `Ok`, `Err`, or panicked. A failed restore is
/// logged and does not replace the callback's result.
pub async fn with_all_enabled<F, Fut, T, E>(
    files: &[SnippetFile],
    callback: F,
) -> std::result::Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<SnippetError>,
{
    let disabled: Vec<&SnippetFile> = files.iter().filter(|f| !f.enabled).collect();

    let results = join_all(disabled.iter().map(|file| enable_file(file))).await;

    let mut enabled = Vec::with_capacity(disabled.len());
    let mut first_error = None;
    for (file, result) in disabled.into_iter().zip(results) {
        match result {
            Ok(()) => enabled.push(file),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        restore(&enabled).await;
        return Err(e.into());
    }

    let outcome = AssertUnwindSafe(callback()).catch_unwind().await;

    restore(&enabled).await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

async fn enable_file(file: &SnippetFile) -> Result<()> {
    enable(&file.disk_path()).await.map(|_| ())
}

/// Disable every file again. Failures are per-file.
async fn restore(files: &[&SnippetFile]) {
    join_all(files.iter().map(|file| async move {
        if let Err(e) = disable(&file.logical_path).await {
            tracing::warn!(
                "Failed to disable {} again: {}",
                file.logical_path.display(),
                e
            );
        }
    }))
    .await;
}

async fn rename_exclusive(from: &Path, to: &Path) -> Result<()> {
    if !tokio::fs::try_exists(from).await? {
        return Err(SnippetError::FileSystem(format!(
            "cannot rename {}: file does not exist",
            from.display()
        )));
    }
    if tokio::fs::try_exists(to).await? {
        return Err(SnippetError::FileSystem(format!(
            "cannot rename {} to {}: destination exists",
            from.display(),
            to.display()
        )));
    }
    tokio::fs::rename(from, to).await.map_err(|e| {
        SnippetError::FileSystem(format!(
            "rename {} -> {} failed: {}",
            from.display(),
            to.display(),
            e
        ))
    })
}
