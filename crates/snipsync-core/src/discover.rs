//! Discovery module: Platform snippet directories and directory tree walks

use std::path::{Path, PathBuf};

use crate::SNIPSYNC_DIR;

/// Get the global snippets directory for the given OS family.
///
/// Returns `None` for platforms the editor does not publish a location for.
pub fn global_snippets_dir_for(os: &str, home: &Path) -> Option<PathBuf> {
    let dir = match os {
        "windows" => home.join("AppData").join("Roaming"),
        "linux" => home.join(".config"),
        "macos" => home.join("Library").join("Application Support"),
        _ => return None,
    };
    Some(dir.join("Code").join("User").join("snippets"))
}

/// Get the global snippets directory for the running platform.
pub fn global_snippets_dir(home: &Path) -> Option<PathBuf> {
    let dir = global_snippets_dir_for(std::env::consts::OS, home);
    if dir.is_none() {
        tracing::warn!(
            "Unsupported platform {}: no global snippets directory",
            std::env::consts::OS
        );
    }
    dir
}

/// Get the directory holding installed editor extensions.
pub fn extensions_dir(home: &Path) -> PathBuf {
    home.join(".vscode").join("extensions")
}

/// List a directory and every ancestor up to the filesystem root, nearest first.
pub fn ancestors(start: &Path) -> Vec<PathBuf> {
    start.ancestors().map(Path::to_path_buf).collect()
}

/// Get the .snipsync directory path for a snippets root.
pub fn snipsync_dir(root: &Path) -> PathBuf {
    root.join(SNIPSYNC_DIR)
}

/// Get the config file path.
pub fn config_path(root: &Path) -> PathBuf {
    snipsync_dir(root).join("config.json")
}

/// Get the sync state path.
pub fn state_path(root: &Path) -> PathBuf {
    snipsync_dir(root).join("sync.json")
}

/// Get the lock file path held while a sync runs.
pub fn lock_path(root: &Path) -> PathBuf {
    snipsync_dir(root).join("sync.lock")
}
