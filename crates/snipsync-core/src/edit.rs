//! Editing snippet files in place

use std::path::{Path, PathBuf};

use crate::diagnostics::DiagnosticSink;
use crate::ledger::resolve_save_target;
use crate::reader::{read_all, read_file, write_file, write_text};
use crate::snippet::{Snippet, SnippetFile, SnippetMap};
use crate::{Result, SnippetError};

/// Create an empty snippet file unless one (enabled or disabled) exists.
///
/// Returns the path of the file on disk.
pub async fn create_file(path: &Path) -> Result<PathBuf> {
    let target = resolve_save_target(path).await;
    if tokio::fs::try_exists(&target).await? {
        return Ok(target);
    }
    write_text(&target, "{}").await?;
    tracing::info!("Created {}", target.display());
    Ok(target)
}

/// Add or replace `title` in the file at `path`.
///
/// Language files drop the scope since the file name already binds it.
/// Bundles get `language` as scope when the snippet has none.
pub async fn write_snippet(
    path: &Path,
    title: &str,
    mut snippet: Snippet,
    language: Option<&str>,
) -> Result<PathBuf> {
    let target = resolve_save_target(path).await;

    if SnippetFile::from_disk_path(&target).is_bundle() {
        if snippet.scope.is_none() {
            snippet.scope = language.map(str::to_string);
        }
    } else {
        snippet.scope = None;
    }

    let mut snippets = read_or_empty(&target).await?;
    snippets.insert(title.to_string(), snippet);
    write_file(&target, &snippets).await?;

    tracing::debug!("Saved '{}' to {}", title, target.display());
    Ok(target)
}

/// Remove `title` from the file at `path`. Returns false if it was not there.
pub async fn delete_snippet(path: &Path, title: &str) -> Result<bool> {
    let target = resolve_save_target(path).await;
    let mut snippets = read_file(&target).await?;
    if snippets.shift_remove(title).is_none() {
        return Ok(false);
    }
    write_file(&target, &snippets).await?;
    Ok(true)
}

/// Merge `incoming` into `base` without losing either side.
///
/// Identical duplicates are dropped. A differing duplicate is added under the
/// lowest free numbered title (`title1`, `title2`, ...).
pub fn merge_renaming(mut base: SnippetMap, incoming: SnippetMap) -> SnippetMap {
    for (title, snippet) in incoming {
        match base.get(&title) {
            None => {
                base.insert(title, snippet);
            }
            Some(existing) if *existing == snippet => {}
            Some(_) => {
                let free = (1..)
                    .map(|n| format!("{title}{n}"))
                    .find(|candidate| !base.contains_key(candidate))
                    .unwrap_or_else(|| title.clone());
                base.insert(free, snippet);
            }
        }
    }
    base
}

/// Combine several snippet files into one bundle.
///
/// Snippets from language files are scoped to the file's language so they
/// keep applying to it once bundled. Unparsable files go to `sink`.
pub async fn bundle(paths: &[PathBuf], sink: &dyn DiagnosticSink) -> SnippetMap {
    let files = read_all(paths, sink).await;

    let mut combined = SnippetMap::new();
    for parsed in files {
        let file = SnippetFile::from_disk_path(&parsed.path);
        let language = (!file.is_bundle())
            .then(|| file.logical_path.file_stem())
            .flatten()
            .and_then(|stem| stem.to_str())
            .map(str::to_string);

        let mut snippets = parsed.snippets;
        if let Some(language) = language {
            for snippet in snippets.values_mut() {
                snippet.scope.get_or_insert_with(|| language.clone());
            }
        }
        combined = merge_renaming(combined, snippets);
    }
    combined
}

async fn read_or_empty(path: &Path) -> Result<SnippetMap> {
    match read_file(path).await {
        Err(SnippetError::NotFound(_)) => Ok(SnippetMap::new()),
        other => other,
    }
}
