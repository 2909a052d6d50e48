//! One-off export and import of snippet collections

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::edit::{bundle, merge_renaming};
use crate::ledger::resolve_save_target;
use crate::reader::{parse_snippets, read_file, to_json, write_text};
use crate::remote::RemoteStore;
use crate::snippet::{SnippetFile, is_snippet_file_name};
use crate::{BUNDLE_EXTENSION, DISABLED_SUFFIX, Result, SnippetError};

/// Bundle `paths` into `<name>.code-snippets` and publish it as a new collection.
///
/// Returns the collection URL, or its id when the store has no URL for it.
pub async fn export(
    store: &dyn RemoteStore,
    name: &str,
    description: &str,
    public: bool,
    paths: &[PathBuf],
    sink: &dyn DiagnosticSink,
) -> Result<String> {
    let snippets = bundle(paths, sink).await;
    if snippets.is_empty() {
        return Err(SnippetError::NotConfigured(
            "nothing to export: no readable snippets".to_string(),
        ));
    }

    let file_name = format!("{name}.{BUNDLE_EXTENSION}");
    let files = BTreeMap::from([(file_name, to_json(&snippets)?)]);
    let collection = store.create(description, public, &files).await?;

    tracing::info!("Exported {} snippets to {}", snippets.len(), collection.id);
    Ok(collection.html_url.unwrap_or(collection.id))
}

/// Save the snippet files of collection `id` into `dir`.
///
/// Existing files are merged with the incoming snippets rather than replaced.
/// With `only_snippets` only `.code-snippets` bundles are imported. Returns
/// the number of files saved.
pub async fn import(
    store: &dyn RemoteStore,
    id: &str,
    dir: &Path,
    only_snippets: bool,
    sink: &dyn DiagnosticSink,
) -> Result<usize> {
    let collection = store.fetch(id).await?;

    let mut saved = 0;
    for (name, raw) in &collection.files {
        if !is_importable(name, only_snippets) {
            tracing::debug!("Skipping {} from {}", name, id);
            continue;
        }

        let target = resolve_save_target(&dir.join(name)).await;
        let incoming = match parse_snippets(raw) {
            Ok(snippets) => snippets,
            Err(message) => {
                sink.report(
                    Diagnostic::warning(
                        DiagnosticKind::ParseFailure,
                        format!("remote {name} not imported: {message}"),
                    )
                    .with_path(&target),
                );
                continue;
            }
        };

        let text = match read_file(&target).await {
            Ok(existing) => to_json(&merge_renaming(existing, incoming))?,
            Err(SnippetError::NotFound(_)) => raw.clone(),
            Err(e) => {
                sink.report(
                    Diagnostic::warning(DiagnosticKind::ParseFailure, e.to_string())
                        .with_path(&target),
                );
                continue;
            }
        };

        write_text(&target, &text).await?;
        saved += 1;
    }

    tracing::info!("Imported {} files from {}", saved, id);
    Ok(saved)
}

fn is_importable(name: &str, only_snippets: bool) -> bool {
    if !is_snippet_file_name(name)
        || name.ends_with(DISABLED_SUFFIX)
        || name.contains(['/', '\\'])
    {
        return false;
    }
    !only_snippets || SnippetFile::enabled(name).is_bundle()
}
