//! Snippet file locator
//!
//! Resolves which snippet files apply to an editing context. Nothing is
//! cached: every call looks at the filesystem again.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::Value;

use crate::snippet::{SnippetFile, SnippetKind, disabled_form};
use crate::{LANGUAGE_EXTENSION, WORKSPACE_CONFIG_DIR, discover};

/// What the editor currently has open.
#[derive(Debug, Clone, Default)]
pub struct LocateContext {
    /// Active language id, e.g. `python`
    pub language: Option<String>,
    /// Open workspace folder roots
    pub workspace_folders: Vec<PathBuf>,
    /// User home directory
    pub home: PathBuf,
    /// Overrides the platform global snippets directory
    pub global_dir: Option<PathBuf>,
    /// Overrides the installed extensions directory
    pub extensions_dir: Option<PathBuf>,
}

impl LocateContext {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_workspace_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.workspace_folders.push(folder.into());
        self
    }

    /// Global snippets directory for this context, if the platform has one.
    pub fn global_dir(&self) -> Option<PathBuf> {
        self.global_dir
            .clone()
            .or_else(|| discover::global_snippets_dir(&self.home))
    }

    pub fn extensions_dir(&self) -> PathBuf {
        self.extensions_dir
            .clone()
            .unwrap_or_else(|| discover::extensions_dir(&self.home))
    }
}

/// A snippet file found by [`locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub file: SnippetFile,
    pub kind: SnippetKind,
    /// Language the whole file is bound to; `None` for bundles
    pub language: Option<String>,
}

impl LocatedFile {
    /// Path the file has on disk right now.
    pub fn path(&self) -> PathBuf {
        self.file.disk_path()
    }
}

/// Find the snippet files relevant to `ctx`.
///
/// Order is global files, then each workspace folder walked from the folder up
/// to the filesystem root, then extension contributions. The same path may
/// appear more than once when workspace folders are nested.
pub fn locate(ctx: &LocateContext) -> Vec<LocatedFile> {
    let mut found = Vec::new();
    if ctx.language.is_none() && ctx.workspace_folders.is_empty() {
        return found;
    }
    let language = ctx.language.as_deref();

    if let Some(global) = ctx.global_dir() {
        found.extend(scan_config_dir(
            &global,
            language,
            SnippetKind::GlobalLanguage,
            SnippetKind::GlobalBundle,
        ));
    }

    for folder in &ctx.workspace_folders {
        for dir in discover::ancestors(folder) {
            found.extend(scan_config_dir(
                &dir.join(WORKSPACE_CONFIG_DIR),
                language,
                SnippetKind::WorkspaceLanguage,
                SnippetKind::WorkspaceBundle,
            ));
        }
    }

    found.extend(extension_snippet_files(&ctx.extensions_dir(), language));

    tracing::debug!("Located {} snippet files", found.len());
    found
}

/// Per-language file first, then bundles sorted by name.
fn scan_config_dir(
    dir: &Path,
    language: Option<&str>,
    language_kind: SnippetKind,
    bundle_kind: SnippetKind,
) -> Vec<LocatedFile> {
    let mut found = Vec::new();
    if !dir.is_dir() {
        return found;
    }

    if let Some(lang) = language {
        let path = dir.join(format!("{lang}.{LANGUAGE_EXTENSION}"));
        let existing = if path.is_file() {
            Some(SnippetFile::enabled(path))
        } else if disabled_form(&path).is_file() {
            Some(SnippetFile::from_disk_path(&disabled_form(&path)))
        } else {
            None
        };
        if let Some(file) = existing {
            found.push(LocatedFile {
                file,
                kind: language_kind,
                language: Some(lang.to_string()),
            });
        }
    }

    for path in list_files(dir) {
        let file = SnippetFile::from_disk_path(&path);
        if file.is_bundle() {
            found.push(LocatedFile {
                file,
                kind: bundle_kind,
                language: None,
            });
        }
    }

    found
}

/// Snippet files (enabled or disabled) directly inside `dir`, sorted by name.
pub fn list_snippet_files(dir: &Path) -> Vec<SnippetFile> {
    list_files(dir)
        .iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(crate::snippet::is_snippet_file_name)
        })
        .map(|path| SnippetFile::from_disk_path(path))
        .collect()
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .hidden(false) // .vscode content is what we are after
        .ignore(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    walker
        .flatten()
        .filter(|entry| entry.depth() == 1)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .collect()
}

#[derive(Debug, Deserialize)]
struct ExtensionManifest {
    #[serde(default)]
    contributes: Option<Contributes>,
}

#[derive(Debug, Deserialize)]
struct Contributes {
    #[serde(default)]
    snippets: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SnippetContribution {
    language: String,
    path: String,
}

/// Snippet files declared by installed extensions.
///
/// When `language` is known only contributions for it are returned.
pub fn extension_snippet_files(
    extensions_dir: &Path,
    language: Option<&str>,
) -> Vec<LocatedFile> {
    let Ok(entries) = std::fs::read_dir(extensions_dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut found = Vec::new();
    for dir in dirs {
        let manifest_path = dir.join("package.json");
        let manifest: ExtensionManifest = match std::fs::read_to_string(&manifest_path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!("Skipping extension {}: {}", dir.display(), e);
                continue;
            }
        };

        let Some(contributes) = manifest.contributes else {
            continue;
        };

        for entry in contributes.snippets {
            let contribution: SnippetContribution = match serde_json::from_value(entry) {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(
                        "Skipping snippet entry in {}: {}",
                        manifest_path.display(),
                        e
                    );
                    continue;
                }
            };
            if language.is_some_and(|lang| lang != contribution.language) {
                continue;
            }
            let path = normalize(&dir.join(&contribution.path));
            found.push(LocatedFile {
                file: SnippetFile::enabled(path),
                kind: SnippetKind::Extension,
                language: Some(contribution.language),
            });
        }
    }

    found
}

/// Drop `.` components so `./snippets/go.json` resolves cleanly.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}
