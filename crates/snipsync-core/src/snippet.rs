//! Snippet data model

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{BUNDLE_EXTENSION, DISABLED_SUFFIX, LANGUAGE_EXTENSION};

/// Snippets of one file keyed by title, in file order.
pub type SnippetMap = IndexMap<String, Snippet>;

/// A field that may hold one string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// All values in order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// A single named snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Trigger text(s)
    pub prefix: OneOrMany,

    /// Body as one string or a list of lines
    pub body: OneOrMany,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Comma separated language ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Fields we do not interpret but must write back
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Snippet {
    pub fn new(prefix: impl Into<OneOrMany>, body: impl Into<OneOrMany>) -> Self {
        Self {
            prefix: prefix.into(),
            body: body.into(),
            description: None,
            scope: None,
            extra: Map::new(),
        }
    }

    /// Reconstruct the source text of the body.
    pub fn body_text(&self) -> String {
        self.body.values().join("\n")
    }

    /// Languages this snippet is restricted to. Empty means unrestricted.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|scope| {
                scope
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Where a snippet file was found and how its language is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnippetKind {
    GlobalLanguage,
    GlobalBundle,
    WorkspaceLanguage,
    WorkspaceBundle,
    Extension,
}

/// A snippet file with its enabled state kept out of the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnippetFile {
    /// Path without the disabled suffix
    pub logical_path: PathBuf,
    pub enabled: bool,
}

impl SnippetFile {
    pub fn enabled(logical_path: impl Into<PathBuf>) -> Self {
        Self {
            logical_path: logical_path.into(),
            enabled: true,
        }
    }

    /// Parse an on-disk path, stripping the disabled suffix if present.
    pub fn from_disk_path(path: &Path) -> Self {
        let raw = path.as_os_str().to_string_lossy();
        match raw.strip_suffix(DISABLED_SUFFIX) {
            Some(stripped) => Self {
                logical_path: PathBuf::from(stripped),
                enabled: false,
            },
            None => Self::enabled(path),
        }
    }

    /// The path this file currently has on disk.
    pub fn disk_path(&self) -> PathBuf {
        if self.enabled {
            self.logical_path.clone()
        } else {
            disabled_form(&self.logical_path)
        }
    }

    /// File name without the disabled suffix.
    pub fn name(&self) -> Option<&str> {
        self.logical_path.file_name().and_then(|n| n.to_str())
    }

    /// True for multi-language `.code-snippets` bundles.
    pub fn is_bundle(&self) -> bool {
        has_extension(&self.logical_path, BUNDLE_EXTENSION)
    }
}

/// Append the disabled suffix to a path.
pub fn disabled_form(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(DISABLED_SUFFIX);
    PathBuf::from(raw)
}

/// Whether a file name looks like a snippet file, disabled or not.
pub fn is_snippet_file_name(name: &str) -> bool {
    let name = name.strip_suffix(DISABLED_SUFFIX).unwrap_or(name);
    let path = Path::new(name);
    has_extension(path, BUNDLE_EXTENSION) || has_extension(path, LANGUAGE_EXTENSION)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_keeps_unknown_fields() {
        let json = r#"{"prefix":["a","b"],"body":["x","y"],"isFileTemplate":true}"#;
        let snippet: Snippet = serde_json::from_str(json).unwrap();

        assert_eq!(snippet.prefix.values(), vec!["a", "b"]);
        assert_eq!(snippet.body_text(), "x\ny");
        assert_eq!(snippet.extra.get("isFileTemplate"), Some(&Value::Bool(true)));

        let back = serde_json::to_value(&snippet).unwrap();
        assert_eq!(back["isFileTemplate"], Value::Bool(true));
        assert!(back.get("scope").is_none());
    }

    #[test]
    fn test_scopes() {
        let mut snippet = Snippet::new("p", "b");
        assert!(snippet.scopes().is_empty());
        snippet.scope = Some("rust, python,".to_string());
        assert_eq!(snippet.scopes(), vec!["rust", "python"]);
    }

    #[test]
    fn test_snippet_file_disk_forms() {
        let file = SnippetFile::from_disk_path(Path::new("/s/python.json.disabled"));
        assert!(!file.enabled);
        assert_eq!(file.logical_path, PathBuf::from("/s/python.json"));
        assert_eq!(file.disk_path(), PathBuf::from("/s/python.json.disabled"));
        assert_eq!(file.name(), Some("python.json"));

        let file = SnippetFile::from_disk_path(Path::new("/s/all.code-snippets"));
        assert!(file.enabled);
        assert!(file.is_bundle());
        assert_eq!(file.disk_path(), PathBuf::from("/s/all.code-snippets"));
    }

    #[test]
    fn test_snippet_file_names() {
        assert!(is_snippet_file_name("go.json"));
        assert!(is_snippet_file_name("mine.code-snippets.disabled"));
        assert!(!is_snippet_file_name("README.md"));
        assert!(!is_snippet_file_name("sync.lock"));
    }
}
