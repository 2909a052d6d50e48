//! Reading and writing snippet files
//!
//! Snippet files are JSON with comments. Reading a batch never fails as a
//! whole: a bad file is reported to the diagnostic sink and left out.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use indexmap::IndexMap;
use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::snippet::{Snippet, SnippetMap};
use crate::{Result, SnippetError};

/// The snippets of one successfully read file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub snippets: SnippetMap,
}

/// Parse snippet file text.
///
/// Comments and trailing commas are accepted. Files that group snippets under
/// a scope key (`{".source.go": {"title": {...}}}`) are flattened and the key
/// becomes the snippet scope unless the snippet declares its own.
pub fn parse_snippets(text: &str) -> std::result::Result<SnippetMap, String> {
    if text.trim().is_empty() {
        return Ok(SnippetMap::new());
    }

    let raw: IndexMap<String, Value> =
        serde_json_lenient::from_str_lenient(text).map_err(|e| e.to_string())?;

    let mut snippets = SnippetMap::with_capacity(raw.len());
    for (title, value) in raw {
        if is_snippet_value(&value) {
            let snippet = serde_json::from_value(value).map_err(|e| format!("{title}: {e}"))?;
            snippets.insert(title, snippet);
            continue;
        }

        let Value::Object(group) = value else {
            return Err(format!("{title}: expected a snippet object"));
        };
        for (inner_title, inner) in group {
            let mut snippet: Snippet =
                serde_json::from_value(inner).map_err(|e| format!("{title}.{inner_title}: {e}"))?;
            if snippet.scope.is_none() {
                snippet.scope = Some(title.trim_start_matches(".source.").to_string());
            }
            snippets.insert(inner_title, snippet);
        }
    }

    Ok(snippets)
}

fn is_snippet_value(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("body") || obj.contains_key("prefix"))
}

/// Read and parse one snippet file.
pub async fn read_file(path: &Path) -> Result<SnippetMap> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SnippetError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    parse_snippets(&text).map_err(|message| SnippetError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Read every path concurrently.
///
/// The output keeps input order. Missing files count as empty and are only
/// logged; files that could not be read or parsed are reported to `sink`.
pub async fn read_all(paths: &[PathBuf], sink: &dyn DiagnosticSink) -> Vec<ParsedFile> {
    let results = join_all(paths.iter().map(|path| read_file(path))).await;

    paths
        .iter()
        .zip(results)
        .filter_map(|(path, result)| match result {
            Ok(snippets) => Some(ParsedFile {
                path: path.clone(),
                snippets,
            }),
            Err(SnippetError::NotFound(_)) => {
                tracing::debug!("Skipping missing {}", path.display());
                None
            }
            Err(e) => {
                sink.report(
                    Diagnostic::warning(DiagnosticKind::ParseFailure, e.to_string())
                        .with_path(path),
                );
                None
            }
        })
        .collect()
}

/// Serialize snippets the way the editor writes them.
pub fn to_json(snippets: &SnippetMap) -> Result<String> {
    Ok(serde_json::to_string_pretty(snippets)?)
}

/// Write snippets to `path`, replacing the file in one rename.
pub async fn write_file(path: &Path, snippets: &SnippetMap) -> Result<()> {
    write_text(path, &to_json(snippets)?).await
}

/// Write raw text to `path` through a sibling temp file.
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let written = async {
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    written.map_err(|e| {
        SnippetError::FileSystem(format!("failed to write {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use std::fs;

    #[test]
    fn test_parse_with_comments_and_trailing_commas() {
        let text = r#"{
            // line comment
            "foo": {
                "prefix": "foo",
                /* block */
                "body": ["print('foo')", "print('bar')"],
            },
        }"#;
        let snippets = parse_snippets(text).unwrap();
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets["foo"].body_text(), "print('foo')\nprint('bar')");
    }

    #[test]
    fn test_parse_flattens_scoped_groups() {
        let text = r#"{".source.go": {"my-snippet": {"prefix": "p", "body": "b"}}}"#;
        let snippets = parse_snippets(text).unwrap();
        assert_eq!(snippets["my-snippet"].scope.as_deref(), Some("go"));
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(parse_snippets("  \n").unwrap().is_empty());
        assert!(parse_snippets("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_snippets("{ not json").is_err());
        assert!(parse_snippets(r#"{"x": 3}"#).is_err());
    }

    #[tokio::test]
    async fn test_read_all_skips_failures_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a.json");
        let bad = temp.path().join("bad.json");
        let missing = temp.path().join("missing.json");
        let b = temp.path().join("b.code-snippets");
        fs::write(&a, r#"{"a": {"prefix": "a", "body": "a"}}"#).unwrap();
        fs::write(&bad, "{ oops").unwrap();
        fs::write(&b, r#"{"b": {"prefix": "b", "body": "b", "scope": "go"}}"#).unwrap();

        let sink = CollectingSink::new();
        let paths = vec![a.clone(), bad, missing, b.clone()];
        let parsed = read_all(&paths, &sink).await;

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].path, a);
        assert_eq!(parsed[1].path, b);
        assert_eq!(sink.count(DiagnosticKind::ParseFailure), 1);
        assert_eq!(sink.drain().len(), 1);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("rust.json");

        let mut snippets = SnippetMap::new();
        snippets.insert("zeta".to_string(), Snippet::new("z", "z"));
        snippets.insert("alpha".to_string(), Snippet::new("a", "a"));
        write_file(&path, &snippets).await.unwrap();

        let back = read_file(&path).await.unwrap();
        assert_eq!(back.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }
}
