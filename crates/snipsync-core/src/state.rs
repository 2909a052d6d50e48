//! Sync state stored in .snipsync/sync.json
//!
//! Records what every file looked like after the last successful sync so the
//! next one can tell which side changed.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snippet::{Snippet, SnippetMap};
use crate::{Result, discover};

/// Content hashes of one file at the last sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Hash over all titles and snippet hashes
    pub hash: String,
    /// Title -> snippet hash
    pub titles: BTreeMap<String, String>,
}

impl FileRecord {
    pub fn from_snippets(snippets: &SnippetMap) -> Self {
        let titles: BTreeMap<String, String> = snippets
            .iter()
            .map(|(title, snippet)| (title.clone(), snippet_hash(snippet)))
            .collect();

        let mut hasher = blake3::Hasher::new();
        for (title, hash) in &titles {
            hasher.update(title.as_bytes());
            hasher.update(&[0]);
            hasher.update(hash.as_bytes());
            hasher.update(&[b'\n']);
        }

        Self {
            hash: hasher.finalize().to_hex().to_string(),
            titles,
        }
    }
}

/// Sync state for one snippets root.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncState {
    /// Remote collection id, set by the first sync
    pub collection_id: Option<String>,
    /// File name -> record
    pub files: BTreeMap<String, FileRecord>,
}

impl SyncState {
    /// Load from disk.
    pub fn load(root: &Path) -> Result<Self> {
        let path = discover::state_path(root);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to disk.
    pub fn save(&self, root: &Path) -> Result<()> {
        std::fs::create_dir_all(discover::snipsync_dir(root))?;
        let path = discover::state_path(root);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn record(&mut self, name: &str, snippets: &SnippetMap) {
        self.files
            .insert(name.to_string(), FileRecord::from_snippets(snippets));
    }
}

/// Blake3 hash of a snippet, independent of key order.
pub fn snippet_hash(snippet: &Snippet) -> String {
    let value = serde_json::to_value(snippet)
        .map(canonical)
        .unwrap_or(Value::Null);
    let bytes = serde_json::to_vec(&value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, canonical(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SnippetMap {
        crate::reader::parse_snippets(json).unwrap()
    }

    #[test]
    fn test_hash_ignores_key_and_title_order() {
        let a = parse(r#"{"x": {"prefix": "x", "body": "1"}, "y": {"body": "2", "prefix": "y"}}"#);
        let b = parse(r#"{"y": {"prefix": "y", "body": "2"}, "x": {"body": "1", "prefix": "x"}}"#);
        assert_eq!(FileRecord::from_snippets(&a), FileRecord::from_snippets(&b));
    }

    #[test]
    fn test_hash_changes_with_body() {
        let a = parse(r#"{"x": {"prefix": "x", "body": "1"}}"#);
        let b = parse(r#"{"x": {"prefix": "x", "body": "2"}}"#);
        assert_ne!(FileRecord::from_snippets(&a).hash, FileRecord::from_snippets(&b).hash);
    }

    #[test]
    fn test_state_round_trip_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        assert!(SyncState::load(temp.path()).unwrap().collection_id.is_none());

        let mut state = SyncState {
            collection_id: Some("abc123".to_string()),
            ..Default::default()
        };
        state.record("go.json", &parse(r#"{"x": {"prefix": "x", "body": "1"}}"#));
        state.save(temp.path()).unwrap();

        let loaded = SyncState::load(temp.path()).unwrap();
        assert_eq!(loaded.collection_id.as_deref(), Some("abc123"));
        assert_eq!(loaded.files["go.json"].titles.len(), 1);
    }
}
