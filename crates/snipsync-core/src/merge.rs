//! Title-level three-way merge of snippet maps
//!
//! The base is the [`FileRecord`] saved after the last sync. A side whose
//! snippet still matches the base is treated as unchanged and yields to the
//! other side. When both sides changed a title differently the remote version
//! is kept and a conflict is returned so it can be reported.

use crate::snippet::{Snippet, SnippetMap};
use crate::state::{FileRecord, snippet_hash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides changed the snippet; remote was kept
    BothModified,
    /// One side deleted it, the other changed it; the changed one was kept
    ModifiedAndDeleted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeConflict {
    pub title: String,
    pub kind: ConflictKind,
    /// Local version, if there was one
    pub local: Option<Snippet>,
    /// Version written to the merged result
    pub kept: Snippet,
}

impl MergeConflict {
    /// True when the local version is the one written to the merged result.
    pub fn kept_local(&self) -> bool {
        self.kind == ConflictKind::ModifiedAndDeleted && self.local.is_some()
    }
}

impl std::fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.kind, self.kept_local()) {
            (ConflictKind::BothModified, _) => write!(
                f,
                "snippet '{}' changed on both sides; kept the remote version",
                self.title
            ),
            (ConflictKind::ModifiedAndDeleted, true) => write!(
                f,
                "snippet '{}' was deleted remotely but changed locally; kept the local version",
                self.title
            ),
            (ConflictKind::ModifiedAndDeleted, false) => write!(
                f,
                "snippet '{}' was deleted locally but changed remotely; kept the remote version",
                self.title
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub merged: SnippetMap,
    pub conflicts: Vec<MergeConflict>,
}

/// Merge `local` and `remote` at title granularity.
///
/// Titles keep local order, followed by remote-only titles in remote order.
pub fn merge_snippets(
    base: Option<&FileRecord>,
    local: &SnippetMap,
    remote: &SnippetMap,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    let titles = local
        .keys()
        .chain(remote.keys().filter(|title| !local.contains_key(*title)));

    for title in titles {
        let base_hash = base.and_then(|record| record.titles.get(title));

        match (local.get(title), remote.get(title)) {
            (Some(l), Some(r)) => {
                let (lh, rh) = (snippet_hash(l), snippet_hash(r));
                if lh == rh {
                    outcome.merged.insert(title.clone(), l.clone());
                } else if base_hash == Some(&lh) {
                    outcome.merged.insert(title.clone(), r.clone());
                } else if base_hash == Some(&rh) {
                    outcome.merged.insert(title.clone(), l.clone());
                } else {
                    outcome.merged.insert(title.clone(), r.clone());
                    outcome.conflicts.push(MergeConflict {
                        title: title.clone(),
                        kind: ConflictKind::BothModified,
                        local: Some(l.clone()),
                        kept: r.clone(),
                    });
                }
            }
            (Some(l), None) => match base_hash {
                None => {
                    outcome.merged.insert(title.clone(), l.clone());
                }
                // deleted on the remote side
                Some(bh) if *bh == snippet_hash(l) => {}
                Some(_) => {
                    outcome.merged.insert(title.clone(), l.clone());
                    outcome.conflicts.push(MergeConflict {
                        title: title.clone(),
                        kind: ConflictKind::ModifiedAndDeleted,
                        local: Some(l.clone()),
                        kept: l.clone(),
                    });
                }
            },
            (None, Some(r)) => match base_hash {
                None => {
                    outcome.merged.insert(title.clone(), r.clone());
                }
                Some(bh) if *bh == snippet_hash(r) => {}
                Some(_) => {
                    outcome.merged.insert(title.clone(), r.clone());
                    outcome.conflicts.push(MergeConflict {
                        title: title.clone(),
                        kind: ConflictKind::ModifiedAndDeleted,
                        local: None,
                        kept: r.clone(),
                    });
                }
            },
            (None, None) => unreachable!("title comes from one of the maps"),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SnippetMap {
        crate::reader::parse_snippets(json).unwrap()
    }

    #[test]
    fn test_disjoint_titles_are_unioned() {
        let local = parse(r#"{"foo": {"prefix": "foo", "body": "print('foo')"}}"#);
        let remote = parse(r#"{"bar": {"prefix": "bar", "body": "print('bar')"}}"#);

        let outcome = merge_snippets(None, &local, &remote);

        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.merged.keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
        assert_eq!(outcome.merged["foo"], local["foo"]);
        assert_eq!(outcome.merged["bar"], remote["bar"]);
    }

    #[test]
    fn test_both_changed_remote_wins() {
        let base = FileRecord::from_snippets(&parse(r#"{"T": {"prefix": "t", "body": "base"}}"#));
        let local = parse(r#"{"T": {"prefix": "t", "body": "A"}}"#);
        let remote = parse(r#"{"T": {"prefix": "t", "body": "B"}}"#);

        let outcome = merge_snippets(Some(&base), &local, &remote);

        assert_eq!(outcome.merged["T"].body_text(), "B");
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].title, "T");
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::BothModified);
        assert_eq!(outcome.conflicts[0].local.as_ref().unwrap().body_text(), "A");
    }

    #[test]
    fn test_without_base_differences_conflict() {
        let local = parse(r#"{"T": {"prefix": "t", "body": "A"}}"#);
        let remote = parse(r#"{"T": {"prefix": "t", "body": "B"}}"#);

        let outcome = merge_snippets(None, &local, &remote);

        assert_eq!(outcome.merged["T"].body_text(), "B");
        assert_eq!(outcome.conflicts.len(), 1);
    }

    #[test]
    fn test_one_side_changed_takes_that_side() {
        let base_map =
            parse(r#"{"a": {"prefix": "a", "body": "0"}, "b": {"prefix": "b", "body": "0"}}"#);
        let base = FileRecord::from_snippets(&base_map);
        let local =
            parse(r#"{"a": {"prefix": "a", "body": "local"}, "b": {"prefix": "b", "body": "0"}}"#);
        let remote = parse(
            r#"{"a": {"prefix": "a", "body": "0"}, "b": {"prefix": "b", "body": "remote"}}"#,
        );

        let outcome = merge_snippets(Some(&base), &local, &remote);

        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.merged["a"].body_text(), "local");
        assert_eq!(outcome.merged["b"].body_text(), "remote");
    }

    #[test]
    fn test_deletions_against_base() {
        let base_map = parse(
            r#"{"gone": {"prefix": "g", "body": "0"}, "edited": {"prefix": "e", "body": "0"}}"#,
        );
        let base = FileRecord::from_snippets(&base_map);
        // local deleted both; remote kept "gone" as is and edited "edited"
        let local = SnippetMap::new();
        let remote = parse(
            r#"{"gone": {"prefix": "g", "body": "0"}, "edited": {"prefix": "e", "body": "1"}}"#,
        );

        let outcome = merge_snippets(Some(&base), &local, &remote);

        assert_eq!(outcome.merged.keys().collect::<Vec<_>>(), vec!["edited"]);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].kind, ConflictKind::ModifiedAndDeleted);
        assert!(outcome.conflicts[0].local.is_none());
    }

    #[test]
    fn test_conflict_message_names_kept_side() {
        let base = FileRecord::from_snippets(&parse(r#"{"T": {"prefix": "t", "body": "0"}}"#));
        let local = parse(r#"{"T": {"prefix": "t", "body": "mine"}}"#);

        let outcome = merge_snippets(Some(&base), &local, &SnippetMap::new());

        let conflict = &outcome.conflicts[0];
        assert!(conflict.kept_local());
        assert_eq!(outcome.merged["T"].body_text(), "mine");
        assert!(conflict.to_string().contains("kept the local version"));

        let remote = parse(r#"{"T": {"prefix": "t", "body": "theirs"}}"#);
        let both = merge_snippets(Some(&base), &local, &remote);
        assert!(!both.conflicts[0].kept_local());
        assert!(both.conflicts[0].to_string().contains("kept the remote version"));
    }
}
