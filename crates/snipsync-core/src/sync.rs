//! Sync/merge engine for the global snippets directory
//!
//! A run goes through these steps:
//! 1. take the lock and temporarily enable every disabled snippet file
//! 2. read local files and fetch the remote collection
//! 3. diff each file against the last synced state and merge by title
//! 4. push the remote updates, then write local files, then save the state
//!
//! Nothing local is written before the remote calls have succeeded, and the
//! disabled files are disabled again whatever the outcome.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
use crate::edit::merge_renaming;
use crate::locate::list_snippet_files;
use crate::merge::{MergeConflict, MergeOutcome, merge_snippets};
use crate::reader::{parse_snippets, to_json, write_text};
use crate::remote::{GistClient, RemoteCollection, RemoteStore};
use crate::snippet::{SnippetFile, SnippetMap, is_snippet_file_name};
use crate::state::{FileRecord, SyncState};
use crate::{Config, DISABLED_SUFFIX, Result, STALE_LOCK_SECS, SnippetError, discover, ledger};

/// Direction bias of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Push local changes and pull remote ones
    Sync,
    /// Only bring remote changes into the local files
    Merge,
}

/// A title conflict inside one file.
#[derive(Debug, Clone)]
pub struct FileConflict {
    pub file: String,
    pub conflict: MergeConflict,
}

/// What a run did.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub collection_id: String,
    /// A new remote collection was created
    pub created: bool,
    pub html_url: Option<String>,
    /// Files sent to the remote as they were locally
    pub pushed: Vec<String>,
    /// Files written locally as they were remotely
    pub pulled: Vec<String>,
    /// Files merged by title
    pub merged: Vec<String>,
    pub unchanged: usize,
    /// Files left out because one side could not be parsed
    pub skipped: Vec<String>,
    pub conflicts: Vec<FileConflict>,
}

/// Exclusive marker held for the duration of a run.
///
/// A lock left behind by a run that was killed is taken over once it is older
/// than [`STALE_LOCK_SECS`].
struct SyncLock {
    path: PathBuf,
}

/// Contents of the lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    /// Seconds since the unix epoch
    started_at: u64,
}

impl SyncLock {
    fn acquire(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(discover::snipsync_dir(root))?;
        let path = discover::lock_path(root);

        match Self::create(&path) {
            Err(SnippetError::SyncInProgress(_)) if is_stale(&path) => {
                tracing::warn!("Removing stale sync lock {}", path.display());
                match std::fs::remove_file(&path) {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                    _ => {}
                }
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SnippetError::SyncInProgress(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let lock = Self {
            path: path.to_path_buf(),
        };

        let info = LockInfo {
            pid: std::process::id(),
            started_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        serde_json::to_writer(&mut file, &info)?;
        Ok(lock)
    }
}

/// Whether the lock at `path` is older than [`STALE_LOCK_SECS`].
///
/// Falls back to the file's modification time when the contents are unreadable.
fn is_stale(path: &Path) -> bool {
    let started = std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str::<LockInfo>(&text).ok())
        .map(|info| {
            tracing::debug!("Sync lock held by pid {}", info.pid);
            UNIX_EPOCH + Duration::from_secs(info.started_at)
        })
        .or_else(|| std::fs::metadata(path).and_then(|m| m.modified()).ok());

    started
        .and_then(|started| SystemTime::now().duration_since(started).ok())
        .is_some_and(|age| age >= Duration::from_secs(STALE_LOCK_SECS))
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

struct LocalFile {
    path: PathBuf,
    raw: String,
    snippets: SnippetMap,
}

impl LocalFile {
    /// Text to send to the remote. Empty files go up as `{}`, since an empty
    /// gist file is rejected on create and deleted on update.
    fn upload_text(&self) -> String {
        if self.raw.trim().is_empty() {
            "{}".to_string()
        } else {
            self.raw.clone()
        }
    }
}

#[derive(Default)]
struct LocalSide {
    files: BTreeMap<String, LocalFile>,
    /// Names present locally but unreadable
    skipped: BTreeSet<String>,
}

#[derive(Default)]
struct Plan {
    local_writes: Vec<(PathBuf, String)>,
    remote_updates: BTreeMap<String, String>,
    /// New base per file
    records: BTreeMap<String, SnippetMap>,
    report: SyncReport,
}

/// Keeps the global snippets directory in sync with a remote collection.
pub struct SyncEngine {
    root: PathBuf,
    config: Config,
    store: Arc<dyn RemoteStore>,
    sink: Arc<dyn DiagnosticSink>,
}

impl SyncEngine {
    pub fn new(root: PathBuf, config: Config, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            root,
            config,
            store,
            sink: Arc::new(TracingSink),
        }
    }

    /// Build an engine talking to the gist API configured for `root`.
    pub fn from_config(root: PathBuf) -> Result<Self> {
        let config = Config::load(&root)?;
        let store = Arc::new(GistClient::from_config(&config)?);
        Ok(Self::new(root, config, store))
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Two-way sync with the own collection, creating it on first use.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _lock = SyncLock::acquire(&self.root)?;
        let files = list_snippet_files(&self.root);
        ledger::with_all_enabled(&files, || self.sync_enabled(&files)).await
    }

    /// Merge a collection into the local files without pushing anything.
    ///
    /// Defaults to the own collection when `collection_id` is `None`.
    pub async fn merge(&self, collection_id: Option<&str>) -> Result<SyncReport> {
        let _lock = SyncLock::acquire(&self.root)?;
        let files = list_snippet_files(&self.root);
        ledger::with_all_enabled(&files, || self.merge_enabled(&files, collection_id)).await
    }

    async fn sync_enabled(&self, files: &[SnippetFile]) -> Result<SyncReport> {
        let local = self.read_local(files).await;
        let mut state = SyncState::load(&self.root)?;

        let Some(id) = state.collection_id.clone() else {
            return self.create_collection(&local, state).await;
        };

        let remote = self.store.fetch(&id).await?;
        let plan = self.plan(SyncMode::Sync, &local, &remote, Some(&state));

        if !plan.remote_updates.is_empty() {
            self.store.update(&id, &plan.remote_updates).await?;
        }
        self.write_local(&plan.local_writes).await?;

        for (name, snippets) in &plan.records {
            state.record(name, snippets);
        }
        state.save(&self.root)?;

        Ok(plan.report)
    }

    async fn merge_enabled(
        &self,
        files: &[SnippetFile],
        collection_id: Option<&str>,
    ) -> Result<SyncReport> {
        let local = self.read_local(files).await;
        let state = SyncState::load(&self.root)?;

        let id = match collection_id {
            Some(id) => id.to_string(),
            None => state.collection_id.clone().ok_or_else(|| {
                SnippetError::NotConfigured("no collection to merge; run sync first".to_string())
            })?,
        };
        let own = state.collection_id.as_deref() == Some(id.as_str());

        let remote = self.store.fetch(&id).await?;
        let plan = self.plan(SyncMode::Merge, &local, &remote, own.then_some(&state));

        self.write_local(&plan.local_writes).await?;

        Ok(plan.report)
    }

    async fn create_collection(
        &self,
        local: &LocalSide,
        mut state: SyncState,
    ) -> Result<SyncReport> {
        if local.files.is_empty() {
            return Err(SnippetError::NotConfigured(format!(
                "no snippet files to sync in {}",
                self.root.display()
            )));
        }

        let files: BTreeMap<String, String> = local
            .files
            .iter()
            .map(|(name, file)| (name.clone(), file.upload_text()))
            .collect();

        let collection = self
            .store
            .create(&self.config.description, self.config.public, &files)
            .await?;

        state.collection_id = Some(collection.id.clone());
        for (name, file) in &local.files {
            state.record(name, &file.snippets);
        }
        state.save(&self.root)?;

        tracing::info!("Created collection {} with {} files", collection.id, files.len());

        Ok(SyncReport {
            collection_id: collection.id,
            created: true,
            html_url: collection.html_url,
            pushed: files.into_keys().collect(),
            skipped: local.skipped.iter().cloned().collect(),
            ..Default::default()
        })
    }

    async fn read_local(&self, files: &[SnippetFile]) -> LocalSide {
        let reads = join_all(
            files
                .iter()
                .map(|file| tokio::fs::read_to_string(&file.logical_path)),
        )
        .await;

        let mut local = LocalSide::default();
        for (file, read) in files.iter().zip(reads) {
            let Some(name) = file.name().map(str::to_string) else {
                continue;
            };
            let parsed = read
                .map_err(|e| e.to_string())
                .and_then(|raw| parse_snippets(&raw).map(|snippets| (raw, snippets)));
            match parsed {
                Ok((raw, snippets)) => {
                    local.files.insert(
                        name,
                        LocalFile {
                            path: file.logical_path.clone(),
                            raw,
                            snippets,
                        },
                    );
                }
                Err(message) => {
                    self.sink.report(
                        Diagnostic::warning(
                            DiagnosticKind::ParseFailure,
                            format!("left out of sync: {message}"),
                        )
                        .with_path(&file.logical_path),
                    );
                    local.skipped.insert(name);
                }
            }
        }
        local
    }

    fn plan(
        &self,
        mode: SyncMode,
        local: &LocalSide,
        remote: &RemoteCollection,
        base: Option<&SyncState>,
    ) -> Plan {
        let mut plan = Plan::default();
        plan.report.collection_id = remote.id.clone();
        plan.report.html_url = remote.html_url.clone();
        plan.report.skipped = local.skipped.iter().cloned().collect();

        let remote_names = remote.files.keys().filter(|name| {
            let keep = is_remote_snippet_name(name);
            if !keep {
                tracing::debug!("Ignoring remote file {}", name);
            }
            keep
        });
        let names: BTreeSet<&String> = local.files.keys().chain(remote_names).collect();

        for name in names {
            if local.skipped.contains(name) {
                continue;
            }

            let remote_raw = remote
                .files
                .get(name)
                .filter(|_| is_remote_snippet_name(name));
            let remote_file = match remote_raw {
                Some(raw) => match parse_snippets(raw) {
                    Ok(snippets) => Some((raw, snippets)),
                    Err(message) => {
                        self.sink.report(
                            Diagnostic::warning(
                                DiagnosticKind::ParseFailure,
                                format!("remote {name} left out of sync: {message}"),
                            )
                            .with_path(self.root.join(name)),
                        );
                        plan.report.skipped.push(name.clone());
                        continue;
                    }
                },
                None => None,
            };
            let record = base.and_then(|state| state.files.get(name.as_str()));

            match (local.files.get(name), remote_file) {
                (Some(l), None) => {
                    if mode == SyncMode::Sync {
                        plan.remote_updates.insert(name.clone(), l.upload_text());
                        plan.records.insert(name.clone(), l.snippets.clone());
                        plan.report.pushed.push(name.clone());
                    } else {
                        plan.report.unchanged += 1;
                    }
                }
                (None, Some((raw, snippets))) => {
                    plan.local_writes.push((self.root.join(name), raw.clone()));
                    plan.records.insert(name.clone(), snippets);
                    plan.report.pulled.push(name.clone());
                }
                (Some(l), Some((raw, snippets))) => {
                    self.plan_both(mode, name, l, raw, snippets, record, &mut plan);
                }
                (None, None) => {}
            }
        }

        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_both(
        &self,
        mode: SyncMode,
        name: &str,
        local: &LocalFile,
        remote_raw: &str,
        remote: SnippetMap,
        record: Option<&FileRecord>,
        plan: &mut Plan,
    ) {
        let local_hash = FileRecord::from_snippets(&local.snippets).hash;
        let remote_hash = FileRecord::from_snippets(&remote).hash;
        let base_hash = record.map(|r| r.hash.as_str());

        if local_hash == remote_hash {
            plan.records.insert(name.to_string(), remote);
            plan.report.unchanged += 1;
            return;
        }

        if base_hash == Some(local_hash.as_str()) {
            plan.local_writes
                .push((local.path.clone(), remote_raw.to_string()));
            plan.records.insert(name.to_string(), remote);
            plan.report.pulled.push(name.to_string());
            return;
        }

        if base_hash == Some(remote_hash.as_str()) {
            if mode == SyncMode::Sync {
                plan.remote_updates
                    .insert(name.to_string(), local.upload_text());
                plan.records
                    .insert(name.to_string(), local.snippets.clone());
                plan.report.pushed.push(name.to_string());
            } else {
                plan.report.unchanged += 1;
            }
            return;
        }

        // without a shared history nothing local is overwritten on merge
        let outcome = if mode == SyncMode::Merge && record.is_none() {
            MergeOutcome {
                merged: merge_renaming(local.snippets.clone(), remote),
                conflicts: Vec::new(),
            }
        } else {
            merge_snippets(record, &local.snippets, &remote)
        };
        for conflict in outcome.conflicts {
            self.sink.report(
                Diagnostic::warning(DiagnosticKind::MergeConflict, conflict.to_string())
                    .with_path(&local.path),
            );
            plan.report.conflicts.push(FileConflict {
                file: name.to_string(),
                conflict,
            });
        }

        let merged_hash = FileRecord::from_snippets(&outcome.merged).hash;
        let json = match to_json(&outcome.merged) {
            Ok(json) => json,
            Err(e) => {
                self.sink.report(
                    Diagnostic::error(DiagnosticKind::FileSystem, e.to_string())
                        .with_path(&local.path),
                );
                plan.report.skipped.push(name.to_string());
                return;
            }
        };

        if merged_hash != local_hash {
            plan.local_writes.push((local.path.clone(), json.clone()));
        }
        if mode == SyncMode::Sync && merged_hash != remote_hash {
            plan.remote_updates.insert(name.to_string(), json);
        }
        plan.records.insert(name.to_string(), outcome.merged);
        plan.report.merged.push(name.to_string());
    }

    async fn write_local(&self, writes: &[(PathBuf, String)]) -> Result<()> {
        let results = join_all(writes.iter().map(|(path, text)| write_text(path, text))).await;

        let mut first_error = None;
        for ((path, _), result) in writes.iter().zip(results) {
            if let Err(e) = result {
                self.sink.report(
                    Diagnostic::error(DiagnosticKind::FileSystem, e.to_string()).with_path(path),
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Remote file names that map onto a plain snippet file in the root.
fn is_remote_snippet_name(name: &str) -> bool {
    is_snippet_file_name(name)
        && !name.ends_with(DISABLED_SUFFIX)
        && Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;
    use crate::reader::read_file;
    use crate::remote::memory::MemoryStore;
    use std::fs;
    use std::sync::atomic::Ordering;

    fn engine(root: &Path, store: &Arc<MemoryStore>) -> (SyncEngine, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let engine = SyncEngine::new(root.to_path_buf(), Config::default(), store.clone())
            .with_sink(sink.clone());
        (engine, sink)
    }

    fn parse(json: &str) -> SnippetMap {
        parse_snippets(json).unwrap()
    }

    fn save_state(root: &Path, id: &str, files: &[(&str, &str)]) {
        let mut state = SyncState {
            collection_id: Some(id.to_string()),
            ..Default::default()
        };
        for (name, json) in files {
            state.record(name, &parse(json));
        }
        state.save(root).unwrap();
    }

    const FOO: &str = r#"{"foo": {"prefix": "foo", "body": "print('foo')"}}"#;
    const BAR: &str = r#"{"bar": {"prefix": "bar", "body": "print('bar')"}}"#;

    #[tokio::test]
    async fn test_first_sync_creates_collection() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("python.json"), FOO).unwrap();
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();

        assert!(report.created);
        assert_eq!(report.pushed, vec!["python.json"]);
        let state = SyncState::load(temp.path()).unwrap();
        assert_eq!(state.collection_id.as_deref(), Some(report.collection_id.as_str()));
        assert_eq!(store.files(&report.collection_id)["python.json"], FOO);
        assert!(!discover::lock_path(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_sync_unions_disjoint_titles_on_both_sides() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("python.json"), FOO).unwrap();
        save_state(temp.path(), "abc", &[]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("python.json", BAR)]);
        let (engine, sink) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();

        assert_eq!(report.merged, vec!["python.json"]);
        assert!(report.conflicts.is_empty());
        assert_eq!(sink.count(DiagnosticKind::MergeConflict), 0);

        let local = read_file(&temp.path().join("python.json")).await.unwrap();
        assert_eq!(local.keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
        let remote = parse(&store.files("abc")["python.json"]);
        assert_eq!(remote, local);
    }

    #[tokio::test]
    async fn test_sync_conflict_keeps_remote_and_reports() {
        let temp = tempfile::tempdir().unwrap();
        let base = r#"{"T": {"prefix": "t", "body": "base"}}"#;
        fs::write(
            temp.path().join("go.json"),
            r#"{"T": {"prefix": "t", "body": "A"}}"#,
        )
        .unwrap();
        save_state(temp.path(), "abc", &[("go.json", base)]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("go.json", r#"{"T": {"prefix": "t", "body": "B"}}"#)]);
        let (engine, sink) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].file, "go.json");
        assert_eq!(sink.count(DiagnosticKind::MergeConflict), 1);
        let local = read_file(&temp.path().join("go.json")).await.unwrap();
        assert_eq!(local["T"].body_text(), "B");
        // remote already held the merged result
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_and_pull_against_base() {
        let temp = tempfile::tempdir().unwrap();
        let old = r#"{"x": {"prefix": "x", "body": "old"}}"#;
        let pulled = r#"{"x": {"prefix": "x", "body": "remote edit"}}"#;
        let pushed = r#"{"y": {"prefix": "y", "body": "local edit"}}"#;
        fs::write(temp.path().join("pull.json"), old).unwrap();
        fs::write(temp.path().join("push.code-snippets"), pushed).unwrap();
        save_state(
            temp.path(),
            "abc",
            &[("pull.json", old), ("push.code-snippets", old)],
        );
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "abc",
            &[
                ("pull.json", pulled),
                ("push.code-snippets", old),
                ("README.md", "hi"),
            ],
        );
        let (engine, _) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();

        assert_eq!(report.pulled, vec!["pull.json"]);
        assert_eq!(report.pushed, vec!["push.code-snippets"]);
        assert_eq!(fs::read_to_string(temp.path().join("pull.json")).unwrap(), pulled);
        assert_eq!(store.files("abc")["push.code-snippets"], pushed);
        assert!(!temp.path().join("README.md").exists());

        let again = engine.sync().await.unwrap();
        assert_eq!(again.unchanged, 2);
        assert!(again.pushed.is_empty() && again.pulled.is_empty());
    }

    #[tokio::test]
    async fn test_remote_failure_leaves_local_untouched() {
        let temp = tempfile::tempdir().unwrap();
        let disabled = temp.path().join("python.json.disabled");
        fs::write(&disabled, FOO).unwrap();
        save_state(temp.path(), "abc", &[]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("python.json", BAR)]);
        store.fail_update.store(true, Ordering::SeqCst);
        let (engine, _) = engine(temp.path(), &store);

        let result = engine.sync().await;

        assert!(matches!(result, Err(SnippetError::Remote(_))));
        assert_eq!(fs::read_to_string(&disabled).unwrap(), FOO);
        assert!(!temp.path().join("python.json").exists());
        assert!(SyncState::load(temp.path()).unwrap().files.is_empty());
        assert!(!discover::lock_path(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_disabled_files_take_part_and_stay_disabled() {
        let temp = tempfile::tempdir().unwrap();
        let disabled = temp.path().join("python.json.disabled");
        fs::write(&disabled, FOO).unwrap();
        save_state(temp.path(), "abc", &[]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("python.json", BAR)]);
        let (engine, _) = engine(temp.path(), &store);

        engine.sync().await.unwrap();

        assert!(!temp.path().join("python.json").exists());
        let local = read_file(&disabled).await.unwrap();
        assert_eq!(local.keys().collect::<Vec<_>>(), vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_locked() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(temp.path(), &store);

        let _held = SyncLock::acquire(temp.path()).unwrap();
        match engine.sync().await {
            Err(SnippetError::SyncInProgress(path)) => {
                assert_eq!(path, discover::lock_path(temp.path()))
            }
            other => panic!("expected SyncInProgress, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_abandoned_lock_is_taken_over_once_stale() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("python.json"), FOO).unwrap();
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(temp.path(), &store);

        // a run that died without releasing its lock
        std::mem::forget(SyncLock::acquire(temp.path()).unwrap());
        assert!(matches!(
            engine.sync().await,
            Err(SnippetError::SyncInProgress(_))
        ));

        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            - STALE_LOCK_SECS
            - 1;
        fs::write(
            discover::lock_path(temp.path()),
            serde_json::to_string(&LockInfo { pid: 1, started_at }).unwrap(),
        )
        .unwrap();

        let report = engine.sync().await.unwrap();
        assert!(report.created);
        assert!(!discover::lock_path(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_local_untouched() {
        let temp = tempfile::tempdir().unwrap();
        let disabled = temp.path().join("python.json.disabled");
        fs::write(&disabled, FOO).unwrap();
        save_state(temp.path(), "abc", &[]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("python.json", BAR), ("go.json", BAR)]);
        store.fail_fetch.store(true, Ordering::SeqCst);
        let (engine, _) = engine(temp.path(), &store);

        assert!(matches!(engine.sync().await, Err(SnippetError::Remote(_))));
        assert!(matches!(
            engine.merge(Some("abc")).await,
            Err(SnippetError::Remote(_))
        ));

        assert_eq!(fs::read_to_string(&disabled).unwrap(), FOO);
        assert!(!temp.path().join("python.json").exists());
        assert!(!temp.path().join("go.json").exists());
        assert!(SyncState::load(temp.path()).unwrap().files.is_empty());
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
        assert!(!discover::lock_path(temp.path()).exists());
    }

    #[tokio::test]
    async fn test_empty_local_file_is_sent_as_empty_object() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("go.json"), "").unwrap();
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();
        assert_eq!(store.files(&report.collection_id)["go.json"], "{}");

        fs::write(temp.path().join("rust.json"), "  \n").unwrap();
        let again = engine.sync().await.unwrap();
        assert_eq!(again.pushed, vec!["rust.json"]);
        assert_eq!(again.unchanged, 1);
        assert_eq!(store.files(&report.collection_id)["rust.json"], "{}");
    }

    #[tokio::test]
    async fn test_merge_pulls_without_pushing() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("python.json"), FOO).unwrap();
        fs::write(temp.path().join("mine.code-snippets"), BAR).unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "other",
            &[("python.json", BAR), ("theirs.code-snippets", FOO)],
        );
        let (engine, _) = engine(temp.path(), &store);

        let report = engine.merge(Some("other")).await.unwrap();

        assert_eq!(report.merged, vec!["python.json"]);
        assert_eq!(report.pulled, vec!["theirs.code-snippets"]);
        assert_eq!(report.unchanged, 1);
        assert_eq!(store.updates.load(Ordering::SeqCst), 0);
        assert!(!store.files("other").contains_key("mine.code-snippets"));
        assert!(temp.path().join("theirs.code-snippets").exists());
        assert!(SyncState::load(temp.path()).unwrap().collection_id.is_none());
    }

    #[tokio::test]
    async fn test_merge_from_foreign_collection_keeps_local_titles() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join("python.json"),
            r#"{"log": {"prefix": "log", "body": "MY LOCAL"}}"#,
        )
        .unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "other",
            &[("python.json", r#"{"log": {"prefix": "log", "body": "THEIRS"}}"#)],
        );
        let (engine, sink) = engine(temp.path(), &store);

        let report = engine.merge(Some("other")).await.unwrap();

        assert!(report.conflicts.is_empty());
        assert_eq!(sink.count(DiagnosticKind::MergeConflict), 0);
        let local = read_file(&temp.path().join("python.json")).await.unwrap();
        assert_eq!(local.keys().collect::<Vec<_>>(), vec!["log", "log1"]);
        assert_eq!(local["log"].body_text(), "MY LOCAL");
        assert_eq!(local["log1"].body_text(), "THEIRS");
    }

    #[tokio::test]
    async fn test_merge_without_collection_is_not_configured() {
        let temp = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let (engine, _) = engine(temp.path(), &store);

        assert!(matches!(
            engine.merge(None).await,
            Err(SnippetError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_unparsable_local_file_is_left_alone() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("go.json"), "{ broken").unwrap();
        save_state(temp.path(), "abc", &[]);
        let store = Arc::new(MemoryStore::new());
        store.insert("abc", &[("go.json", FOO)]);
        let (engine, sink) = engine(temp.path(), &store);

        let report = engine.sync().await.unwrap();

        assert_eq!(report.skipped, vec!["go.json"]);
        assert_eq!(sink.count(DiagnosticKind::ParseFailure), 1);
        assert_eq!(fs::read_to_string(temp.path().join("go.json")).unwrap(), "{ broken");
    }
}
