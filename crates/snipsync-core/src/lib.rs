//! snipsync-core: Snippet discovery and synchronization library
//!
//! This library locates code-editor snippet files across global, workspace and
//! extension scopes, reads them, and keeps the global set in sync with a remote
//! gist collection.

pub mod config;
pub mod consts;
pub mod diagnostics;
pub mod discover;
pub mod edit;
pub mod ledger;
pub mod locate;
pub mod merge;
pub mod reader;
pub mod remote;
pub mod snippet;
pub mod state;
pub mod sync;
pub mod transfer;

pub use config::Config;
pub use consts::*;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
pub use locate::{LocateContext, LocatedFile, locate};
pub use reader::{ParsedFile, read_all};
pub use remote::{GistClient, RemoteCollection, RemoteStore};
pub use snippet::{OneOrMany, Snippet, SnippetFile, SnippetKind, SnippetMap};
pub use sync::{SyncEngine, SyncReport};

#[derive(Debug, thiserror::Error)]
pub enum SnippetError {
    #[error("Not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("Parse error in {path}: {message}")]
    Parse {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("A sync is already running (lock file {0}); delete it if no sync is running")]
    SyncInProgress(std::path::PathBuf),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid gist identifier: {0}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SnippetError>;
