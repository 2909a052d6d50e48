//! Remote snippet collections (GitHub gists)

use std::collections::BTreeMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Config, Result, SnippetError};

/// A named set of files stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCollection {
    pub id: String,
    pub html_url: Option<String>,
    /// File name -> content
    pub files: BTreeMap<String, String>,
}

/// Storage for remote snippet collections.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a collection holding `files`.
    async fn create(
        &self,
        description: &str,
        public: bool,
        files: &BTreeMap<String, String>,
    ) -> Result<RemoteCollection>;

    /// Fetch a collection with full file contents.
    async fn fetch(&self, id: &str) -> Result<RemoteCollection>;

    /// Add or replace `files` in a collection. Files not listed are untouched.
    async fn update(&self, id: &str, files: &BTreeMap<String, String>) -> Result<()>;
}

/// [`RemoteStore`] backed by the GitHub gist API.
pub struct GistClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Serialize)]
struct FileContent<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, FileContent<'a>>,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    files: BTreeMap<&'a str, FileContent<'a>>,
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    html_url: Option<String>,
    #[serde(default)]
    files: BTreeMap<String, Option<GistFile>>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

fn file_contents(files: &BTreeMap<String, String>) -> BTreeMap<&str, FileContent<'_>> {
    files
        .iter()
        .map(|(name, content)| (name.as_str(), FileContent { content }))
        .collect()
}

fn remote_err(e: reqwest::Error) -> SnippetError {
    SnippetError::Remote(e.to_string())
}

impl GistClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("snipsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(remote_err)?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Build a client from config, reading the token from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.token().ok_or_else(|| {
            SnippetError::NotConfigured(format!(
                "no API token; set the {} environment variable",
                config.token_env
            ))
        })?;
        Self::new(&config.api_url, token)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    async fn into_collection(&self, gist: GistResponse) -> Result<RemoteCollection> {
        let mut files = BTreeMap::new();
        for (name, file) in gist.files {
            let Some(file) = file else { continue };
            let content = match (file.truncated, file.raw_url, file.content) {
                (true, Some(raw_url), _) => self.fetch_raw(&raw_url).await?,
                (_, _, Some(content)) => content,
                _ => {
                    tracing::debug!("Gist {} file {} has no content", gist.id, name);
                    continue;
                }
            };
            files.insert(name, content);
        }

        Ok(RemoteCollection {
            id: gist.id,
            html_url: gist.html_url,
            files,
        })
    }

    async fn fetch_raw(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_err)?
            .text()
            .await
            .map_err(remote_err)
    }
}

#[async_trait]
impl RemoteStore for GistClient {
    async fn create(
        &self,
        description: &str,
        public: bool,
        files: &BTreeMap<String, String>,
    ) -> Result<RemoteCollection> {
        let body = CreateRequest {
            description,
            public,
            files: file_contents(files),
        };

        let gist: GistResponse = self
            .request(reqwest::Method::POST, "/gists")
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_err)?
            .json()
            .await
            .map_err(remote_err)?;

        tracing::info!("Created gist {}", gist.id);
        self.into_collection(gist).await
    }

    async fn fetch(&self, id: &str) -> Result<RemoteCollection> {
        let gist: GistResponse = self
            .request(reqwest::Method::GET, &format!("/gists/{id}"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_err)?
            .json()
            .await
            .map_err(remote_err)?;

        self.into_collection(gist).await
    }

    async fn update(&self, id: &str, files: &BTreeMap<String, String>) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let body = UpdateRequest {
            files: file_contents(files),
        };

        self.request(reqwest::Method::PATCH, &format!("/gists/{id}"))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_err)?;

        tracing::info!("Updated {} files in gist {}", files.len(), id);
        Ok(())
    }
}

static SHARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://gist\.github\.com/[\w-]+/([a-f0-9]+)").expect("valid regex")
});
static CLONE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://gist\.github\.com/([a-f0-9]+)\.git$").expect("valid regex")
});
static SSH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^git@gist\.github\.com:([a-f0-9]+)\.git$").expect("valid regex")
});
static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]+$").expect("valid regex"));

/// Extract a gist id from a share URL, clone URL, SSH URL or bare id.
pub fn extract_gist_id(identifier: &str) -> Result<String> {
    let identifier = identifier.trim();

    for pattern in [&*SHARE_URL, &*CLONE_URL, &*SSH_URL] {
        if let Some(id) = pattern.captures(identifier).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if BARE_ID.is_match(identifier) {
        return Ok(identifier.to_string());
    }

    Err(SnippetError::InvalidIdentifier(identifier.to_string()))
}
