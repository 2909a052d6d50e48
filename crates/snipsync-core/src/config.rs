//! Configuration handling for .snipsync/config.json

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_API_URL, DEFAULT_DESCRIPTION, DEFAULT_TOKEN_ENV, Result, discover};

/// Configuration stored in .snipsync/config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the remote gist API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Environment variable the API token is read from
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Description given to a collection created on first sync
    #[serde(default = "default_description")]
    pub description: String,

    /// Whether created collections are public
    #[serde(default)]
    pub public: bool,

    /// Only import `.code-snippets` files from a collection
    #[serde(default)]
    pub only_snippets: bool,

    /// Installed extensions directory (default: ~/.vscode/extensions)
    #[serde(default)]
    pub extensions_dir: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            description: default_description(),
            public: false,
            only_snippets: false,
            extensions_dir: None,
        }
    }
}

impl Config {
    /// Load config from the .snipsync directory.
    pub fn load(root: &Path) -> Result<Self> {
        let path = discover::config_path(root);
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the .snipsync directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = discover::config_path(root);
        std::fs::create_dir_all(discover::snipsync_dir(root))?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Read the API token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}
