/// The name of the snipsync metadata folder inside a snippets directory
pub const SNIPSYNC_DIR: &str = ".snipsync";

/// Suffix appended to a snippet file name while it is disabled
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Extension of multi-language snippet bundles
pub const BUNDLE_EXTENSION: &str = "code-snippets";

/// Extension of per-language snippet files
pub const LANGUAGE_EXTENSION: &str = "json";

/// Per-project editor config folder searched for workspace snippets
pub const WORKSPACE_CONFIG_DIR: &str = ".vscode";

/// Default remote API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default environment variable holding the remote API token
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default description given to collections created by sync
pub const DEFAULT_DESCRIPTION: &str = "Global code snippets managed by snipsync";

/// Age after which a leftover sync lock is treated as abandoned
pub const STALE_LOCK_SECS: u64 = 600;
