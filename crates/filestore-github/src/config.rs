use std::fmt;
use std::time::Duration;

use filestore_core::StorageError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`crate::GitHubRepository`].
#[derive(Clone)]
pub struct GitHubConfig {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Personal access or installation token
    pub token: String,
    /// Directory inside the repository every path is scoped to ("" for the root)
    pub base_dir: String,
    /// API endpoint (GitHub Enterprise installs use `https://host/api/v3`)
    pub api_url: String,
    pub user_agent: String,
    /// Branch used by `commit_tree` when none is given
    pub default_branch: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            base_dir: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            user_agent: format!("filestore/{}", env!("CARGO_PKG_VERSION")),
            default_branch: DEFAULT_BRANCH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<String>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations that cannot possibly authenticate.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.token.trim().is_empty() {
            return Err(StorageError::Validation(
                "GitHub token is required".to_string(),
            ));
        }
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(StorageError::Validation(
                "GitHub owner and repository are required".to_string(),
            ));
        }
        if self.base_dir.split('/').any(|s| s == "..") {
            return Err(StorageError::Validation(format!(
                "Base directory \"{}\" must not contain \"..\"",
                self.base_dir
            )));
        }
        Ok(())
    }
}

// Hand-written so the token never ends up in logs.
impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .field("base_dir", &self.base_dir)
            .field("api_url", &self.api_url)
            .field("user_agent", &self.user_agent)
            .field("default_branch", &self.default_branch)
            .field("timeout", &self.timeout)
            .finish()
    }
}
