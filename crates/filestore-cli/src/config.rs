use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};
use filestore_github::{GitHubConfig, DEFAULT_API_URL, DEFAULT_BRANCH};
use filestore_local::LocalConfig;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Sandboxed directory on this machine
    Local,
    /// Directory inside a GitHub repository
    Github,
}

/// Backend selection and connection settings.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Storage backend
    #[arg(long, value_enum, default_value_t = BackendKind::Local, env = "FILESTORE_BACKEND")]
    pub backend: BackendKind,

    /// Root directory of the local backend
    #[arg(long, default_value = "./data", env = "FILESTORE_ROOT")]
    pub root: PathBuf,

    /// GitHub repository owner
    #[arg(long, env = "FILESTORE_GITHUB_OWNER")]
    pub github_owner: Option<String>,

    /// GitHub repository name
    #[arg(long, env = "FILESTORE_GITHUB_REPO")]
    pub github_repo: Option<String>,

    /// GitHub token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory inside the repository all paths are scoped to
    #[arg(long, default_value = "", env = "FILESTORE_GITHUB_BASE_DIR")]
    pub github_base_dir: String,

    /// GitHub API endpoint
    #[arg(long, default_value = DEFAULT_API_URL, env = "FILESTORE_GITHUB_API_URL")]
    pub github_api_url: String,

    /// Branch used by multi-file commits
    #[arg(long, default_value = DEFAULT_BRANCH, env = "FILESTORE_GITHUB_BRANCH")]
    pub github_branch: String,

    /// Per-call timeout in seconds
    #[arg(long, default_value = "30", env = "FILESTORE_TIMEOUT_SECS")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn local_config(&self) -> LocalConfig {
        LocalConfig::new(self.root.clone())
    }

    pub fn github_config(&self) -> anyhow::Result<GitHubConfig> {
        let owner = self
            .github_owner
            .clone()
            .context("--github-owner (FILESTORE_GITHUB_OWNER) is required for the github backend")?;
        let repo = self
            .github_repo
            .clone()
            .context("--github-repo (FILESTORE_GITHUB_REPO) is required for the github backend")?;
        let token = self
            .github_token
            .clone()
            .context("--github-token (GITHUB_TOKEN) is required for the github backend")?;

        let mut config = GitHubConfig::new(owner, repo, token)
            .with_base_dir(self.github_base_dir.clone())
            .with_api_url(self.github_api_url.clone())
            .with_timeout(self.timeout());
        config.default_branch = self.github_branch.clone();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn defaults_to_local() {
        let cli = TestCli::parse_from(["filestore", "--root", "/tmp/store"]);
        assert_eq!(cli.config.backend, BackendKind::Local);
        assert_eq!(cli.config.local_config().root, PathBuf::from("/tmp/store"));
    }

    #[test]
    fn github_requires_credentials() {
        let cli = TestCli::parse_from([
            "filestore",
            "--backend",
            "github",
            "--github-owner",
            "octo",
            "--github-repo",
            "notes",
            "--github-token",
            "tkn",
            "--github-base-dir",
            "docs",
        ]);
        let config = cli.config.github_config().unwrap();
        assert_eq!(config.owner, "octo");
        assert_eq!(config.base_dir, "docs");
        assert_eq!(config.timeout, Duration::from_secs(30));

        let cli = TestCli::parse_from(["filestore", "--backend", "github", "--github-token", "t"]);
        assert!(cli.config.github_config().is_err());
    }
}
