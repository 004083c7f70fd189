use anyhow::Context;
use anyhow::Result;

/// Default GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default command prefix offered to new users
pub const DEFAULT_PREFIX: &str = "--";

/// Repository name used when a user has not picked one
pub const DEFAULT_REPO_NAME: &str = "discord-projects";

/// Embedded store location when no path is configured
pub const DEFAULT_SQLITE_PATH: &str = "gitbot.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_api_url: String,
    pub github_token: String,
    /// Account that owns repositories referred to without an owner
    pub github_owner: String,
    /// Owner-qualified global default repository
    pub default_repo: String,
    pub default_prefix: String,
    pub database_url: Option<String>,
    pub sqlite_path: String,
}

impl Config {
    /// Load config from the environment
    pub fn load() -> Result<Self> {
        let github_token =
            std::env::var("GITHUB_TOKEN").context("GITHUB_TOKEN is not set in the environment")?;
        let github_owner =
            std::env::var("GITHUB_OWNER").context("GITHUB_OWNER is not set in the environment")?;
        let github_api_url =
            std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let default_repo =
            std::env::var("DEFAULT_REPO").unwrap_or_else(|_| DEFAULT_REPO_NAME.to_string());
        let default_prefix =
            std::env::var("DEFAULT_PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string());
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let sqlite_path =
            std::env::var("GITBOT_SQLITE_PATH").unwrap_or_else(|_| DEFAULT_SQLITE_PATH.to_string());

        let mut config = Self::new(github_token, github_owner);
        config.github_api_url = github_api_url;
        config.default_repo = config.qualify_repo(&default_repo);
        config.default_prefix = default_prefix;
        config.database_url = database_url;
        config.sqlite_path = sqlite_path;
        Ok(config)
    }

    /// Create a new config with explicit values (useful for tests)
    pub fn new(github_token: String, github_owner: String) -> Self {
        let default_repo = format!("{}/{}", github_owner, DEFAULT_REPO_NAME);
        Self {
            github_api_url: DEFAULT_API_URL.to_string(),
            github_token,
            github_owner,
            default_repo,
            default_prefix: DEFAULT_PREFIX.to_string(),
            database_url: None,
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
        }
    }

    /// Default config for tests
    pub fn default_for_tests() -> Self {
        let mut config = Self::new("test-token".to_string(), "octo".to_string());
        config.sqlite_path = ":memory:".to_string();
        config
    }

    /// Prefix `name` with the configured owner unless it already names one
    pub fn qualify_repo(&self, name: &str) -> String {
        if name.contains('/') {
            name.to_string()
        } else {
            format!("{}/{}", self.github_owner, name)
        }
    }
}
