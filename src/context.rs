//! Durable per-user workspace context.
//!
//! Every read goes to the backing store; nothing is cached in-process, so a
//! value written by one command is visible to the next command that runs,
//! whichever task or process executes it.

#![allow(async_fn_in_trait)]

mod postgres;
mod sqlite;

use std::fmt::Display;
use std::time::Duration;

use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use chrono::DateTime;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::config::Config;
use postgres::PostgresBackend;
use sqlite::SqliteBackend;

/// Branch assumed until the user picks one
pub const DEFAULT_BRANCH: &str = "main";

/// Commit message template; `{action}` and `{filename}` are substituted
pub const DEFAULT_COMMIT_MESSAGE: &str = "{action} {filename}";

pub const MAX_PREFIX_LEN: usize = 3;

/// How long to wait for the networked store before falling back
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// -----------------------------------------------------------------------------
// Types

/// Chat-platform identity of the user issuing a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

impl UserId {
    /// Both stores use signed 64-bit keys; the cast round-trips bit-for-bit.
    pub(crate) fn as_db(self) -> i64 {
        self.0 as i64
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The repository, branch, commit message and prefix a user works against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: UserId,
    /// Owner-qualified repository name
    pub default_repo: String,
    pub current_branch: String,
    pub commit_message: String,
    pub preferred_prefix: String,
    /// Unset when the user has never saved anything
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserContext {
    /// Expand the commit message template for a file operation
    pub fn commit_message_for(&self, action: &str, filename: &str) -> String {
        self.commit_message
            .replace("{action}", action)
            .replace("{filename}", filename)
    }
}

/// Values used for any setting a user has not stored.
#[derive(Debug, Clone)]
pub struct ContextDefaults {
    pub default_repo: String,
    pub default_prefix: String,
}

impl ContextDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_repo: config.default_repo.clone(),
            default_prefix: config.default_prefix.clone(),
        }
    }

    pub fn context_for(&self, user_id: UserId) -> UserContext {
        UserContext {
            user_id,
            default_repo: self.default_repo.clone(),
            current_branch: DEFAULT_BRANCH.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            preferred_prefix: self.default_prefix.clone(),
            created_at: None,
            updated_at: None,
        }
    }

    fn apply(&self, user_id: UserId, stored: StoredSettings) -> UserContext {
        let defaults = self.context_for(user_id);
        let pick = |value: Option<String>, default: String| {
            value.filter(|v| !v.trim().is_empty()).unwrap_or(default)
        };
        UserContext {
            user_id,
            default_repo: pick(stored.default_repo, defaults.default_repo),
            current_branch: pick(stored.current_branch, defaults.current_branch),
            commit_message: pick(stored.commit_message, defaults.commit_message),
            preferred_prefix: pick(stored.preferred_prefix, defaults.preferred_prefix),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

/// A writable column of `user_settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DefaultRepo,
    CurrentBranch,
    CommitMessage,
    PreferredPrefix,
}

impl Field {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::DefaultRepo => "default_repo",
            Self::CurrentBranch => "current_branch",
            Self::CommitMessage => "commit_message",
            Self::PreferredPrefix => "preferred_prefix",
        }
    }

    pub fn validate(self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            bail!("{} cannot be empty", self.column());
        }
        if self == Self::PreferredPrefix && value.chars().count() > MAX_PREFIX_LEN {
            bail!("Prefix must be {} characters or less", MAX_PREFIX_LEN);
        }
        Ok(())
    }
}

/// A `user_settings` row as stored; any column may be NULL.
#[derive(Debug, Default)]
pub(crate) struct StoredSettings {
    pub default_repo: Option<String>,
    pub current_branch: Option<String>,
    pub commit_message: Option<String>,
    pub preferred_prefix: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Something a user did to a repository, kept for `history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoAction {
    pub repo: String,
    pub action: String,
    pub filename: Option<String>,
}

impl RepoAction {
    pub fn new(repo: &str, action: &str, filename: Option<&str>) -> Self {
        Self {
            repo: repo.to_string(),
            action: action.to_string(),
            filename: filename.map(str::to_string),
        }
    }
}

/// One handled command, kept for `stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub command: String,
    pub arguments: String,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub repo_name: String,
    pub action: String,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub total_commands: i64,
    pub successful: i64,
    pub unique_repos: i64,
    pub last_active: Option<DateTime<Utc>>,
}

impl UsageStats {
    pub fn failed(&self) -> i64 {
        self.total_commands - self.successful
    }
}

// -----------------------------------------------------------------------------
// Traits

/// Storage operations shared by the networked and embedded backends.
pub(crate) trait SettingsBackend {
    async fn fetch(&self, user_id: UserId) -> Result<Option<StoredSettings>>;
    async fn upsert(&self, user_id: UserId, field: Field, value: &str) -> Result<()>;
    async fn insert_repo_action(&self, user_id: UserId, action: &RepoAction) -> Result<()>;
    async fn insert_command(&self, user_id: UserId, record: &CommandRecord) -> Result<()>;
    async fn repo_history(&self, user_id: UserId, limit: u32) -> Result<Vec<ActivityEntry>>;
    async fn usage_stats(&self, user_id: UserId) -> Result<UsageStats>;
}

/// Per-user context and activity, as seen by the services.
#[cfg_attr(test, automock)]
pub trait ContextOps {
    /// Fresh, fully-defaulted context; store failures degrade to defaults.
    async fn get(&self, user_id: UserId) -> UserContext;

    /// Upsert a single setting.
    async fn set_field(&self, user_id: UserId, field: Field, value: &str) -> Result<()>;

    /// Append to the repository history; failures are logged, not returned.
    async fn record_repo_action(&self, user_id: UserId, action: RepoAction);

    /// Append to the command log; failures are logged, not returned.
    async fn record_command(&self, user_id: UserId, record: CommandRecord);

    /// Most recent repository actions, newest first.
    async fn history(&self, user_id: UserId, limit: u32) -> Result<Vec<ActivityEntry>>;

    async fn stats(&self, user_id: UserId) -> Result<UsageStats>;
}

// -----------------------------------------------------------------------------
// ContextStore

enum Backend {
    Postgres(PostgresBackend),
    Sqlite(SqliteBackend),
}

/// Run `$call` against whichever backend is active.
macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match &$self.backend {
            Some(Backend::Postgres($backend)) => $call,
            Some(Backend::Sqlite($backend)) => $call,
            None => Err(anyhow!("Settings store unavailable")),
        }
    };
}

/// Settings store backed by PostgreSQL when configured and reachable,
/// otherwise by an embedded SQLite file.
pub struct ContextStore {
    defaults: ContextDefaults,
    backend: Option<Backend>,
}

impl ContextStore {
    pub fn new(defaults: ContextDefaults) -> Self {
        Self {
            defaults,
            backend: None,
        }
    }

    /// Open a backend, preferring the networked one. Returns whether any
    /// backend is usable.
    #[instrument(skip_all)]
    pub async fn initialize(&mut self, config: &Config) -> bool {
        if let Some(url) = &config.database_url {
            match tokio::time::timeout(CONNECT_TIMEOUT, PostgresBackend::connect(url)).await {
                Ok(Ok(backend)) => {
                    info!("Using PostgreSQL settings store");
                    self.backend = Some(Backend::Postgres(backend));
                    return true;
                }
                Ok(Err(err)) => warn!("PostgreSQL unavailable, falling back to SQLite: {:#}", err),
                Err(_) => warn!("PostgreSQL connect timed out, falling back to SQLite"),
            }
        }

        match SqliteBackend::open(&config.sqlite_path) {
            Ok(backend) => {
                info!(path = %config.sqlite_path, "Using SQLite settings store");
                self.backend = Some(Backend::Sqlite(backend));
                true
            }
            Err(err) => {
                warn!("SQLite unavailable, running on defaults only: {:#}", err);
                self.backend = None;
                false
            }
        }
    }

    /// Name of the active backend, if any
    pub fn backend_name(&self) -> Option<&'static str> {
        match &self.backend {
            Some(Backend::Postgres(_)) => Some("postgres"),
            Some(Backend::Sqlite(_)) => Some("sqlite"),
            None => None,
        }
    }

    pub fn defaults(&self) -> &ContextDefaults {
        &self.defaults
    }

    /// Release the backend. Safe to call at any time, including repeatedly.
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            debug!("Settings store closed");
        }
    }
}

impl ContextOps for ContextStore {
    #[instrument(skip(self))]
    async fn get(&self, user_id: UserId) -> UserContext {
        if self.backend.is_none() {
            return self.defaults.context_for(user_id);
        }
        match dispatch!(self, b => b.fetch(user_id).await) {
            Ok(Some(stored)) => self.defaults.apply(user_id, stored),
            Ok(None) => self.defaults.context_for(user_id),
            Err(err) => {
                warn!("Failed to read settings for {}: {:#}", user_id, err);
                self.defaults.context_for(user_id)
            }
        }
    }

    #[instrument(skip(self))]
    async fn set_field(&self, user_id: UserId, field: Field, value: &str) -> Result<()> {
        field.validate(value)?;
        dispatch!(self, b => b.upsert(user_id, field, value).await)
    }

    async fn record_repo_action(&self, user_id: UserId, action: RepoAction) {
        if let Err(err) = dispatch!(self, b => b.insert_repo_action(user_id, &action).await) {
            warn!("Failed to record repository action for {}: {:#}", user_id, err);
        }
    }

    async fn record_command(&self, user_id: UserId, record: CommandRecord) {
        if let Err(err) = dispatch!(self, b => b.insert_command(user_id, &record).await) {
            warn!("Failed to record command for {}: {:#}", user_id, err);
        }
    }

    async fn history(&self, user_id: UserId, limit: u32) -> Result<Vec<ActivityEntry>> {
        let limit = limit.clamp(1, 50);
        dispatch!(self, b => b.repo_history(user_id, limit).await)
    }

    async fn stats(&self, user_id: UserId) -> Result<UsageStats> {
        dispatch!(self, b => b.usage_stats(user_id).await)
    }
}
