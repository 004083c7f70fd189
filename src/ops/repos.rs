use serde_json::json;
use tracing::instrument;

use super::repo_path;
use crate::clients::github::ApiResponse;
use crate::clients::github::GithubOps;
use crate::clients::github::Method;
use crate::config::Config;
use crate::context::ContextOps;
use crate::context::DEFAULT_BRANCH;
use crate::context::Field;
use crate::context::RepoAction;
use crate::context::UserContext;
use crate::context::UserId;
use crate::error::Done;
use crate::error::OpError;
use crate::error::OpResult;
use crate::sanitize::sanitize_filename;

const REPO_DESCRIPTION: &str = "Created with gitbot";

/// What GitHub reports about a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    pub full_name: String,
    pub html_url: String,
    pub default_branch: String,
}

impl RepoInfo {
    fn from_response(resp: &ApiResponse, fallback_name: &str) -> Self {
        Self {
            full_name: resp
                .str_field("full_name")
                .unwrap_or(fallback_name)
                .to_string(),
            html_url: resp.str_field("html_url").unwrap_or_default().to_string(),
            default_branch: resp
                .str_field("default_branch")
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
        }
    }
}

/// Selection and creation of the user's current repository.
pub struct Repos<'a, C, H> {
    ctx: &'a C,
    gh: &'a H,
    config: &'a Config,
}

impl<'a, C: ContextOps, H: GithubOps> Repos<'a, C, H> {
    pub fn new(ctx: &'a C, gh: &'a H, config: &'a Config) -> Self {
        Self { ctx, gh, config }
    }

    /// The user's stored repository and branch, read fresh.
    pub async fn current(&self, user_id: UserId) -> OpResult<UserContext> {
        let ctx = self.ctx.get(user_id).await;
        let mut message = format!(
            "Current repository: `{}` on branch `{}`",
            ctx.default_repo, ctx.current_branch
        );
        if ctx.default_repo == self.config.default_repo {
            message.push_str(" (default)");
        }
        Ok(Done::new(message, ctx))
    }

    /// Resolve `name`, owner-qualified with the configured owner when bare.
    #[instrument(skip(self))]
    pub async fn lookup(&self, name: &str) -> OpResult<RepoInfo> {
        let full_name = self.qualify(name)?;
        let resp = self
            .gh
            .request(Method::Get, &repo_path(&full_name), None)
            .await;
        match resp.status {
            200 => {}
            404 => {
                return Err(OpError::NotFound(format!(
                    "Repository `{}` not found",
                    full_name
                )));
            }
            _ => return Err(OpError::from_response(&resp)),
        }

        let info = RepoInfo::from_response(&resp, &full_name);
        let message = format!("Found `{}`", info.full_name);
        Ok(Done::new(message, info).with_rate_limit(resp.rate_limit))
    }

    /// Select `repo` and reset the branch to its default branch.
    #[instrument(skip(self))]
    pub async fn switch_existing(&self, user_id: UserId, repo: &RepoInfo) -> OpResult {
        self.select(user_id, repo, "switch").await?;
        Ok(Done::message(format!(
            "Switched to `{}` on branch `{}`\n{}",
            repo.full_name, repo.default_branch, repo.html_url
        )))
    }

    /// Create a repository for the authenticated account and select it.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: UserId, name: &str, private: bool) -> OpResult<RepoInfo> {
        let name = sanitize_filename(name);
        if name.is_empty() {
            return Err(OpError::InvalidInput(
                "Repository name cannot be empty".to_string(),
            ));
        }

        let payload = json!({
            "name": name,
            "private": private,
            "auto_init": true,
            "description": REPO_DESCRIPTION,
        });
        let resp = self
            .gh
            .request(Method::Post, "/user/repos", Some(payload))
            .await;
        match resp.status {
            201 => {}
            422 if resp.message().to_lowercase().contains("already exists") => {
                return Err(OpError::AlreadyExists(format!(
                    "Repository `{}` already exists",
                    name
                )));
            }
            _ => return Err(OpError::from_response(&resp)),
        }

        let info = RepoInfo::from_response(&resp, &self.config.qualify_repo(&name));
        self.select(user_id, &info, "create").await?;
        let visibility = if private { "private" } else { "public" };
        let message = format!(
            "Created {} repository `{}` and switched to it\n{}",
            visibility, info.full_name, info.html_url
        );
        Ok(Done::new(message, info).with_rate_limit(resp.rate_limit))
    }

    async fn select(&self, user_id: UserId, repo: &RepoInfo, action: &str) -> Result<(), OpError> {
        let unsaved =
            |err: anyhow::Error| OpError::Transient(format!("Could not save repository selection: {:#}", err));
        self.ctx
            .set_field(user_id, Field::DefaultRepo, &repo.full_name)
            .await
            .map_err(unsaved)?;
        self.ctx
            .set_field(user_id, Field::CurrentBranch, &repo.default_branch)
            .await
            .map_err(unsaved)?;
        self.ctx
            .record_repo_action(user_id, RepoAction::new(&repo.full_name, action, None))
            .await;
        Ok(())
    }

    fn qualify(&self, name: &str) -> Result<String, OpError> {
        let qualified = self.config.qualify_repo(name.trim());
        let (owner, repo) = qualified
            .split_once('/')
            .map(|(owner, repo)| (sanitize_filename(owner), sanitize_filename(repo)))
            .unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return Err(OpError::InvalidInput(format!(
                "`{}` is not a repository name",
                name
            )));
        }
        Ok(format!("{}/{}", owner, repo))
    }
}
