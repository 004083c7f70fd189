use serde_json::Value;
use serde_json::json;
use tracing::instrument;
use tracing::warn;

use super::repo_path;
use super::selected_context;
use crate::clients::github::GithubOps;
use crate::clients::github::Method;
use crate::clients::github::RateLimit;
use crate::config::Config;
use crate::context::ContextOps;
use crate::context::Field;
use crate::context::RepoAction;
use crate::context::UserContext;
use crate::context::UserId;
use crate::error::Done;
use crate::error::OpError;
use crate::error::OpResult;
use crate::sanitize::validate_branch_name;

/// Branches new branches are cut from, in order of preference
const BASE_BRANCHES: &[&str] = &["main", "master"];

/// Branch operations on the user's current repository.
pub struct Branches<'a, C, H> {
    ctx: &'a C,
    gh: &'a H,
    config: &'a Config,
}

impl<'a, C: ContextOps, H: GithubOps> Branches<'a, C, H> {
    pub fn new(ctx: &'a C, gh: &'a H, config: &'a Config) -> Self {
        Self { ctx, gh, config }
    }

    /// Names of the repository's branches (first page of 100).
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> OpResult<Vec<String>> {
        let ctx = selected_context(self.ctx, self.config, user_id).await?;
        let (names, rate_limit) = self.branch_names(&ctx).await?;
        let message = format!("{} branches in `{}`", names.len(), ctx.default_repo);
        Ok(Done::new(message, names).with_rate_limit(rate_limit))
    }

    /// Create `name` from the tip of the base branch and switch to it.
    #[instrument(skip(self))]
    pub async fn create(&self, user_id: UserId, name: &str) -> OpResult {
        validate_branch_name(name).map_err(OpError::InvalidInput)?;
        let ctx = selected_context(self.ctx, self.config, user_id).await?;
        let (base, sha) = self.base_tip(&ctx).await?;

        let payload = json!({
            "ref": format!("refs/heads/{}", name),
            "sha": sha,
        });
        let path = format!("{}/git/refs", repo_path(&ctx.default_repo));
        let resp = self.gh.request(Method::Post, &path, Some(payload)).await;
        match resp.status {
            201 => {}
            422 if resp.message().to_lowercase().contains("already exists") => {
                return Err(OpError::AlreadyExists(format!(
                    "Branch `{}` already exists in `{}`",
                    name, ctx.default_repo
                )));
            }
            _ => return Err(OpError::from_response(&resp)),
        }

        // The ref already exists on GitHub; a failed write only leaves the old branch selected
        let switched = match self.ctx.set_field(user_id, Field::CurrentBranch, name).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Created branch {} but could not switch to it: {:#}", name, err);
                false
            }
        };
        self.ctx
            .record_repo_action(
                user_id,
                RepoAction::new(&ctx.default_repo, "create_branch", Some(name)),
            )
            .await;
        let created = format!(
            "Branch `{}` created from `{}` in `{}`",
            name, base, ctx.default_repo
        );
        let message = if switched {
            format!("{} and checked out", created)
        } else {
            format!(
                "{}, but could not switch to it. Still on `{}`.",
                created, ctx.current_branch
            )
        };
        Ok(Done::message(message).with_rate_limit(resp.rate_limit))
    }

    /// Make an existing branch the user's current branch. Nothing changes
    /// on GitHub.
    #[instrument(skip(self))]
    pub async fn switch_existing(&self, user_id: UserId, name: &str) -> OpResult {
        let listed = self.list(user_id).await?;
        self.switch_listed(user_id, name, listed).await
    }

    /// Like [`Self::switch_existing`], checking `name` against a listing the
    /// caller already fetched with [`Self::list`].
    #[instrument(skip(self, listed))]
    pub async fn switch_listed(
        &self,
        user_id: UserId,
        name: &str,
        listed: Done<Vec<String>>,
    ) -> OpResult {
        let ctx = selected_context(self.ctx, self.config, user_id).await?;
        if !listed.value.iter().any(|branch| branch == name) {
            return Err(OpError::NotFound(format!(
                "Branch `{}` does not exist in `{}`",
                name, ctx.default_repo
            )));
        }

        self.ctx
            .set_field(user_id, Field::CurrentBranch, name)
            .await
            .map_err(|err| OpError::Transient(format!("Could not save branch: {:#}", err)))?;
        self.ctx
            .record_repo_action(
                user_id,
                RepoAction::new(&ctx.default_repo, "switch_branch", Some(name)),
            )
            .await;
        Ok(Done::message(format!(
            "Switched to branch `{}` in `{}`",
            name, ctx.default_repo
        ))
        .with_rate_limit(listed.rate_limit))
    }

    async fn branch_names(
        &self,
        ctx: &UserContext,
    ) -> Result<(Vec<String>, Option<RateLimit>), OpError> {
        let path = format!("{}/branches?per_page=100", repo_path(&ctx.default_repo));
        let resp = self.gh.request(Method::Get, &path, None).await;
        match resp.status {
            200 => {}
            404 => {
                return Err(OpError::NotFound(format!(
                    "Repository `{}` not found",
                    ctx.default_repo
                )));
            }
            _ => return Err(OpError::from_response(&resp)),
        }

        let names = resp
            .body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok((names, resp.rate_limit))
    }

    /// Tip sha of the first base branch that exists
    async fn base_tip(&self, ctx: &UserContext) -> Result<(&'static str, String), OpError> {
        let mut timed_out = false;
        for &base in BASE_BRANCHES {
            let path = format!("{}/git/refs/heads/{}", repo_path(&ctx.default_repo), base);
            let resp = self.gh.request(Method::Get, &path, None).await;
            if resp.is(408) {
                timed_out = true;
                continue;
            }
            if !resp.is(200) {
                continue;
            }
            let sha = resp
                .body
                .get("object")
                .and_then(|object| object.get("sha"))
                .and_then(Value::as_str);
            if let Some(sha) = sha {
                return Ok((base, sha.to_string()));
            }
        }

        if timed_out {
            return Err(OpError::Transient(
                "Timed out looking up the default branch".to_string(),
            ));
        }
        Err(OpError::NotFound(
            "Could not find default branch to branch from".to_string(),
        ))
    }
}
