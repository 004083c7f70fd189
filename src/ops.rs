//! Services that act on a user's GitHub workspace.
//!
//! - [`files`]: create, edit, delete, view and list files on the current branch
//! - [`branches`]: list, create and switch branches
//! - [`repos`]: show, switch and create the current repository
//!
//! Each service borrows the context store and the GitHub client, reads the
//! user's context fresh on every call and reports outcomes as [`OpResult`](crate::error::OpResult)s.

pub mod branches;
pub mod files;
pub mod repos;

use crate::config::Config;
use crate::context::ContextOps;
use crate::context::UserContext;
use crate::context::UserId;
use crate::error::OpError;

/// Fresh context for `user_id`, refusing to act on the global default repo.
pub(crate) async fn selected_context<C: ContextOps>(
    ctx: &C,
    config: &Config,
    user_id: UserId,
) -> Result<UserContext, OpError> {
    let context = ctx.get(user_id).await;
    if context.default_repo == config.default_repo {
        return Err(OpError::NoContextSelected);
    }
    Ok(context)
}

/// `/repos/{owner}/{repo}` for an owner-qualified repository name
pub(crate) fn repo_path(repo: &str) -> String {
    format!("/repos/{}", repo)
}
