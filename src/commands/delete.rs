use anyhow::Result;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;
use crate::ops::selected_context;
use crate::sanitize::sanitize_filename;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Delete a file from the current branch once the user confirms.
    pub async fn cmd_delete(
        &self,
        user_id: UserId,
        filename: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let arguments = format!("filename={}", filename);

        // Nothing to confirm without a repository
        let ctx = match selected_context(&self.ctx, &self.config, user_id).await {
            Ok(ctx) => ctx,
            Err(err) => {
                self.report::<()>(user_id, "delete", arguments, Err(err), stdout)
                    .await?;
                return Ok(());
            }
        };

        let prompt = format!(
            "Delete `{}` from `{}` on `{}`? This cannot be undone.",
            sanitize_filename(filename),
            ctx.default_repo,
            ctx.current_branch
        );
        let files = self.files();
        let confirmation = self
            .confirm
            .run(Self::prompt_key(user_id), &prompt, stdout, || {
                files.delete(user_id, filename)
            })
            .await?;
        self.report_confirmed(user_id, "delete", arguments, confirmation, stdout)
            .await?;
        Ok(())
    }
}
