use anyhow::Result;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Replace the content of an existing file on the current branch.
    pub async fn cmd_edit(
        &self,
        user_id: UserId,
        filename: &str,
        content: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self.files().edit(user_id, filename, content).await;
        self.report(
            user_id,
            "edit",
            format!("filename={} chars={}", filename, content.chars().count()),
            result,
            stdout,
        )
        .await?;
        Ok(())
    }
}
