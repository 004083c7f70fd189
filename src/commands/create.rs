use anyhow::Result;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Create a new file on the current branch.
    pub async fn cmd_create(
        &self,
        user_id: UserId,
        filename: &str,
        content: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self.files().create(user_id, filename, content).await;
        self.report(
            user_id,
            "create",
            format!("filename={} chars={}", filename, content.chars().count()),
            result,
            stdout,
        )
        .await?;
        Ok(())
    }
}
