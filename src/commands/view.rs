use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Print a file from the current branch, cut to a readable length.
    pub async fn cmd_view(
        &self,
        user_id: UserId,
        filename: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self.files().view(user_id, filename).await;
        let Some(view) = self
            .report(user_id, "view", format!("filename={}", filename), result, stdout)
            .await?
        else {
            return Ok(());
        };

        writeln!(stdout, "```")?;
        writeln!(stdout, "{}", view.display.trim_end())?;
        writeln!(stdout, "```")?;
        if let Some(url) = &view.html_url {
            writeln!(stdout, "{}", url.dimmed())?;
        }
        Ok(())
    }
}
