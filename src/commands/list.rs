use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    pub async fn cmd_list(&self, user_id: UserId, stdout: &mut impl std::io::Write) -> Result<()> {
        let result = self.files().list(user_id).await;
        let Some(entries) = self
            .report(user_id, "list", String::new(), result, stdout)
            .await?
        else {
            return Ok(());
        };

        for entry in entries {
            if entry.kind == "dir" {
                writeln!(stdout, "  {}/", entry.name.blue())?;
            } else {
                writeln!(stdout, "  {}", entry.name)?;
            }
        }
        Ok(())
    }
}
