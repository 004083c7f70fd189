use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;
use crate::error::Done;
use crate::error::OpError;

/// Entries shown by `history` when no limit is given
pub const DEFAULT_HISTORY_LIMIT: u32 = 10;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Print the user's most recent repository actions, newest first.
    pub async fn cmd_history(
        &self,
        user_id: UserId,
        limit: u32,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self
            .ctx
            .history(user_id, limit)
            .await
            .map(|entries| {
                let message = if entries.is_empty() {
                    "No repository activity yet".to_string()
                } else {
                    format!("Last {} repository actions", entries.len())
                };
                Done::new(message, entries)
            })
            .map_err(|err| OpError::Transient(format!("Could not read history: {:#}", err)));
        let Some(entries) = self
            .report(user_id, "history", format!("limit={}", limit), result, stdout)
            .await?
        else {
            return Ok(());
        };

        for entry in entries {
            let when = entry.created_at.format("%Y-%m-%d %H:%M").to_string();
            let line = format!(
                "{} {} {} {}",
                when.dimmed(),
                entry.action.cyan(),
                entry.repo_name,
                entry.filename.as_deref().unwrap_or_default()
            );
            writeln!(stdout, "  {}", line.trim_end())?;
        }
        Ok(())
    }

    /// Print command counts and activity totals for the user.
    pub async fn cmd_stats(&self, user_id: UserId, stdout: &mut impl std::io::Write) -> Result<()> {
        let result = self
            .ctx
            .stats(user_id)
            .await
            .map(|stats| Done::new("Usage statistics", stats))
            .map_err(|err| OpError::Transient(format!("Could not read statistics: {:#}", err)));
        let Some(stats) = self
            .report(user_id, "stats", String::new(), result, stdout)
            .await?
        else {
            return Ok(());
        };

        writeln!(stdout, "  commands:     {}", stats.total_commands)?;
        writeln!(stdout, "  successful:   {}", stats.successful)?;
        writeln!(stdout, "  failed:       {}", stats.failed())?;
        writeln!(stdout, "  repositories: {}", stats.unique_repos)?;
        if let Some(last_active) = stats.last_active {
            let last_active = last_active.format("%Y-%m-%d %H:%M UTC").to_string();
            writeln!(stdout, "  last active:  {}", last_active.dimmed())?;
        }
        Ok(())
    }
}
