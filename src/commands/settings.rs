use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::Field;
use crate::context::UserId;
use crate::error::Done;
use crate::error::OpError;
use crate::error::OpResult;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Show or set the commit message template.
    pub async fn cmd_message(
        &self,
        user_id: UserId,
        template: Option<&str>,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = match template {
            Some(template) => {
                self.save_setting(user_id, Field::CommitMessage, template, "Commit message")
                    .await
            }
            None => {
                let ctx = self.ctx.get(user_id).await;
                Ok(Done::message(format!(
                    "Commit message: `{}` (`{{action}}` and `{{filename}}` are filled in)",
                    ctx.commit_message
                )))
            }
        };
        self.report(
            user_id,
            "message",
            template.unwrap_or_default().to_string(),
            result,
            stdout,
        )
        .await?;
        Ok(())
    }

    /// Show or set the command prefix.
    pub async fn cmd_prefix(
        &self,
        user_id: UserId,
        value: Option<&str>,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = match value {
            Some(value) => {
                self.save_setting(user_id, Field::PreferredPrefix, value, "Prefix")
                    .await
            }
            None => {
                let ctx = self.ctx.get(user_id).await;
                Ok(Done::message(format!("Prefix: `{}`", ctx.preferred_prefix)))
            }
        };
        self.report(
            user_id,
            "prefix",
            value.unwrap_or_default().to_string(),
            result,
            stdout,
        )
        .await?;
        Ok(())
    }

    /// Show the full stored context.
    pub async fn cmd_current(
        &self,
        user_id: UserId,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self.repos().current(user_id).await;
        let Some(ctx) = self
            .report(user_id, "current", String::new(), result, stdout)
            .await?
        else {
            return Ok(());
        };

        writeln!(stdout, "  commit message: {}", ctx.commit_message)?;
        writeln!(stdout, "  prefix:         {}", ctx.preferred_prefix)?;
        if let Some(updated_at) = ctx.updated_at {
            let updated_at = updated_at.format("%Y-%m-%d %H:%M UTC").to_string();
            writeln!(stdout, "  updated:        {}", updated_at.dimmed())?;
        }
        Ok(())
    }

    async fn save_setting(
        &self,
        user_id: UserId,
        field: Field,
        value: &str,
        label: &str,
    ) -> OpResult {
        field
            .validate(value)
            .map_err(|err| OpError::InvalidInput(err.to_string()))?;
        self.ctx
            .set_field(user_id, field, value)
            .await
            .map_err(|err| OpError::Transient(format!("Could not save setting: {:#}", err)))?;
        Ok(Done::message(format!("{} set to `{}`", label, value)))
    }
}
