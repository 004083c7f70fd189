use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;

use crate::clients::github::GithubOps;
use crate::config::Config;
use crate::confirm::Confirmation;
use crate::confirm::ConfirmationFlow;
use crate::confirm::PromptKey;
use crate::context::CommandRecord;
use crate::context::ContextOps;
use crate::context::UserId;
use crate::error::OpResult;
use crate::error::reply;
use crate::ops::branches::Branches;
use crate::ops::files::Files;
use crate::ops::repos::Repos;

/// Channel used for prompts raised from the command line
pub const CLI_CHANNEL: u64 = 0;

pub struct App<C, H> {
    pub config: Config,
    pub ctx: C,
    pub gh: H,
    pub confirm: Arc<ConfirmationFlow>,
}

impl<C: ContextOps, H: GithubOps> App<C, H> {
    pub fn new(config: Config, ctx: C, gh: H) -> Self {
        Self {
            config,
            ctx,
            gh,
            confirm: Arc::new(ConfirmationFlow::default()),
        }
    }

    /// Use `confirm` for prompts instead of a private flow
    pub fn with_confirmation(mut self, confirm: Arc<ConfirmationFlow>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn files(&self) -> Files<'_, C, H> {
        Files::new(&self.ctx, &self.gh, &self.config)
    }

    pub fn branches(&self) -> Branches<'_, C, H> {
        Branches::new(&self.ctx, &self.gh, &self.config)
    }

    pub fn repos(&self) -> Repos<'_, C, H> {
        Repos::new(&self.ctx, &self.gh, &self.config)
    }
}

/// Shared reporting helpers for the command handlers
impl<C: ContextOps, H: GithubOps> App<C, H> {
    pub(crate) fn prompt_key(user_id: UserId) -> PromptKey {
        PromptKey {
            user_id,
            channel_id: CLI_CHANNEL,
        }
    }

    /// Print the outcome as a single status line, log the command, and hand
    /// back the payload on success.
    pub(crate) async fn report<T>(
        &self,
        user_id: UserId,
        command: &str,
        arguments: String,
        result: OpResult<T>,
        stdout: &mut impl std::io::Write,
    ) -> Result<Option<T>> {
        let (success, message) = reply(&result);
        write_status(success, &message, stdout)?;
        if let Some(rate_limit) = result.as_ref().ok().and_then(|done| done.rate_limit) {
            writeln!(stdout, "{}", rate_limit.to_string().dimmed())?;
        }

        self.ctx
            .record_command(
                user_id,
                CommandRecord {
                    command: command.to_string(),
                    arguments,
                    success,
                    error_message: (!success).then_some(message),
                },
            )
            .await;
        Ok(result.ok().map(|done| done.value))
    }

    /// Like [`report`](Self::report) for an operation gated behind a prompt.
    pub(crate) async fn report_confirmed<T>(
        &self,
        user_id: UserId,
        command: &str,
        arguments: String,
        confirmation: Confirmation<OpResult<T>>,
        stdout: &mut impl std::io::Write,
    ) -> Result<Option<T>> {
        let declined = match confirmation {
            Confirmation::Confirmed(result) => {
                return self
                    .report(user_id, command, arguments, result, stdout)
                    .await;
            }
            Confirmation::Cancelled => "Cancelled",
            Confirmation::TimedOut => "Timed out waiting for confirmation. Nothing was changed.",
        };

        write_status(false, declined, stdout)?;
        self.ctx
            .record_command(
                user_id,
                CommandRecord {
                    command: command.to_string(),
                    arguments,
                    success: false,
                    error_message: Some(declined.to_string()),
                },
            )
            .await;
        Ok(None)
    }
}

fn write_status(success: bool, message: &str, stdout: &mut impl std::io::Write) -> Result<()> {
    let mark = if success {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    writeln!(stdout, "{} {}", mark, message)?;
    Ok(())
}
