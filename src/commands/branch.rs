use anyhow::Result;
use colored::Colorize;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;
use crate::error::OpError;
use crate::sanitize::validate_branch_name;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// List branches, marking the user's current one.
    pub async fn cmd_branches(
        &self,
        user_id: UserId,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let result = self.branches().list(user_id).await;
        let Some(names) = self
            .report(user_id, "branches", String::new(), result, stdout)
            .await?
        else {
            return Ok(());
        };

        let current = self.ctx.get(user_id).await.current_branch;
        for name in names {
            if name == current {
                writeln!(stdout, "* {}", name.green())?;
            } else {
                writeln!(stdout, "  {}", name)?;
            }
        }
        Ok(())
    }

    /// Switch to branch `name`, offering to create it when it does not exist.
    pub async fn cmd_branch(
        &self,
        user_id: UserId,
        name: &str,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let arguments = format!("name={}", name);
        if let Err(reason) = validate_branch_name(name) {
            self.report::<()>(
                user_id,
                "branch",
                arguments,
                Err(OpError::InvalidInput(reason)),
                stdout,
            )
            .await?;
            return Ok(());
        }

        let branches = self.branches();
        let listed = match branches.list(user_id).await {
            Ok(listed) => listed,
            Err(err) => {
                self.report::<()>(user_id, "branch", arguments, Err(err), stdout)
                    .await?;
                return Ok(());
            }
        };

        if listed.value.iter().any(|branch| branch == name) {
            let switched = branches.switch_listed(user_id, name, listed).await;
            self.report(user_id, "branch", arguments, switched, stdout)
                .await?;
            return Ok(());
        }

        let prompt = format!("Branch `{}` does not exist. Create it?", name);
        let confirmation = self
            .confirm
            .run(Self::prompt_key(user_id), &prompt, stdout, || {
                branches.create(user_id, name)
            })
            .await?;
        self.report_confirmed(user_id, "branch", arguments, confirmation, stdout)
            .await?;
        Ok(())
    }
}
