use anyhow::Result;

use crate::App;
use crate::clients::github::GithubOps;
use crate::context::ContextOps;
use crate::context::UserId;
use crate::error::ErrorKind;

impl<C: ContextOps, H: GithubOps> App<C, H> {
    /// Show the current repository, or switch to `name`.
    ///
    /// A repository that does not exist yet is created after the user
    /// confirms; it is private unless `private` is false.
    pub async fn cmd_repo(
        &self,
        user_id: UserId,
        name: Option<&str>,
        private: bool,
        stdout: &mut impl std::io::Write,
    ) -> Result<()> {
        let Some(name) = name else {
            let current = self.repos().current(user_id).await;
            self.report(user_id, "repo", String::new(), current, stdout)
                .await?;
            return Ok(());
        };
        let arguments = format!("name={} private={}", name, private);

        let repos = self.repos();
        match repos.lookup(name).await {
            Ok(found) => {
                let switched = repos.switch_existing(user_id, &found.value).await;
                self.report(user_id, "repo", arguments, switched, stdout)
                    .await?;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let visibility = if private { "private" } else { "public" };
                let prompt = format!(
                    "Repository `{}` does not exist. Create it as a {} repository?",
                    name, visibility
                );
                let confirmation = self
                    .confirm
                    .run(Self::prompt_key(user_id), &prompt, stdout, || {
                        repos.create(user_id, name, private)
                    })
                    .await?;
                self.report_confirmed(user_id, "repo", arguments, confirmation, stdout)
                    .await?;
            }
            Err(err) => {
                self.report::<()>(user_id, "repo", arguments, Err(err), stdout)
                    .await?;
            }
        }
        Ok(())
    }
}
