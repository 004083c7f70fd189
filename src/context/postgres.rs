use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use log::warn;
use tokio_postgres::Client;
use tokio_postgres::NoTls;

use super::ActivityEntry;
use super::CommandRecord;
use super::Field;
use super::RepoAction;
use super::SettingsBackend;
use super::StoredSettings;
use super::UsageStats;
use super::UserId;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS user_settings (
    user_id BIGINT PRIMARY KEY,
    default_repo TEXT,
    current_branch TEXT,
    commit_message TEXT,
    preferred_prefix TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
ALTER TABLE user_settings ADD COLUMN IF NOT EXISTS current_branch TEXT;
ALTER TABLE user_settings ADD COLUMN IF NOT EXISTS commit_message TEXT;

CREATE TABLE IF NOT EXISTS repository_history (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    repo_name TEXT NOT NULL,
    action TEXT NOT NULL,
    filename TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS repository_history_user_idx
    ON repository_history (user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS command_logs (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL,
    command TEXT NOT NULL,
    arguments TEXT NOT NULL,
    success BOOLEAN NOT NULL,
    error_message TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Networked settings store.
pub(crate) struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    pub async fn connect(url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .context("Failed to connect to PostgreSQL")?;

        // Drive the connection in the background; it ends when the client drops.
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!("PostgreSQL connection closed: {}", err);
            }
        });

        client
            .batch_execute(SCHEMA)
            .await
            .context("Failed to create PostgreSQL schema")?;

        Ok(Self { client })
    }
}

// Timestamps are cast to timestamptz so tables created with plain TIMESTAMP
// columns by older deployments still read back as UTC.
impl SettingsBackend for PostgresBackend {
    async fn fetch(&self, user_id: UserId) -> Result<Option<StoredSettings>> {
        let row = self
            .client
            .query_opt(
                "SELECT default_repo, current_branch, commit_message, preferred_prefix, \
                 created_at::timestamptz, updated_at::timestamptz \
                 FROM user_settings WHERE user_id = $1",
                &[&user_id.as_db()],
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(StoredSettings {
            default_repo: row.try_get(0)?,
            current_branch: row.try_get(1)?,
            commit_message: row.try_get(2)?,
            preferred_prefix: row.try_get(3)?,
            created_at: row.try_get(4)?,
            updated_at: row.try_get(5)?,
        }))
    }

    async fn upsert(&self, user_id: UserId, field: Field, value: &str) -> Result<()> {
        let column = field.column();
        let query = format!(
            "INSERT INTO user_settings (user_id, {column}) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET {column} = EXCLUDED.{column}, updated_at = NOW()"
        );
        self.client
            .execute(query.as_str(), &[&user_id.as_db(), &value])
            .await?;
        Ok(())
    }

    async fn insert_repo_action(&self, user_id: UserId, action: &RepoAction) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO repository_history (user_id, repo_name, action, filename) \
                 VALUES ($1, $2, $3, $4)",
                &[&user_id.as_db(), &action.repo, &action.action, &action.filename],
            )
            .await?;
        Ok(())
    }

    async fn insert_command(&self, user_id: UserId, record: &CommandRecord) -> Result<()> {
        self.client
            .execute(
                "INSERT INTO command_logs (user_id, command, arguments, success, error_message) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    &user_id.as_db(),
                    &record.command,
                    &record.arguments,
                    &record.success,
                    &record.error_message,
                ],
            )
            .await?;
        Ok(())
    }

    async fn repo_history(&self, user_id: UserId, limit: u32) -> Result<Vec<ActivityEntry>> {
        let rows = self
            .client
            .query(
                "SELECT repo_name, action, filename, created_at::timestamptz \
                 FROM repository_history WHERE user_id = $1 \
                 ORDER BY created_at DESC, id DESC LIMIT $2",
                &[&user_id.as_db(), &i64::from(limit)],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<ActivityEntry> {
                Ok(ActivityEntry {
                    repo_name: row.try_get(0)?,
                    action: row.try_get(1)?,
                    filename: row.try_get(2)?,
                    created_at: row.try_get(3)?,
                })
            })
            .collect()
    }

    async fn usage_stats(&self, user_id: UserId) -> Result<UsageStats> {
        let row = self
            .client
            .query_one(
                "SELECT \
                 (SELECT COUNT(*) FROM command_logs WHERE user_id = $1), \
                 (SELECT COUNT(*) FROM command_logs WHERE user_id = $1 AND success), \
                 (SELECT COUNT(DISTINCT repo_name) FROM repository_history WHERE user_id = $1), \
                 (SELECT MAX(created_at)::timestamptz FROM command_logs WHERE user_id = $1)",
                &[&user_id.as_db()],
            )
            .await?;

        let last_active: Option<DateTime<Utc>> = row.try_get(3)?;
        Ok(UsageStats {
            total_commands: row.try_get(0)?,
            successful: row.try_get(1)?,
            unique_repos: row.try_get(2)?,
            last_active,
        })
    }
}
