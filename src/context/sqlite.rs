use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

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
    user_id INTEGER PRIMARY KEY,
    default_repo TEXT,
    current_branch TEXT,
    commit_message TEXT,
    preferred_prefix TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS repository_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    repo_name TEXT NOT NULL,
    action TEXT NOT NULL,
    filename TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS repository_history_user_idx
    ON repository_history (user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS command_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    command TEXT NOT NULL,
    arguments TEXT NOT NULL,
    success INTEGER NOT NULL,
    error_message TEXT,
    created_at TEXT NOT NULL
);
"#;

/// Embedded settings store, used when PostgreSQL is not available.
///
/// Timestamps are stored as fixed-width RFC 3339 text so they sort
/// chronologically as strings.
pub(crate) struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database at {}", path))?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create SQLite schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in SQLite store: {}", value))?
        .with_timezone(&Utc))
}

fn parse_opt_time(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

impl SettingsBackend for SqliteBackend {
    async fn fetch(&self, user_id: UserId) -> Result<Option<StoredSettings>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT default_repo, current_branch, commit_message, preferred_prefix, \
                 created_at, updated_at FROM user_settings WHERE user_id = ?1",
                params![user_id.as_db()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((default_repo, current_branch, commit_message, preferred_prefix, created, updated)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(StoredSettings {
            default_repo,
            current_branch,
            commit_message,
            preferred_prefix,
            created_at: parse_opt_time(created)?,
            updated_at: parse_opt_time(updated)?,
        }))
    }

    async fn upsert(&self, user_id: UserId, field: Field, value: &str) -> Result<()> {
        let column = field.column();
        let query = format!(
            "INSERT INTO user_settings (user_id, {column}, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET {column} = excluded.{column}, \
             updated_at = excluded.updated_at"
        );
        self.conn
            .lock()
            .execute(&query, params![user_id.as_db(), value, now()])?;
        Ok(())
    }

    async fn insert_repo_action(&self, user_id: UserId, action: &RepoAction) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO repository_history (user_id, repo_name, action, filename, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id.as_db(),
                action.repo,
                action.action,
                action.filename,
                now()
            ],
        )?;
        Ok(())
    }

    async fn insert_command(&self, user_id: UserId, record: &CommandRecord) -> Result<()> {
        self.conn.lock().execute(
            "INSERT INTO command_logs \
             (user_id, command, arguments, success, error_message, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id.as_db(),
                record.command,
                record.arguments,
                record.success,
                record.error_message,
                now()
            ],
        )?;
        Ok(())
    }

    async fn repo_history(&self, user_id: UserId, limit: u32) -> Result<Vec<ActivityEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT repo_name, action, filename, created_at FROM repository_history \
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id.as_db(), limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (repo_name, action, filename, created_at) = row?;
            entries.push(ActivityEntry {
                repo_name,
                action,
                filename,
                created_at: parse_time(&created_at)?,
            });
        }
        Ok(entries)
    }

    async fn usage_stats(&self, user_id: UserId) -> Result<UsageStats> {
        let conn = self.conn.lock();
        let (total_commands, successful, unique_repos, last_active) = conn.query_row(
            "SELECT \
             (SELECT COUNT(*) FROM command_logs WHERE user_id = ?1), \
             (SELECT COUNT(*) FROM command_logs WHERE user_id = ?1 AND success), \
             (SELECT COUNT(DISTINCT repo_name) FROM repository_history WHERE user_id = ?1), \
             (SELECT MAX(created_at) FROM command_logs WHERE user_id = ?1)",
            params![user_id.as_db()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?;

        Ok(UsageStats {
            total_commands,
            successful,
            unique_repos,
            last_active: parse_opt_time(last_active)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.sqlite3");
        let path = path.to_str().unwrap();

        let first = SqliteBackend::open(path).unwrap();
        first
            .upsert(UserId(5), Field::DefaultRepo, "octo/notes")
            .await
            .unwrap();
        drop(first);

        let second = SqliteBackend::open(path).unwrap();
        let stored = second.fetch(UserId(5)).await.unwrap().unwrap();
        assert_eq!(stored.default_repo.as_deref(), Some("octo/notes"));
        assert_eq!(stored.current_branch, None);
        assert!(stored.created_at.is_some());
    }

    #[tokio::test]
    async fn test_large_user_ids_round_trip() {
        let backend = SqliteBackend::open(":memory:").unwrap();
        let user = UserId(u64::MAX - 1);
        backend
            .upsert(user, Field::CurrentBranch, "dev")
            .await
            .unwrap();
        let stored = backend.fetch(user).await.unwrap().unwrap();
        assert_eq!(stored.current_branch.as_deref(), Some("dev"));
        assert!(backend.fetch(UserId(1)).await.unwrap().is_none());
    }
}
