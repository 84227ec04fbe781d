//! Command state repository: per-command enable/disable flags.

use super::DbError;
use chrono::{DateTime, Utc};
use rankbot_core::CommandState;
use sqlx::SqlitePool;

/// Repository for command moderation state.
pub struct CommandRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommandRepository<'a> {
    /// Create a new command repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a command's state, inserting an enabled row on first sight.
    pub async fn get_or_create(&self, name: &str) -> Result<CommandState, DbError> {
        sqlx::query("INSERT OR IGNORE INTO commands (name, enabled) VALUES (?, 1)")
            .bind(name)
            .execute(self.pool)
            .await?;

        let (name, enabled, reason, updated_at) =
            sqlx::query_as::<_, (String, bool, Option<String>, Option<i64>)>(
                r#"
                SELECT name, enabled, reason, updated_at
                FROM commands
                WHERE name = ?
                "#,
            )
            .bind(name)
            .fetch_one(self.pool)
            .await?;

        Ok(CommandState {
            name,
            enabled,
            reason,
            updated_at: updated_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        })
    }

    /// Enable or disable a command. Enabling clears the reason.
    pub async fn set_state(
        &self,
        name: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), DbError> {
        let now = Utc::now().timestamp();
        let reason = if enabled { None } else { reason };

        sqlx::query(
            r#"
            INSERT INTO commands (name, enabled, reason, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                enabled = excluded.enabled,
                reason = excluded.reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(enabled)
        .bind(reason)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
