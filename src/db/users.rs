//! User repository: XP totals and ban state.

use super::DbError;
use chrono::{DateTime, Utc};
use rankbot_core::{BanStatus, UserId, UserRecord};
use sqlx::SqlitePool;

type UserRow = (i64, i64, bool, Option<String>, Option<i64>);

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a user, inserting a fresh zero-XP row on first sight.
    pub async fn get_or_create(&self, user_id: UserId) -> Result<UserRecord, DbError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO users (user_id, xp, banned, created_at)
            VALUES (?, 0, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(self.pool)
        .await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT user_id, xp, banned, ban_reason, banned_at
            FROM users
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        row_to_record(row)
    }

    /// Overwrite a user's XP total.
    pub async fn set_xp(&self, user_id: UserId, xp: u64) -> Result<(), DbError> {
        let xp = i64::try_from(xp)
            .map_err(|_| DbError::Corrupt(format!("xp {xp} for user {user_id} out of range")))?;
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO users (user_id, xp, banned, created_at)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(user_id) DO UPDATE SET xp = excluded.xp
            "#,
        )
        .bind(user_id)
        .bind(xp)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Ban or unban a user. Unbanning clears the reason.
    pub async fn set_ban(
        &self,
        user_id: UserId,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<(), DbError> {
        let now = Utc::now().timestamp();
        let reason = if banned { reason } else { None };
        let banned_at = banned.then_some(now);

        sqlx::query(
            r#"
            INSERT INTO users (user_id, xp, banned, ban_reason, banned_at, created_at)
            VALUES (?, 0, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                banned = excluded.banned,
                ban_reason = excluded.ban_reason,
                banned_at = excluded.banned_at
            "#,
        )
        .bind(user_id)
        .bind(banned)
        .bind(reason)
        .bind(banned_at)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_record(
    (user_id, xp, banned, reason, banned_at): UserRow,
) -> Result<UserRecord, DbError> {
    let xp = u64::try_from(xp)
        .map_err(|_| DbError::Corrupt(format!("negative xp {xp} for user {user_id}")))?;
    Ok(UserRecord {
        user_id,
        xp,
        ban: BanStatus {
            banned,
            reason,
            banned_at: banned_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        },
    })
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_get_or_create_defaults() {
        let db = Database::new(":memory:").await.unwrap();
        let user = db.users().get_or_create(42).await.unwrap();
        assert_eq!(user.user_id, 42);
        assert_eq!(user.xp, 0);
        assert!(!user.ban.banned);
    }

    #[tokio::test]
    async fn test_set_xp_persists() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().set_xp(7, 1234).await.unwrap();
        assert_eq!(db.users().get_or_create(7).await.unwrap().xp, 1234);

        db.users().set_xp(7, 50).await.unwrap();
        assert_eq!(db.users().get_or_create(7).await.unwrap().xp, 50);
    }

    #[tokio::test]
    async fn test_xp_out_of_range_rejected() {
        let db = Database::new(":memory:").await.unwrap();
        let err = db.users().set_xp(7, u64::MAX).await.unwrap_err();
        assert_eq!(err.error_code(), "corrupt");
    }

    #[tokio::test]
    async fn test_ban_and_unban() {
        let db = Database::new(":memory:").await.unwrap();
        db.users().set_xp(9, 10).await.unwrap();
        db.users().set_ban(9, true, Some("spam")).await.unwrap();

        let user = db.users().get_or_create(9).await.unwrap();
        assert_eq!(user.xp, 10);
        assert!(user.ban.banned);
        assert_eq!(user.ban.reason.as_deref(), Some("spam"));
        assert!(user.ban.banned_at.is_some());

        db.users().set_ban(9, false, Some("ignored")).await.unwrap();
        let user = db.users().get_or_create(9).await.unwrap();
        assert!(!user.ban.banned);
        assert!(user.ban.reason.is_none());
        assert!(user.ban.banned_at.is_none());
    }
}
