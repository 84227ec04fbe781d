//! [`Store`] implementation backed by SQLite.

use super::{Database, DbError};
use async_trait::async_trait;
use rankbot_core::{CommandState, Store, StoreError, UserId, UserRecord};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(
                e @ (sqlx::Error::Decode(_)
                | sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::RowNotFound),
            ) => StoreError::Corrupt(e.to_string()),
            DbError::Corrupt(msg) => StoreError::Corrupt(msg),
            // Pool timeouts, busy/locked databases and I/O are worth retrying.
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl Store for Database {
    async fn get_user(&self, id: UserId) -> Result<UserRecord, StoreError> {
        Ok(self.users().get_or_create(id).await?)
    }

    async fn set_user_xp(&self, id: UserId, xp: u64) -> Result<(), StoreError> {
        Ok(self.users().set_xp(id, xp).await?)
    }

    async fn set_user_ban(
        &self,
        id: UserId,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(self.users().set_ban(id, banned, reason).await?)
    }

    async fn get_command_state(&self, name: &str) -> Result<CommandState, StoreError> {
        Ok(self.commands().get_or_create(name).await?)
    }

    async fn set_command_state(
        &self,
        name: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        Ok(self.commands().set_state(name, enabled, reason).await?)
    }
}
