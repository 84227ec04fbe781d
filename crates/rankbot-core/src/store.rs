//! In-memory [`Store`] backed by `DashMap`.
//!
//! Records are cloned out of the map so no shard guard is held across an
//! `.await`.

use crate::error::StoreError;
use crate::message::UserId;
use crate::records::{CommandState, UserRecord};
use crate::traits::Store;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

/// Volatile store for tests, benchmarks and the console bot without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<UserId, UserRecord>,
    commands: DashMap<String, CommandState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user(&self, id: UserId) -> Result<UserRecord, StoreError> {
        Ok(self
            .users
            .entry(id)
            .or_insert_with(|| UserRecord::new(id))
            .clone())
    }

    async fn set_user_xp(&self, id: UserId, xp: u64) -> Result<(), StoreError> {
        self.users.entry(id).or_insert_with(|| UserRecord::new(id)).xp = xp;
        Ok(())
    }

    async fn set_user_ban(
        &self,
        id: UserId,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut user = self.users.entry(id).or_insert_with(|| UserRecord::new(id));
        user.ban.banned = banned;
        user.ban.reason = reason.map(str::to_string);
        user.ban.banned_at = banned.then(Utc::now);
        Ok(())
    }

    async fn get_command_state(&self, name: &str) -> Result<CommandState, StoreError> {
        Ok(self
            .commands
            .entry(name.to_string())
            .or_insert_with(|| CommandState::enabled(name))
            .clone())
    }

    async fn set_command_state(
        &self,
        name: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self
            .commands
            .entry(name.to_string())
            .or_insert_with(|| CommandState::enabled(name));
        state.enabled = enabled;
        state.reason = reason.map(str::to_string);
        state.updated_at = Some(Utc::now());
        Ok(())
    }
}
