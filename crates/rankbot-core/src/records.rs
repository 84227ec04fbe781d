//! Persisted records read and written through the [`Store`](crate::Store) trait.

use crate::message::UserId;
use chrono::{DateTime, Utc};

/// Ban state of a user.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BanStatus {
    pub banned: bool,
    pub reason: Option<String>,
    pub banned_at: Option<DateTime<Utc>>,
}

/// Per-user record; created lazily with zero XP and no ban.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    pub xp: u64,
    pub ban: BanStatus,
}

impl UserRecord {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            xp: 0,
            ban: BanStatus::default(),
        }
    }
}

/// Moderation state of a command; created lazily as enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandState {
    pub name: String,
    pub enabled: bool,
    pub reason: Option<String>,
    /// When `enabled` last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommandState {
    pub fn enabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            reason: None,
            updated_at: None,
        }
    }
}
