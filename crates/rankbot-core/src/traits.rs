//! Narrow collaborator interfaces consumed by the pipeline.
//!
//! ## Seams
//!
//! - [`Store`]: user and command-state persistence
//! - [`Messenger`]: outgoing text and photos
//! - [`RoleResolver`]: chat roles and admin rights
//! - [`RankNotifier`]: rank-change callback
//! - [`DispatchObserver`]: metrics hooks
//! - [`Command`]: a command implementation
//!
//! Command implementations receive their own collaborators at construction
//! time; `execute` only sees the message and its parsed context.

use crate::context::InvocationContext;
use crate::error::{CommandResult, DispatchError, MessengerError, ResolveError, StoreError};
use crate::message::{ChatId, IncomingMessage, ReplyTarget, UserId};
use crate::progression::RankChange;
use crate::records::{BanStatus, CommandState, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Persistence
// ============================================================================

/// Key-based persistence for users and command moderation state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a user, creating a default record on miss.
    async fn get_user(&self, id: UserId) -> Result<UserRecord, StoreError>;

    /// Overwrite a user's XP total.
    ///
    /// Absolute rather than additive so a retried write cannot double-award.
    async fn set_user_xp(&self, id: UserId, xp: u64) -> Result<(), StoreError>;

    async fn get_user_ban(&self, id: UserId) -> Result<BanStatus, StoreError> {
        Ok(self.get_user(id).await?.ban)
    }

    /// Ban or unban a user, stamping the change time.
    async fn set_user_ban(
        &self,
        id: UserId,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Fetch a command's state, creating an enabled record on miss.
    async fn get_command_state(&self, name: &str) -> Result<CommandState, StoreError>;

    async fn set_command_state(
        &self,
        name: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// Messaging
// ============================================================================

/// Outgoing chat messages. Implementations own the wire format.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<(), MessengerError>;

    async fn send_photo(
        &self,
        target: ReplyTarget,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError>;
}

// ============================================================================
// Roles
// ============================================================================

/// Fine-grained rights held by a chat admin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminRights(HashMap<String, bool>);

impl AdminRights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, permission: impl Into<String>, granted: bool) -> Self {
        self.0.insert(permission.into(), granted);
        self
    }

    /// Missing entries count as not granted.
    pub fn grants(&self, permission: &str) -> bool {
        self.0.get(permission).copied().unwrap_or(false)
    }
}

impl FromIterator<(String, bool)> for AdminRights {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A member's standing in a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Admin(AdminRights),
    Member,
}

impl MemberRole {
    /// Owner or admin.
    pub fn is_admin(&self) -> bool {
        !matches!(self, Self::Member)
    }
}

/// Looks up chat roles on the platform.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<MemberRole, ResolveError>;

    /// The bot's own role in `chat`.
    async fn bot_role(&self, chat: ChatId) -> Result<MemberRole, ResolveError>;
}

// ============================================================================
// Notifications
// ============================================================================

/// Receives rank-change events after XP has been recorded.
///
/// Failures are logged and dropped; the XP ledger is already final.
#[async_trait]
pub trait RankNotifier: Send + Sync {
    async fn rank_changed(
        &self,
        msg: &IncomingMessage,
        change: &RankChange,
    ) -> Result<(), MessengerError>;
}

/// Hooks fired by the dispatcher; every method defaults to a no-op.
pub trait DispatchObserver: Send + Sync {
    /// `kind` is one of `"text"`, `"prompt"` or `"command"`.
    fn message_received(&self, _kind: &'static str) {}

    /// A resolved or unknown command reached a terminal state.
    fn command_finished(&self, _command: &str, _elapsed: Duration, _error: Option<&DispatchError>) {}

    fn xp_awarded(&self, _amount: u64) {}

    fn rank_changed(&self, _change: &RankChange) {}
}

// ============================================================================
// Commands
// ============================================================================

/// A command implementation.
#[async_trait]
pub trait Command: Send + Sync {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult;
}
