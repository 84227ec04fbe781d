//! In-memory collaborators for unit and integration tests.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature, for
//! downstream test suites.

use crate::context::InvocationContext;
use crate::error::{CommandError, CommandResult, MessengerError, ResolveError, StoreError};
use crate::message::{ChatId, IncomingMessage, ReplyTarget, UserId};
use crate::progression::RankChange;
use crate::records::{CommandState, UserRecord};
use crate::traits::{Command, MemberRole, Messenger, RankNotifier, RoleResolver, Store};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

// ============================================================================
// Commands
// ============================================================================

/// Does nothing and succeeds.
pub struct NoopCommand;

#[async_trait]
impl Command for NoopCommand {
    async fn execute(&self, _msg: &IncomingMessage, _ctx: &InvocationContext) -> CommandResult {
        Ok(())
    }
}

type CommandFn = dyn Fn(IncomingMessage, InvocationContext) -> BoxFuture<'static, CommandResult> + Send + Sync;

/// Command built from a closure; counts its invocations.
pub struct FnCommand {
    f: Box<CommandFn>,
    calls: AtomicU64,
}

impl FnCommand {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(IncomingMessage, InvocationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        Self {
            f: Box::new(move |msg, ctx| f(msg, ctx).boxed()),
            calls: AtomicU64::new(0),
        }
    }

    /// Always returns `CommandError::Denied(reason)`.
    pub fn denying(reason: &'static str) -> Self {
        Self::new(move |_, _| async move { Err(CommandError::Denied(reason.to_string())) })
    }

    /// Always returns `CommandError::Failed(cause)`.
    pub fn failing(cause: &'static str) -> Self {
        Self::new(move |_, _| async move { Err(CommandError::Failed(cause.to_string())) })
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Command for FnCommand {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(msg.clone(), ctx.clone()).await
    }
}

// ============================================================================
// Messaging
// ============================================================================

/// A message captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        target: ReplyTarget,
        text: String,
    },
    Photo {
        target: ReplyTarget,
        bytes: usize,
        caption: String,
    },
}

impl Sent {
    /// Text body or photo caption.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Photo { caption, .. } => caption,
        }
    }
}

/// Records every outgoing message.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send fails with `MessengerError::Delivery`.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.body().to_string()).collect()
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().last().map(|s| s.body().to_string())
    }

    fn record(&self, sent: Sent) -> Result<(), MessengerError> {
        if self.fail {
            return Err(MessengerError::Delivery("recording messenger set to fail".into()));
        }
        self.sent.lock().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<(), MessengerError> {
        self.record(Sent::Text {
            target,
            text: text.to_string(),
        })
    }

    async fn send_photo(
        &self,
        target: ReplyTarget,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError> {
        self.record(Sent::Photo {
            target,
            bytes: photo.len(),
            caption: caption.to_string(),
        })
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Scripted role table. Unknown members resolve to `Member`.
#[derive(Default, Clone)]
pub struct StaticRoles {
    members: HashMap<(ChatId, UserId), MemberRole>,
    bots: HashMap<ChatId, MemberRole>,
    failing: HashSet<UserId>,
}

impl StaticRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, chat: ChatId, user: UserId, role: MemberRole) -> Self {
        self.members.insert((chat, user), role);
        self
    }

    pub fn bot(mut self, chat: ChatId, role: MemberRole) -> Self {
        self.bots.insert(chat, role);
        self
    }

    /// Lookups for `user` fail with `ResolveError`.
    pub fn failing_for(mut self, user: UserId) -> Self {
        self.failing.insert(user);
        self
    }
}

#[async_trait]
impl RoleResolver for StaticRoles {
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<MemberRole, ResolveError> {
        if self.failing.contains(&user) {
            return Err(ResolveError::Lookup(format!("user {user} unavailable")));
        }
        Ok(self
            .members
            .get(&(chat, user))
            .cloned()
            .unwrap_or(MemberRole::Member))
    }

    async fn bot_role(&self, chat: ChatId) -> Result<MemberRole, ResolveError> {
        Ok(self.bots.get(&chat).cloned().unwrap_or(MemberRole::Member))
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Records rank changes handed to the notifier.
#[derive(Default)]
pub struct RecordingNotifier {
    changes: Mutex<Vec<RankChange>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            changes: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn changes(&self) -> Vec<RankChange> {
        self.changes.lock().clone()
    }
}

#[async_trait]
impl RankNotifier for RecordingNotifier {
    async fn rank_changed(
        &self,
        _msg: &IncomingMessage,
        change: &RankChange,
    ) -> Result<(), MessengerError> {
        self.changes.lock().push(change.clone());
        if self.fail {
            return Err(MessengerError::Delivery("notifier set to fail".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Wraps a store and fails a scripted number of calls with
/// `StoreError::Unavailable`.
pub struct FlakyStore<S> {
    inner: S,
    write_failures: AtomicU32,
    read_failures: AtomicU32,
}

impl<S: Store> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            write_failures: AtomicU32::new(0),
            read_failures: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` calls to `set_user_xp`.
    pub fn fail_writes(self, n: u32) -> Self {
        self.write_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` reads of users and command states.
    pub fn fail_reads(self, n: u32) -> Self {
        self.read_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn trip(counter: &AtomicU32) -> Result<(), StoreError> {
        match counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
            Ok(_) => Err(StoreError::Unavailable("scripted outage".into())),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait]
impl<S: Store> Store for FlakyStore<S> {
    async fn get_user(&self, id: UserId) -> Result<UserRecord, StoreError> {
        Self::trip(&self.read_failures)?;
        self.inner.get_user(id).await
    }

    async fn set_user_xp(&self, id: UserId, xp: u64) -> Result<(), StoreError> {
        Self::trip(&self.write_failures)?;
        self.inner.set_user_xp(id, xp).await
    }

    async fn set_user_ban(
        &self,
        id: UserId,
        banned: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_user_ban(id, banned, reason).await
    }

    async fn get_command_state(&self, name: &str) -> Result<CommandState, StoreError> {
        Self::trip(&self.read_failures)?;
        self.inner.get_command_state(name).await
    }

    async fn set_command_state(
        &self,
        name: &str,
        enabled: bool,
        reason: Option<&str>,
    ) -> Result<(), StoreError> {
        self.inner.set_command_state(name, enabled, reason).await
    }
}
