//! Console transport: drives the dispatcher from stdin.
//!
//! Every line is a message from the owner in a private chat. Leading
//! directives change that:
//!
//! ```text
//! #group /promote @42      group chat; the owner owns it, the bot is admin
//! #as 42 /rank             sent by user 42 instead of the owner
//! #reply 42 /ban           replying to a message from user 42
//! ```
//!
//! `@<id>` tokens in the text become mentions. Replies are written to stdout.
//!
//! Stdin is read on its own thread rather than through `tokio::io::stdin`,
//! whose read sits on the runtime's blocking pool and holds shutdown open
//! until the next line arrives.

use crate::commands::{ChatAdmin, ChatAdminError};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use rankbot_core::{
    AdminRights, Chat, ChatId, Dispatcher, IncomingMessage, MemberRole, Messenger,
    MessengerError, ReplyTarget, ResolveError, RoleResolver, UserId, UserRef,
};
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// The bot's own user id on the console.
pub const BOT_USER_ID: UserId = 0;

/// Chat id of the single console group.
pub const GROUP_CHAT_ID: ChatId = -1000;

/// Longest accepted input line.
const MAX_LINE_LENGTH: usize = 4096;

/// Rights granted by `promote`, and held by the bot in the console group.
const ADMIN_RIGHTS: &[&str] = &[
    "can_change_info",
    "can_delete_messages",
    "can_invite_users",
    "can_restrict_members",
    "can_pin_messages",
    "can_promote_members",
];

fn full_rights() -> AdminRights {
    ADMIN_RIGHTS
        .iter()
        .fold(AdminRights::new(), |rights, p| rights.with(*p, true))
}

// ============================================================================
// Messenger
// ============================================================================

/// Writes outgoing messages to stdout, one block per message.
pub struct ConsoleMessenger {
    out: Mutex<tokio::io::Stdout>,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }

    async fn write(&self, text: String) -> Result<(), MessengerError> {
        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes())
            .await
            .map_err(|e| MessengerError::Delivery(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| MessengerError::Delivery(e.to_string()))
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_text(&self, target: ReplyTarget, text: &str) -> Result<(), MessengerError> {
        self.write(format!("[{}] {text}\n", target.chat_id)).await
    }

    async fn send_photo(
        &self,
        target: ReplyTarget,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<(), MessengerError> {
        self.write(format!(
            "[{}] [photo {} bytes] {caption}\n",
            target.chat_id,
            photo.len()
        ))
        .await
    }
}

impl Default for ConsoleMessenger {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Chat state
// ============================================================================

/// In-process chat roles for the console group.
///
/// The owner owns the group and the bot is a full admin; everyone else is a
/// member until promoted.
pub struct ConsoleChat {
    roles: DashMap<(ChatId, UserId), MemberRole>,
    announcement: DashMap<ChatId, bool>,
}

impl ConsoleChat {
    pub fn new(owner: UserId) -> Self {
        let roles = DashMap::new();
        roles.insert((GROUP_CHAT_ID, owner), MemberRole::Owner);
        roles.insert((GROUP_CHAT_ID, BOT_USER_ID), MemberRole::Admin(full_rights()));
        Self {
            roles,
            announcement: DashMap::new(),
        }
    }
}

#[async_trait]
impl RoleResolver for ConsoleChat {
    async fn member_role(&self, chat: ChatId, user: UserId) -> Result<MemberRole, ResolveError> {
        Ok(self
            .roles
            .get(&(chat, user))
            .map(|r| r.value().clone())
            .unwrap_or(MemberRole::Member))
    }

    async fn bot_role(&self, chat: ChatId) -> Result<MemberRole, ResolveError> {
        self.member_role(chat, BOT_USER_ID).await
    }
}

#[async_trait]
impl ChatAdmin for ConsoleChat {
    async fn promote(&self, chat: ChatId, user: UserId) -> Result<(), ChatAdminError> {
        self.roles
            .insert((chat, user), MemberRole::Admin(full_rights()));
        info!(chat, user, "Promoted");
        Ok(())
    }

    async fn demote(&self, chat: ChatId, user: UserId) -> Result<(), ChatAdminError> {
        if self.roles.get(&(chat, user)).is_some_and(|r| *r == MemberRole::Owner) {
            return Err(ChatAdminError::Action(format!("user {user} owns chat {chat}")));
        }
        self.roles.remove(&(chat, user));
        info!(chat, user, "Demoted");
        Ok(())
    }

    async fn set_announcement(&self, chat: ChatId, enabled: bool) -> Result<(), ChatAdminError> {
        let previous = self.announcement.insert(chat, enabled);
        info!(chat, enabled, ?previous, "Announcement mode changed");
        Ok(())
    }
}

// ============================================================================
// Input
// ============================================================================

/// Turns console lines into messages.
pub struct ConsoleSession {
    owner_id: UserId,
    owner_name: String,
    bot_name: String,
    next_message_id: AtomicI64,
}

impl ConsoleSession {
    pub fn new(owner_id: UserId, owner_name: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            owner_id,
            owner_name: owner_name.into(),
            bot_name: bot_name.into(),
            next_message_id: AtomicI64::new(1),
        }
    }

    fn user(&self, id: UserId) -> UserRef {
        let name = if id == self.owner_id {
            self.owner_name.clone()
        } else if id == BOT_USER_ID {
            self.bot_name.clone()
        } else {
            format!("user{id}")
        };
        UserRef::new(id).with_username(name)
    }

    /// Parse one input line. Blank lines yield `None`.
    pub fn message(&self, line: &str) -> Option<IncomingMessage> {
        let mut rest = line.trim();
        let mut group = false;
        let mut sender = self.owner_id;
        let mut reply_to = None;

        loop {
            if let Some(tail) = rest
                .strip_prefix("#group")
                .filter(|t| t.is_empty() || t.starts_with(char::is_whitespace))
            {
                group = true;
                rest = tail.trim_start();
            } else if let Some((id, tail)) = directive(rest, "#as") {
                sender = id;
                rest = tail;
            } else if let Some((id, tail)) = directive(rest, "#reply") {
                reply_to = Some(id);
                rest = tail;
            } else {
                break;
            }
        }

        if rest.is_empty() {
            return None;
        }

        let chat = if group {
            Chat::group(GROUP_CHAT_ID, "console")
        } else {
            Chat::private(sender)
        };
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        let mut msg = IncomingMessage::new(id, chat, self.user(sender), rest);

        if let Some(user) = reply_to {
            msg = msg.replying_to(self.user(user));
        }
        for token in rest.split_whitespace() {
            if let Some(user) = token.strip_prefix('@').and_then(|t| t.parse().ok()) {
                msg = msg.mentioning(self.user(user));
            }
        }
        Some(msg)
    }
}

/// `#name <id> rest` -> `(id, rest)`.
fn directive<'a>(line: &'a str, name: &str) -> Option<(UserId, &'a str)> {
    let tail = line.strip_prefix(name)?.strip_prefix(' ')?.trim_start();
    let (id, rest) = tail.split_once(char::is_whitespace).unwrap_or((tail, ""));
    Some((id.parse().ok()?, rest.trim_start()))
}

/// One input line, or why it could not be read.
pub type Line = Result<String, LinesCodecError>;

/// Lines of stdin, read on a dedicated thread.
pub fn stdin_lines() -> impl Stream<Item = Line> + Unpin {
    let (tx, mut rx) = mpsc::channel(64);
    let spawned = std::thread::Builder::new()
        .name("console-stdin".into())
        .spawn(move || pump(std::io::stdin().lock(), MAX_LINE_LENGTH, &tx));
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start stdin reader");
    }
    futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx))
}

/// Forward lines from `reader` until EOF, a read error, or the receiver
/// going away. Lines longer than `max_len` bytes are reported, not sent.
fn pump(reader: impl BufRead, max_len: usize, tx: &mpsc::Sender<Line>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) if line.len() > max_len => Err(LinesCodecError::MaxLineLengthExceeded),
            Ok(line) => Ok(line),
            Err(e) => Err(LinesCodecError::Io(e)),
        };
        let fatal = matches!(line, Err(LinesCodecError::Io(_)));
        if tx.blocking_send(line).is_err() || fatal {
            break;
        }
    }
}

/// Read `lines` until they end or `shutdown`, dispatching each line on its
/// own task.
///
/// Returns once every in-flight dispatch has finished.
pub async fn run<S>(
    dispatcher: Arc<Dispatcher>,
    session: ConsoleSession,
    mut lines: S,
    shutdown: CancellationToken,
) where
    S: Stream<Item = Line> + Unpin,
{
    let tracker = TaskTracker::new();
    info!(prefix = dispatcher.prefix(), "Console ready");

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested, no longer reading input");
                break;
            }
            next = lines.next() => match next {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(max = MAX_LINE_LENGTH, "Console line too long, skipped");
                    continue;
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    warn!(error = %e, "Console input failed");
                    break;
                }
                None => break,
            },
        };

        let Some(msg) = session.message(&line) else {
            continue;
        };
        let dispatcher = Arc::clone(&dispatcher);
        tracker.spawn(async move {
            if let Err(e) = dispatcher.dispatch(&msg).await {
                debug!(code = e.error_code(), "Dispatch ended with error");
            }
        });
    }

    tracker.close();
    info!(in_flight = tracker.len(), "Waiting for in-flight commands");
    tracker.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rankbot_core::testing::{FnCommand, RecordingMessenger, StaticRoles};
    use rankbot_core::{
        CommandDescriptor, Gate, MemoryStore, ProgressionEngine, RankTable, Registry, Store,
    };
    use std::io::Cursor;
    use std::time::Duration;

    const OWNER: UserId = 7;

    fn dispatcher(ping: Arc<FnCommand>) -> Arc<Dispatcher> {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut registry = Registry::new();
        registry
            .register(CommandDescriptor::new("ping", "general"), ping)
            .unwrap();
        let gate = Gate::new(store.clone(), Arc::new(StaticRoles::new()), [OWNER]);
        let progression = Arc::new(ProgressionEngine::new(store, RankTable::standard()));
        Arc::new(Dispatcher::new(
            "/",
            registry,
            gate,
            progression,
            Arc::new(RecordingMessenger::new()),
        ))
    }

    fn session() -> ConsoleSession {
        ConsoleSession::new(OWNER, "boss", "rankbot")
    }

    #[test]
    fn test_plain_line_is_private_from_owner() {
        let msg = session().message("/rank").unwrap();
        assert!(msg.chat.is_private());
        assert_eq!(msg.chat.id, OWNER);
        assert_eq!(msg.sender.id, OWNER);
        assert_eq!(msg.sender.display_name(), "boss");
        assert_eq!(msg.text, "/rank");
    }

    #[test]
    fn test_blank_lines_skipped() {
        assert!(session().message("   ").is_none());
        assert!(session().message("#group").is_none());
        assert_eq!(session().message("#groupies").unwrap().text, "#groupies");
    }

    #[test]
    fn test_directives_combine() {
        let msg = session().message("#group #as 42 #reply 9 /promote @5 @x").unwrap();
        assert_eq!(msg.chat.id, GROUP_CHAT_ID);
        assert!(!msg.chat.is_private());
        assert_eq!(msg.sender.id, 42);
        assert_eq!(msg.sender.display_name(), "user42");
        assert_eq!(msg.reply_to.as_ref().map(|u| u.id), Some(9));
        assert_eq!(msg.mentions.iter().map(|u| u.id).collect::<Vec<_>>(), vec![5]);
        assert_eq!(msg.text, "/promote @5 @x");
    }

    #[test]
    fn test_bad_directive_is_text() {
        let msg = session().message("#as bob hello").unwrap();
        assert_eq!(msg.sender.id, OWNER);
        assert_eq!(msg.text, "#as bob hello");
    }

    #[test]
    fn test_message_ids_increase() {
        let session = session();
        let a = session.message("one").unwrap();
        let b = session.message("two").unwrap();
        assert!(b.message_id > a.message_id);
    }

    #[tokio::test]
    async fn test_console_chat_roles() {
        let chat = ConsoleChat::new(OWNER);
        assert_eq!(chat.member_role(GROUP_CHAT_ID, OWNER).await.unwrap(), MemberRole::Owner);
        assert!(chat.bot_role(GROUP_CHAT_ID).await.unwrap().is_admin());
        assert_eq!(chat.member_role(GROUP_CHAT_ID, 5).await.unwrap(), MemberRole::Member);

        chat.promote(GROUP_CHAT_ID, 5).await.unwrap();
        let MemberRole::Admin(rights) = chat.member_role(GROUP_CHAT_ID, 5).await.unwrap() else {
            panic!("expected admin");
        };
        assert!(rights.grants("can_promote_members"));

        chat.demote(GROUP_CHAT_ID, 5).await.unwrap();
        assert_eq!(chat.member_role(GROUP_CHAT_ID, 5).await.unwrap(), MemberRole::Member);
        assert!(chat.demote(GROUP_CHAT_ID, OWNER).await.is_err());
    }

    #[test]
    fn test_pump_reports_long_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = format!("one\r\n{}\ntwo", "x".repeat(6));
        pump(Cursor::new(input), 5, &tx);
        drop(tx);

        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "one");
        assert!(matches!(
            rx.blocking_recv(),
            Some(Err(LinesCodecError::MaxLineLengthExceeded))
        ));
        assert_eq!(rx.blocking_recv().unwrap().unwrap(), "two");
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn test_pump_stops_when_receiver_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        pump(Cursor::new("a\nb\nc\n"), 16, &tx);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_run_dispatches_until_input_ends() {
        let ping = Arc::new(FnCommand::new(|_, _| async { Ok(()) }));
        let lines = futures_util::stream::iter(vec![
            Ok("/ping".to_string()),
            Ok("hello".to_string()),
            Err(LinesCodecError::MaxLineLengthExceeded),
            Ok("#as 5 /ping".to_string()),
        ]);

        run(dispatcher(ping.clone()), session(), lines, CancellationToken::new()).await;
        assert_eq!(ping.calls(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting_for_input() {
        let ping = Arc::new(FnCommand::new(|_, _| async { Ok(()) }));
        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        let lines = futures_util::stream::pending::<Line>();
        tokio::time::timeout(
            Duration::from_secs(5),
            run(dispatcher(ping.clone()), session(), lines, shutdown),
        )
        .await
        .expect("run must return once shutdown is requested");
        assert_eq!(ping.calls(), 0);
    }

    #[tokio::test]
    async fn test_announcement_toggle() {
        let chat = ConsoleChat::new(OWNER);
        assert!(chat.announcement.get(&GROUP_CHAT_ID).is_none());
        chat.set_announcement(GROUP_CHAT_ID, true).await.unwrap();
        assert!(chat.announcement.get(&GROUP_CHAT_ID).is_some_and(|v| *v));
    }
}
