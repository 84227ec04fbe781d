//! Chat administration commands: `promote`, `demote`, `lockchat`.

use super::Deps;
use async_trait::async_trait;
use rankbot_core::{
    ChatId, Command, CommandDescriptor, CommandError, CommandResult, IncomingMessage,
    InvocationContext, MemberRole, Messenger, RoleResolver, UserId, UserRef,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Chat administration failures.
#[derive(Debug, Error)]
pub enum ChatAdminError {
    #[error("chat action failed: {0}")]
    Action(String),
}

/// Platform-side chat administration.
#[async_trait]
pub trait ChatAdmin: Send + Sync {
    /// Grant `user` full admin rights in `chat`.
    async fn promote(&self, chat: ChatId, user: UserId) -> Result<(), ChatAdminError>;

    /// Revoke every admin right `user` holds in `chat`.
    async fn demote(&self, chat: ChatId, user: UserId) -> Result<(), ChatAdminError>;

    /// Turn announcement mode on (only admins may post) or off.
    async fn set_announcement(&self, chat: ChatId, enabled: bool) -> Result<(), ChatAdminError>;
}

pub(super) fn promote_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("promote", "chat")
        .describe("Promote mentioned or replied-to users to admin.")
        .usage("<@mention> or <reply>")
        .chat_only()
        .admin_only(["can_promote_members"])
        .xp(3)
}

pub(super) fn demote_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("demote", "chat")
        .describe("Demote mentioned or replied-to admins to regular users.")
        .usage("<@mention> or <reply>")
        .chat_only()
        .admin_only(["can_promote_members"])
        .xp(3)
}

pub(super) fn lockchat_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("lockchat", "chat")
        .alias("muteall")
        .alias("adminonly")
        .describe("Only allow admins to send messages.")
        .usage("on|off")
        .chat_only()
        .admin_only(["can_change_info"])
        .xp(2)
}

// ============================================================================
// promote / demote
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    Promote,
    Demote,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
        }
    }

    fn success(self, user: &UserRef) -> String {
        match self {
            Self::Promote => format!("✅ Promoted @{} to admin!", user.display_name()),
            Self::Demote => format!("✅ Demoted @{} to regular user.", user.display_name()),
        }
    }
}

/// Changes the admin status of every target in turn. Refusals for one target
/// are reported in the chat and do not stop the others.
pub(super) struct Promote {
    direction: Direction,
    bot_id: UserId,
    messenger: Arc<dyn Messenger>,
    roles: Arc<dyn RoleResolver>,
    chat_admin: Arc<dyn ChatAdmin>,
}

impl Promote {
    pub(super) fn new(deps: &Deps, direction: Direction) -> Self {
        Self {
            direction,
            bot_id: deps.bot_id,
            messenger: deps.messenger.clone(),
            roles: deps.roles.clone(),
            chat_admin: deps.chat_admin.clone(),
        }
    }

    /// Apply the change to one target, returning the reply for it.
    async fn apply(&self, msg: &IncomingMessage, user: &UserRef) -> Result<String, ChatAdminError> {
        let verb = self.direction.verb();

        if user.id == msg.sender.id {
            return Ok(format!("❌ You can't {verb} yourself."));
        }

        let role = self
            .roles
            .member_role(msg.chat.id, user.id)
            .await
            .map_err(|e| ChatAdminError::Action(e.to_string()))?;
        if role == MemberRole::Owner {
            let name = user.full_name.as_deref().unwrap_or(user.display_name());
            return Ok(format!("❌ Cannot {verb} group owner: {name}"));
        }

        if user.id == self.bot_id {
            return Ok(format!("❌ I can't {verb} myself."));
        }

        match self.direction {
            Direction::Promote => self.chat_admin.promote(msg.chat.id, user.id).await?,
            Direction::Demote => self.chat_admin.demote(msg.chat.id, user.id).await?,
        }
        Ok(self.direction.success(user))
    }
}

#[async_trait]
impl Command for Promote {
    async fn execute(&self, msg: &IncomingMessage, _ctx: &InvocationContext) -> CommandResult {
        let verb = self.direction.verb();
        let targets = msg.targets();
        if targets.is_empty() {
            return Err(CommandError::Denied(format!(
                "❗ Please mention at least one user or reply to their message to {verb} them."
            )));
        }

        for user in targets {
            let reply = self.apply(msg, user).await.map_err(|e| {
                error!(chat = msg.chat.id, user = user.id, error = %e, "Failed to {verb} user");
                CommandError::Denied(format!("❌ Failed to {verb} user(s)."))
            })?;
            self.messenger.send_text(msg.reply_target(), &reply).await?;
        }
        Ok(())
    }
}

// ============================================================================
// lockchat
// ============================================================================

pub(super) struct LockChat {
    prefix: String,
    messenger: Arc<dyn Messenger>,
    chat_admin: Arc<dyn ChatAdmin>,
}

impl LockChat {
    pub(super) fn new(deps: &Deps) -> Self {
        Self {
            prefix: deps.prefix.clone(),
            messenger: deps.messenger.clone(),
            chat_admin: deps.chat_admin.clone(),
        }
    }
}

#[async_trait]
impl Command for LockChat {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let Some(option) = ctx.arg(0) else {
            return Err(CommandError::Denied(format!(
                "⚠️ Please specify on or off.\nExample: {}lockchat on",
                self.prefix
            )));
        };

        let enabled = match option.trim().to_lowercase().as_str() {
            "on" => true,
            "off" => false,
            _ => {
                return Err(CommandError::Denied(
                    "❌ Invalid option. Use *on* or *off* only.".to_string(),
                ));
            }
        };

        if let Err(e) = self.chat_admin.set_announcement(msg.chat.id, enabled).await {
            error!(chat = msg.chat.id, error = %e, "Failed to toggle announcement mode");
            return Err(CommandError::Denied(
                "❗ An error occurred while toggling group announcement.".to_string(),
            ));
        }

        let state = if enabled { "enabled" } else { "disabled" };
        let text = format!("📢 Chat announcement mode is now {state}.");
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{BOT_ID, RecordingChatAdmin, ctx, fixture, fixture_with};
    use super::*;
    use rankbot_core::Chat;
    use rankbot_core::testing::StaticRoles;

    const CHAT: ChatId = -100;
    const SENDER: UserId = 1;

    fn group(text: &str) -> IncomingMessage {
        IncomingMessage::new(5, Chat::group(CHAT, "Guild"), UserRef::new(SENDER), text)
    }

    #[tokio::test]
    async fn test_promote_requires_targets() {
        let fx = fixture();
        let cmd = Promote::new(&fx.deps, Direction::Promote);
        let err = cmd.execute(&group("/promote"), &ctx("/promote")).await.unwrap_err();
        assert_eq!(
            err,
            CommandError::Denied(
                "❗ Please mention at least one user or reply to their message to promote them."
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_promote_reply_target() {
        let fx = fixture();
        let msg = group("/promote").replying_to(UserRef::new(2).with_username("bob"));
        Promote::new(&fx.deps, Direction::Promote)
            .execute(&msg, &ctx("/promote"))
            .await
            .unwrap();

        assert_eq!(fx.admin.calls.lock().as_slice(), ["promote -100 2"]);
        assert_eq!(fx.messenger.last_body().as_deref(), Some("✅ Promoted @bob to admin!"));
    }

    #[tokio::test]
    async fn test_refusals_do_not_stop_other_targets() {
        let roles = StaticRoles::new().member(CHAT, 3, MemberRole::Owner);
        let fx = fixture_with(roles, RecordingChatAdmin::default());
        let msg = group("/demote")
            .mentioning(UserRef::new(SENDER))
            .mentioning(UserRef::new(3).with_full_name("Olga Owner"))
            .mentioning(UserRef::new(BOT_ID))
            .mentioning(UserRef::new(4).with_username("dave"));

        Promote::new(&fx.deps, Direction::Demote)
            .execute(&msg, &ctx("/demote"))
            .await
            .unwrap();

        assert_eq!(
            fx.messenger.bodies(),
            vec![
                "❌ You can't demote yourself.",
                "❌ Cannot demote group owner: Olga Owner",
                "❌ I can't demote myself.",
                "✅ Demoted @dave to regular user.",
            ]
        );
        assert_eq!(fx.admin.calls.lock().as_slice(), ["demote -100 4"]);
    }

    #[tokio::test]
    async fn test_promote_failure_reported() {
        let admin = RecordingChatAdmin {
            fail: true,
            ..Default::default()
        };
        let fx = fixture_with(StaticRoles::new(), admin);
        let msg = group("/promote").mentioning(UserRef::new(2));

        let err = Promote::new(&fx.deps, Direction::Promote)
            .execute(&msg, &ctx("/promote"))
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::Denied("❌ Failed to promote user(s).".to_string()));
    }

    #[tokio::test]
    async fn test_lockchat_usage() {
        let fx = fixture();
        let cmd = LockChat::new(&fx.deps);

        let err = cmd.execute(&group("/lockchat"), &ctx("/lockchat")).await.unwrap_err();
        assert_eq!(
            err,
            CommandError::Denied("⚠️ Please specify on or off.\nExample: /lockchat on".to_string())
        );

        let err = cmd
            .execute(&group("/lockchat maybe"), &ctx("/lockchat maybe"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::Denied("❌ Invalid option. Use *on* or *off* only.".to_string())
        );
        assert!(fx.admin.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_lockchat_toggles() {
        let fx = fixture();
        let cmd = LockChat::new(&fx.deps);

        cmd.execute(&group("/lockchat ON"), &ctx("/lockchat ON")).await.unwrap();
        cmd.execute(&group("/lockchat off"), &ctx("/lockchat off")).await.unwrap();

        assert_eq!(
            fx.admin.calls.lock().as_slice(),
            ["announce -100 true", "announce -100 false"]
        );
        assert_eq!(
            fx.messenger.bodies(),
            vec![
                "📢 Chat announcement mode is now enabled.",
                "📢 Chat announcement mode is now disabled.",
            ]
        );
    }
}
