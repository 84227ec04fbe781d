//! Operator commands: `ban`, `unban`, `disable`, `enable`.

use super::Deps;
use async_trait::async_trait;
use rankbot_core::{
    Command, CommandDescriptor, CommandError, CommandResult, IncomingMessage, InvocationContext,
    Messenger, RegistryHandle, Store, UserId,
};
use std::sync::Arc;
use tracing::info;

/// Commands that can never be disabled, so operators cannot lock themselves out.
const PROTECTED: &[&str] = &["ban", "unban", "disable", "enable"];

pub(super) fn ban_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("ban", "dev")
        .describe("Stop a user from using any command.")
        .usage("<user_id> [--reason=...]")
        .dev_only()
}

pub(super) fn unban_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("unban", "dev")
        .describe("Lift a user's ban.")
        .usage("<user_id>")
        .dev_only()
}

pub(super) fn disable_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("disable", "dev")
        .describe("Disable a command for everyone.")
        .usage("<command> [--reason=...]")
        .dev_only()
}

pub(super) fn enable_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("enable", "dev")
        .describe("Re-enable a disabled command.")
        .usage("<command>")
        .dev_only()
}

// ============================================================================
// ban / unban
// ============================================================================

pub(super) struct Ban {
    ban: bool,
    prefix: String,
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
}

impl Ban {
    pub(super) fn new(deps: &Deps, ban: bool) -> Self {
        Self {
            ban,
            prefix: deps.prefix.clone(),
            store: deps.store.clone(),
            messenger: deps.messenger.clone(),
        }
    }

    fn usage(&self) -> CommandError {
        let usage = if self.ban {
            "ban <user_id> [--reason=...]"
        } else {
            "unban <user_id>"
        };
        CommandError::Denied(format!("❗ Usage: {}{usage}", self.prefix))
    }

    /// Replied-to user, else first mention, else a numeric first argument.
    fn target(msg: &IncomingMessage, ctx: &InvocationContext) -> Option<UserId> {
        if let Some(user) = msg.targets().first() {
            return Some(user.id);
        }
        ctx.arg(0)?.parse().ok()
    }
}

#[async_trait]
impl Command for Ban {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let user = Self::target(msg, ctx).ok_or_else(|| self.usage())?;

        if self.ban && user == msg.sender.id {
            return Err(CommandError::Denied("❌ You can't ban yourself.".to_string()));
        }

        let reason = if self.ban { ctx.flag("reason") } else { None };
        self.store.set_user_ban(user, self.ban, reason).await?;
        info!(user, banned = self.ban, by = msg.sender.id, reason = ?reason, "User ban updated");

        let text = match (self.ban, reason) {
            (true, Some(reason)) => format!("🔨 Banned user {user}.\nReason: {reason}"),
            (true, None) => format!("🔨 Banned user {user}."),
            (false, _) => format!("✅ Unbanned user {user}."),
        };
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}

// ============================================================================
// disable / enable
// ============================================================================

pub(super) struct Toggle {
    enable: bool,
    prefix: String,
    registry: RegistryHandle,
    store: Arc<dyn Store>,
    messenger: Arc<dyn Messenger>,
}

impl Toggle {
    pub(super) fn new(deps: &Deps, enable: bool) -> Self {
        Self {
            enable,
            prefix: deps.prefix.clone(),
            registry: deps.registry.clone(),
            store: deps.store.clone(),
            messenger: deps.messenger.clone(),
        }
    }
}

#[async_trait]
impl Command for Toggle {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let verb = if self.enable { "enable" } else { "disable" };
        let Some(token) = ctx.arg(0) else {
            return Err(CommandError::Denied(format!(
                "❗ Usage: {}{verb} <command>",
                self.prefix
            )));
        };

        let registry = self.registry.snapshot();
        let Some(command) = registry.resolve(token) else {
            return Err(CommandError::Denied(format!(
                "❌ Unknown command '{token}'."
            )));
        };
        let name = command.descriptor.name.as_str();

        if !self.enable && PROTECTED.contains(&name) {
            return Err(CommandError::Denied(format!(
                "❌ {}{name} cannot be disabled.",
                self.prefix
            )));
        }

        let reason = if self.enable { None } else { ctx.flag("reason") };
        self.store.set_command_state(name, self.enable, reason).await?;
        info!(command = name, enabled = self.enable, by = msg.sender.id, reason = ?reason, "Command state updated");

        let text = if self.enable {
            format!("✅ Enabled {}{name}.", self.prefix)
        } else {
            format!("🚫 Disabled {}{name}.", self.prefix)
        };
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}
