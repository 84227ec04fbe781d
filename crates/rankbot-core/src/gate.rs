//! Layered authorization for resolved commands.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. ban
//! 2. command enabled
//! 3. chat/private scope
//! 4. developer only
//! 5. admin role (bot-not-admin reported before invoker-not-admin)
//! 6. admin rights, for `admin` invokers only (owners are exempt)

use crate::descriptor::CommandDescriptor;
use crate::error::StoreError;
use crate::message::{ChatKind, IncomingMessage, UserId};
use crate::traits::{MemberRole, RoleResolver, Store};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S (%z)";

/// Why an invocation was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Banned {
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    },
    CommandDisabled {
        command: String,
        reason: Option<String>,
        at: Option<DateTime<Utc>>,
    },
    ChatOnly,
    PrivateOnly,
    DeveloperOnly,
    BotNotAdmin,
    NotAdmin,
    MissingPermission(String),
}

impl DenyReason {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Banned { .. } => "banned",
            Self::CommandDisabled { .. } => "command_disabled",
            Self::ChatOnly => "chat_only",
            Self::PrivateOnly => "private_only",
            Self::DeveloperOnly => "developer_only",
            Self::BotNotAdmin => "bot_not_admin",
            Self::NotAdmin => "not_admin",
            Self::MissingPermission(_) => "missing_permission",
        }
    }

    /// The chat-facing explanation.
    pub fn user_message(&self) -> String {
        match self {
            Self::Banned { reason, at } => format!(
                "🚫 Oops! You're banned from using this bot.\n\
                 📝 Reason: {}\n\
                 🕒 Banned at: {}\n\n\
                 Contact admin if this is a mistake.",
                reason.as_deref().unwrap_or("No reason given"),
                format_time(at),
            ),
            Self::CommandDisabled {
                command,
                reason,
                at,
            } => format!(
                "🚫 Command **{command}** is currently disabled.\n\n\
                 ⏰ Disabled at: {}\n\
                 📝 Reason: {}",
                format_time(at),
                reason.as_deref().unwrap_or("No reason given"),
            ),
            Self::ChatOnly => "👥 Chat-only command. Try this in a chat.".to_string(),
            Self::PrivateOnly => "💬 Please use this command in private chat only.".to_string(),
            Self::DeveloperOnly => "⚠️ Oops! This command is only for developers.".to_string(),
            Self::BotNotAdmin => "🤖 Bot must be an admin to execute this command.".to_string(),
            Self::NotAdmin => "❌ You must be an admin to use this command.".to_string(),
            Self::MissingPermission(permission) => {
                format!("❌ You must have '{permission}' permission to run this command.")
            }
        }
    }
}

fn format_time(at: &Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Result of running the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// The ordered authorization checks.
pub struct Gate {
    store: Arc<dyn Store>,
    roles: Arc<dyn RoleResolver>,
    operators: HashSet<UserId>,
}

impl Gate {
    pub fn new(
        store: Arc<dyn Store>,
        roles: Arc<dyn RoleResolver>,
        operators: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            store,
            roles,
            operators: operators.into_iter().collect(),
        }
    }

    pub fn is_operator(&self, user: UserId) -> bool {
        self.operators.contains(&user)
    }

    /// Run every check against `msg` invoking `descriptor`.
    ///
    /// Only persistence failures are errors; a refusal is `Ok(Verdict::Deny)`.
    pub async fn authorize(
        &self,
        descriptor: &CommandDescriptor,
        msg: &IncomingMessage,
    ) -> Result<Verdict, StoreError> {
        let ban = self.store.get_user_ban(msg.sender.id).await?;
        if ban.banned {
            return Ok(Verdict::Deny(DenyReason::Banned {
                reason: ban.reason,
                at: ban.banned_at,
            }));
        }

        let state = self.store.get_command_state(&descriptor.name).await?;
        if !state.enabled {
            return Ok(Verdict::Deny(DenyReason::CommandDisabled {
                command: descriptor.name.clone(),
                reason: state.reason,
                at: state.updated_at,
            }));
        }

        let scope = descriptor.scope;
        if scope.chat_only && msg.chat.kind == ChatKind::Private {
            return Ok(Verdict::Deny(DenyReason::ChatOnly));
        }
        if scope.private_only && msg.chat.kind == ChatKind::Group {
            return Ok(Verdict::Deny(DenyReason::PrivateOnly));
        }

        if scope.dev_only && !self.is_operator(msg.sender.id) {
            return Ok(Verdict::Deny(DenyReason::DeveloperOnly));
        }

        if scope.admin_only {
            let role = self.invoker_role(msg).await;
            if !role.is_admin() {
                if !self.bot_role(msg).await.is_admin() {
                    return Ok(Verdict::Deny(DenyReason::BotNotAdmin));
                }
                return Ok(Verdict::Deny(DenyReason::NotAdmin));
            }

            if let MemberRole::Admin(rights) = &role
                && let Some(missing) = descriptor
                    .admin_permissions
                    .iter()
                    .find(|p| !rights.grants(p))
            {
                return Ok(Verdict::Deny(DenyReason::MissingPermission(missing.clone())));
            }
        }

        Ok(Verdict::Allow)
    }

    /// Private chats have no roles; lookup failures degrade to `Member`.
    async fn invoker_role(&self, msg: &IncomingMessage) -> MemberRole {
        if msg.chat.is_private() {
            return MemberRole::Member;
        }
        self.roles
            .member_role(msg.chat.id, msg.sender.id)
            .await
            .unwrap_or_else(|e| {
                warn!(chat = msg.chat.id, user = msg.sender.id, error = %e, "Role lookup failed");
                MemberRole::Member
            })
    }

    async fn bot_role(&self, msg: &IncomingMessage) -> MemberRole {
        if msg.chat.is_private() {
            return MemberRole::Member;
        }
        self.roles.bot_role(msg.chat.id).await.unwrap_or_else(|e| {
            warn!(chat = msg.chat.id, error = %e, "Bot role lookup failed");
            MemberRole::Member
        })
    }
}
