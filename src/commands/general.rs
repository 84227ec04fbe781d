//! General commands: `hi`, `help`, `rank`.

use super::Deps;
use crate::rankcard::{RankCard, send_rank_card};
use async_trait::async_trait;
use rankbot_core::{
    Command, CommandDescriptor, CommandError, CommandResult, IncomingMessage, InvocationContext,
    Messenger, ProgressionEngine, RankInfo, RegistryHandle,
};
use std::fmt::Write;
use std::sync::Arc;
use tracing::error;

pub(super) fn hi_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("hi", "general")
        .alias("hello")
        .describe("Say hello to the bot.")
        .xp(1)
}

pub(super) fn help_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("help", "general")
        .alias("h")
        .alias("menu")
        .describe("List commands, or show details of one command.")
        .usage("[command]")
        .xp(1)
}

pub(super) fn rank_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("rank", "general")
        .alias("level")
        .alias("xp")
        .describe("Show the rank of a user based on XP.")
        .usage("<@mention> or <reply>")
        .xp(3)
}

// ============================================================================
// hi
// ============================================================================

pub(super) struct Hi {
    messenger: Arc<dyn Messenger>,
}

impl Hi {
    pub(super) fn new(deps: &Deps) -> Self {
        Self {
            messenger: deps.messenger.clone(),
        }
    }
}

#[async_trait]
impl Command for Hi {
    async fn execute(&self, msg: &IncomingMessage, _ctx: &InvocationContext) -> CommandResult {
        let text = format!("Hey @{}, how's your day going?", msg.sender.display_name());
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}

// ============================================================================
// help
// ============================================================================

pub(super) struct Help {
    messenger: Arc<dyn Messenger>,
    registry: RegistryHandle,
    prefix: String,
    bot_name: String,
    owner_name: String,
}

impl Help {
    pub(super) fn new(deps: &Deps) -> Self {
        Self {
            messenger: deps.messenger.clone(),
            registry: deps.registry.clone(),
            prefix: deps.prefix.clone(),
            bot_name: deps.bot_name.clone(),
            owner_name: deps.owner_name.clone(),
        }
    }

    /// Loaded commands grouped by category. Operator commands are not listed.
    fn overview(&self, msg: &IncomingMessage) -> String {
        let registry = self.registry.snapshot();
        let mut categories: Vec<(&str, Vec<&str>)> = Vec::new();
        for d in registry.descriptors().filter(|d| !d.scope.dev_only) {
            match categories.iter_mut().find(|(c, _)| *c == d.category) {
                Some((_, names)) => names.push(d.name.as_str()),
                None => categories.push((d.category.as_str(), vec![d.name.as_str()])),
            }
        }

        let mut out = format!(
            "👋 Hi @{}! I'm {}.\n🔖 Prefix: {}\n",
            msg.sender.display_name(),
            self.bot_name,
            self.prefix
        );
        for (category, names) in categories {
            let _ = write!(out, "\n📂 {}\n{}\n", capitalize(category), names.join(", "));
        }
        let _ = write!(
            out,
            "\n👤 Owner: @{}\n💡 Use {}help <command> for details.",
            self.owner_name, self.prefix
        );
        out
    }

    fn details(&self, d: &CommandDescriptor) -> String {
        let aliases = if d.aliases.is_empty() {
            "None".to_string()
        } else {
            d.aliases.join(", ")
        };
        let mut out = format!(
            "📖 Command: {}\n🔁 Aliases: {}\n📂 Category: {}\n🏅 XP: {}\n📝 Description: {}",
            d.name,
            aliases,
            capitalize(&d.category),
            d.xp_reward,
            d.description
        );
        let _ = write!(out, "\n💡 Usage: {}{}", self.prefix, d.name);
        if let Some(usage) = &d.usage {
            let _ = write!(out, " {usage}");
        }
        out
    }
}

#[async_trait]
impl Command for Help {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let registry = self.registry.snapshot();
        let text = match ctx.arg(0) {
            None => self.overview(msg),
            Some(name) => match registry.resolve(name) {
                Some(command) => self.details(&command.descriptor),
                None => {
                    return Err(CommandError::Denied(format!(
                        "❌ No command named '{name}'. Use {}help to see all commands.",
                        self.prefix
                    )));
                }
            },
        };
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// rank
// ============================================================================

const RANK_ERROR: &str = "❌ An error occurred while getting the rank.";

/// Default rank caption: current tier, plus the next tier and the XP gap
/// while one remains.
fn rank_caption(info: &RankInfo) -> String {
    let mut caption = format!("🏆 Rank: {} {}", info.tier.name, info.tier.emoji);
    if let Some(next) = &info.next {
        let _ = write!(
            caption,
            "\nNext Rank: {} {}\nXP Needed: {}",
            next.tier.name, next.tier.emoji, next.xp_needed
        );
    }
    caption
}

pub(super) struct Rank {
    messenger: Arc<dyn Messenger>,
    progression: Arc<ProgressionEngine>,
    card: Arc<dyn RankCard>,
}

impl Rank {
    pub(super) fn new(deps: &Deps) -> Self {
        Self {
            messenger: deps.messenger.clone(),
            progression: deps.progression.clone(),
            card: deps.rank_card.clone(),
        }
    }
}

#[async_trait]
impl Command for Rank {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let mut users = msg.targets();
        if users.is_empty() {
            users.push(&msg.sender);
        }

        for user in users {
            let info = self.progression.rank_of(user.id).await.map_err(|e| {
                error!(user = user.id, error = %e, "Failed to read rank");
                CommandError::Denied(RANK_ERROR.to_string())
            })?;

            let caption = match ctx.flag("caption") {
                Some(caption) => caption.to_string(),
                None => rank_caption(&info),
            };

            send_rank_card(
                self.messenger.as_ref(),
                self.card.as_ref(),
                msg.reply_target(),
                user,
                &info,
                &caption,
            )
            .await?;
        }
        Ok(())
    }
}
