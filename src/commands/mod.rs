//! Built-in commands.
//!
//! Every command is a [`CommandPlugin`]: a descriptor plus a handler holding
//! the collaborators it needs. [`builtin_plugins`] produces the full set in
//! registration order.
//!
//! | category | commands |
//! |----------|----------|
//! | general  | `hi`, `help`, `rank` |
//! | chat     | `promote`, `demote`, `lockchat` |
//! | anime    | `anime`, `manga`, `character`, `aid`, `mid`, `cid`, `waifu`, `husbu`, `neko`, `kitsune` |
//! | dev      | `ban`, `unban`, `disable`, `enable` |

mod anime;
mod chat;
mod dev;
mod general;

pub use chat::{ChatAdmin, ChatAdminError};

use crate::content::{ArtKind, ContentApi};
use crate::rankcard::RankCard;
use rankbot_core::{
    Command, CommandDescriptor, CommandPlugin, Messenger, PluginError, ProgressionEngine,
    RegistryHandle, RoleResolver, Store, UserId,
};
use std::sync::Arc;

/// Collaborators shared by the built-in commands.
#[derive(Clone)]
pub struct Deps {
    pub prefix: String,
    pub bot_name: String,
    pub owner_name: String,
    /// The bot's own user id, used to refuse self-targeting.
    pub bot_id: UserId,
    pub store: Arc<dyn Store>,
    pub progression: Arc<ProgressionEngine>,
    pub messenger: Arc<dyn Messenger>,
    pub roles: Arc<dyn RoleResolver>,
    pub chat_admin: Arc<dyn ChatAdmin>,
    pub rank_card: Arc<dyn RankCard>,
    pub content: Arc<dyn ContentApi>,
    /// The live registry, as seen by `help`, `disable` and `enable`.
    pub registry: RegistryHandle,
}

/// Descriptors of every built-in command, in registration order.
pub fn catalog() -> Vec<CommandDescriptor> {
    vec![
        general::hi_descriptor(),
        general::help_descriptor(),
        general::rank_descriptor(),
        chat::promote_descriptor(),
        chat::demote_descriptor(),
        chat::lockchat_descriptor(),
        anime::anime_descriptor(),
        anime::manga_descriptor(),
        anime::character_descriptor(),
        anime::aid_descriptor(),
        anime::mid_descriptor(),
        anime::cid_descriptor(),
        anime::art_descriptor(ArtKind::Waifu),
        anime::art_descriptor(ArtKind::Husbando),
        anime::art_descriptor(ArtKind::Neko),
        anime::art_descriptor(ArtKind::Kitsune),
        dev::ban_descriptor(),
        dev::unban_descriptor(),
        dev::disable_descriptor(),
        dev::enable_descriptor(),
    ]
}

/// Build every built-in command.
pub fn builtin_plugins(deps: &Deps) -> Vec<Result<CommandPlugin, PluginError>> {
    catalog()
        .into_iter()
        .map(|descriptor| {
            let handler: Arc<dyn Command> = match descriptor.name.as_str() {
                "hi" => Arc::new(general::Hi::new(deps)),
                "help" => Arc::new(general::Help::new(deps)),
                "rank" => Arc::new(general::Rank::new(deps)),
                "promote" => Arc::new(chat::Promote::new(deps, chat::Direction::Promote)),
                "demote" => Arc::new(chat::Promote::new(deps, chat::Direction::Demote)),
                "lockchat" => Arc::new(chat::LockChat::new(deps)),
                "anime" => Arc::new(anime::Search::new(deps, anime::Collection::Anime)),
                "manga" => Arc::new(anime::Search::new(deps, anime::Collection::Manga)),
                "character" => Arc::new(anime::Search::new(deps, anime::Collection::Character)),
                "aid" => Arc::new(anime::Lookup::new(deps, anime::Collection::Anime)),
                "mid" => Arc::new(anime::Lookup::new(deps, anime::Collection::Manga)),
                "cid" => Arc::new(anime::Lookup::new(deps, anime::Collection::Character)),
                "waifu" => Arc::new(anime::Art::new(deps, ArtKind::Waifu)),
                "husbu" => Arc::new(anime::Art::new(deps, ArtKind::Husbando)),
                "neko" => Arc::new(anime::Art::new(deps, ArtKind::Neko)),
                "kitsune" => Arc::new(anime::Art::new(deps, ArtKind::Kitsune)),
                "ban" => Arc::new(dev::Ban::new(deps, true)),
                "unban" => Arc::new(dev::Ban::new(deps, false)),
                "disable" => Arc::new(dev::Toggle::new(deps, false)),
                "enable" => Arc::new(dev::Toggle::new(deps, true)),
                other => {
                    return Err(PluginError::new(other, "no handler for built-in command"));
                }
            };
            Ok(CommandPlugin::new(descriptor, handler))
        })
        .collect()
}
