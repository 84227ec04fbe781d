//! # rankbot-core
//!
//! Transport-agnostic command dispatch for chat bots.
//!
//! ## Features
//!
//! - Prefix command parsing with `--key=value` and `-x` flags
//! - Command registry with aliases and partial-failure bulk loading
//! - Ordered authorization gate (ban, disabled, scope, developer, admin rights)
//! - XP progression on a quadratic level curve with named rank tiers
//! - Rank-change notification through an explicit callback
//!
//! ## Quick Start
//!
//! ```rust
//! use rankbot_core::{parse, ParsedMessage, RankTable};
//!
//! let ParsedMessage::Command(ctx) = parse("/rank --caption=Well done", "/") else {
//!     unreachable!();
//! };
//! assert_eq!(ctx.command_name, "rank");
//! assert_eq!(ctx.flag("caption"), Some("Well done"));
//!
//! let info = RankTable::standard().rank_for(1_200);
//! assert_eq!(info.tier.name, "Apprentice");
//! ```
//!
//! Collaborators (persistence, messaging, role lookup) are injected through
//! the traits in [`traits`]; [`Dispatcher`] wires them into one pipeline.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod gate;
pub mod message;
pub mod pipeline;
pub mod progression;
pub mod rank;
pub mod records;
pub mod registry;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;

pub use self::context::{InvocationContext, ParsedMessage, parse};
pub use self::descriptor::{CommandDescriptor, Scope};
pub use self::error::{
    CommandError, CommandResult, DispatchError, MessengerError, PluginError, RegistryError,
    ResolveError, Stage, StoreError,
};
pub use self::gate::{DenyReason, Gate, Verdict};
pub use self::message::{Chat, ChatId, ChatKind, IncomingMessage, ReplyTarget, UserId, UserRef};
pub use self::pipeline::{Completion, Dispatched, Dispatcher, GENERIC_FAILURE};
pub use self::progression::{
    Progress, ProgressionEngine, RankChange, RetryPolicy, detect_rank_change,
};
pub use self::rank::{
    NextTier, RankInfo, RankTable, RankTableError, RankTier, STANDARD_TIERS, level_for,
    level_threshold,
};
pub use self::records::{BanStatus, CommandState, UserRecord};
pub use self::registry::{CommandPlugin, LoadReport, RegisteredCommand, Registry, RegistryHandle};
pub use self::store::MemoryStore;
pub use self::traits::{
    AdminRights, Command, DispatchObserver, MemberRole, Messenger, RankNotifier, RoleResolver,
    Store,
};
