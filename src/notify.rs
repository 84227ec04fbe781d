//! Rank-up announcements.

use crate::rankcard::{RankCard, send_rank_card};
use async_trait::async_trait;
use rankbot_core::{IncomingMessage, Messenger, MessengerError, RankChange, RankNotifier};
use std::sync::Arc;

/// Announces tier changes in the chat that triggered them, with a rank card
/// of the user's new standing.
pub struct RankUpNotifier {
    messenger: Arc<dyn Messenger>,
    card: Arc<dyn RankCard>,
}

impl RankUpNotifier {
    pub fn new(messenger: Arc<dyn Messenger>, card: Arc<dyn RankCard>) -> Self {
        Self { messenger, card }
    }
}

/// Caption announcing `change` to `name`.
pub fn rank_up_caption(name: &str, change: &RankChange) -> String {
    let new = change.tier();
    if change.is_terminal() {
        format!(
            "@{name} You have reached the highest rank! 🏆 {} {}",
            new.name, new.emoji
        )
    } else {
        format!(
            "@{name} You rank up 🎉 from {} {} to {} {}",
            change.previous.name, change.previous.emoji, new.name, new.emoji
        )
    }
}

#[async_trait]
impl RankNotifier for RankUpNotifier {
    async fn rank_changed(
        &self,
        msg: &IncomingMessage,
        change: &RankChange,
    ) -> Result<(), MessengerError> {
        let caption = rank_up_caption(msg.sender.display_name(), change);
        send_rank_card(
            self.messenger.as_ref(),
            self.card.as_ref(),
            msg.reply_target(),
            &msg.sender,
            &change.current,
            &caption,
        )
        .await
    }
}
