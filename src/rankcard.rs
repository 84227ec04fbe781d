//! Rank card rendering.
//!
//! Cards are PNG images fetched from an external rendering service. When
//! rendering fails (or cards are disabled) callers fall back to a plain text
//! reply carrying the same caption; see [`send_rank_card`].

use crate::config::RankCardConfig;
use async_trait::async_trait;
use rankbot_core::{Messenger, MessengerError, RankInfo, ReplyTarget, UserRef};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Rank card errors.
#[derive(Debug, Error)]
pub enum RankCardError {
    #[error("rank cards are disabled")]
    Disabled,
    #[error("rank card request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rank card service returned status {0}")]
    Status(u16),
    #[error("rank card service returned an empty body")]
    Empty,
}

impl RankCardError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Http(_) => "http",
            Self::Status(_) => "status",
            Self::Empty => "empty",
        }
    }
}

/// Renders a user's standing as an image.
#[async_trait]
pub trait RankCard: Send + Sync {
    async fn render(&self, user: &UserRef, info: &RankInfo) -> Result<Vec<u8>, RankCardError>;
}

/// Renderer used when no service is configured.
pub struct NoRankCard;

#[async_trait]
impl RankCard for NoRankCard {
    async fn render(&self, _user: &UserRef, _info: &RankInfo) -> Result<Vec<u8>, RankCardError> {
        Err(RankCardError::Disabled)
    }
}

/// Fetches cards from an HTTP rank card service.
pub struct HttpRankCard {
    client: reqwest::Client,
    url: String,
    background: Option<String>,
    avatar: Option<String>,
    xp_color: String,
}

impl HttpRankCard {
    pub fn new(config: &RankCardConfig) -> Result<Self, RankCardError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("rankbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            background: config.background.clone(),
            avatar: config.avatar.clone(),
            xp_color: config.xp_color.clone(),
        })
    }

    /// Query parameters understood by the card service.
    fn query(&self, user: &UserRef, info: &RankInfo) -> Vec<(&'static str, String)> {
        vec![
            ("username", format!("@{}", user.display_name())),
            ("avatar", self.avatar.clone().unwrap_or_default()),
            ("level", info.level.to_string()),
            ("rank", String::new()),
            ("currentxp", info.xp.to_string()),
            ("nextlevelxp", info.level_xp_target.to_string()),
            ("previouslevelxp", info.previous_level_xp_target.to_string()),
            ("custombg", self.background.clone().unwrap_or_default()),
            ("xpcolor", self.xp_color.clone()),
            ("isboosting", "false".to_string()),
            ("circleavatar", "true".to_string()),
        ]
    }
}

#[async_trait]
impl RankCard for HttpRankCard {
    async fn render(&self, user: &UserRef, info: &RankInfo) -> Result<Vec<u8>, RankCardError> {
        let response = self
            .client
            .get(&self.url)
            .query(&self.query(user, info))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RankCardError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(RankCardError::Empty);
        }

        debug!(user = user.id, bytes = body.len(), "Rendered rank card");
        Ok(body.to_vec())
    }
}

/// Build the renderer for `config`. An empty URL disables cards.
pub fn from_config(config: &RankCardConfig) -> Result<Arc<dyn RankCard>, RankCardError> {
    if config.url.is_empty() {
        info!("Rank cards disabled; rank replies will be text only");
        return Ok(Arc::new(NoRankCard));
    }
    info!(url = %config.url, "Rank card service configured");
    Ok(Arc::new(HttpRankCard::new(config)?))
}

/// Send `user`'s rank card with `caption`, or just the caption when the card
/// cannot be rendered.
pub async fn send_rank_card(
    messenger: &dyn Messenger,
    card: &dyn RankCard,
    target: ReplyTarget,
    user: &UserRef,
    info: &RankInfo,
    caption: &str,
) -> Result<(), MessengerError> {
    match card.render(user, info).await {
        Ok(photo) => messenger.send_photo(target, photo, caption).await,
        Err(RankCardError::Disabled) => messenger.send_text(target, caption).await,
        Err(e) => {
            warn!(user = user.id, error = %e, code = e.error_code(), "Rank card unavailable, sending text");
            messenger.send_text(target, caption).await
        }
    }
}
