//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use rankbot_core::UserId;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: &'static str, value: String },
}

/// Bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot identity and command handling.
    pub bot: BotConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Rank card rendering service.
    pub rank_card: RankCardConfig,
    /// Anime search and artwork services.
    pub content: ContentConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the optional file at `path`, then apply process environment
    /// overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// Empty values are treated as unset, except for `RANK_CARD_URL` where an
    /// empty value disables rank cards.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BOT_NAME") {
            self.bot.name = v;
        }
        if let Some(v) = get("PREFIX") {
            self.bot.prefix = v;
        }
        if let Some(v) = get("APP_TOKEN") {
            self.bot.app_token = Some(v);
        }
        if let Some(v) = get("OWNER_USER_ID") {
            self.bot.owner_user_id = Some(parse_env("OWNER_USER_ID", &v)?);
        }
        if let Some(v) = get("OWNER_USER_NAME") {
            self.bot.owner_user_name = Some(v);
        }
        if let Some(v) = get("OPERATOR_IDS") {
            self.bot.operator_ids = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env("OPERATOR_IDS", s))
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = get("METRICS_PORT") {
            self.bot.metrics_port = parse_env("METRICS_PORT", &v)?;
        }
        if let Some(v) = get("DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = lookup("RANK_CARD_URL") {
            self.rank_card.url = v.trim().to_string();
        }
        if let Some(v) = get("RANK_CARD_BACKGROUND") {
            self.rank_card.background = Some(v);
        }
        if let Some(v) = get("CONTENT_API_URL") {
            self.content.search_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ART_API_URL") {
            self.content.art_url = v.trim_end_matches('/').to_string();
        }

        Ok(self)
    }

    /// Users allowed to run developer-only commands: the owner plus every
    /// configured operator.
    pub fn operators(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.bot.owner_user_id.into_iter().collect();
        for id in &self.bot.operator_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Display name (e.g., "rankbot").
    pub name: String,
    /// Command prefix (default: "/").
    pub prefix: String,
    /// Chat platform token.
    pub app_token: Option<String>,
    /// Platform id of the bot owner; always an operator.
    pub owner_user_id: Option<UserId>,
    /// Owner's user name, shown in help output.
    pub owner_user_name: Option<String>,
    /// Additional operators allowed to run developer-only commands.
    pub operator_ids: Vec<UserId>,
    /// Prometheus metrics HTTP port (0 disables the endpoint).
    pub metrics_port: u16,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            prefix: default_prefix(),
            app_token: None,
            owner_user_id: None,
            owner_user_name: None,
            operator_ids: Vec::new(),
            metrics_port: 0,
        }
    }
}

fn default_name() -> String {
    "rankbot".to_string()
}

fn default_prefix() -> String {
    "/".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "rankbot.db".to_string(),
        }
    }
}

/// Rank card service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankCardConfig {
    /// Card rendering endpoint. Empty disables cards (text replies only).
    pub url: String,
    /// Custom background image URL.
    pub background: Option<String>,
    /// Avatar image URL used for every card; the service default when unset.
    pub avatar: Option<String>,
    /// XP bar colour as a hex triplet without `#`.
    pub xp_color: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RankCardConfig {
    fn default() -> Self {
        Self {
            url: "https://vacefron.nl/api/rankcard".to_string(),
            background: None,
            avatar: None,
            xp_color: "00ffff".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Content service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Base URL of the anime, manga and character search API.
    pub search_url: String,
    /// Base URL of the artwork API.
    pub art_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            search_url: "https://weeb-api.vercel.app".to_string(),
            art_url: "https://nekos.best/api/v2".to_string(),
            timeout_secs: 10,
        }
    }
}
