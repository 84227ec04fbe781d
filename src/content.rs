//! Anime content lookups.
//!
//! Titles, manga and characters come from a search API that answers
//! `GET {search_url}/{anime|manga|character}?search=<query>` with a JSON
//! array. Artwork comes from an API answering `GET {art_url}/<kind>` with
//! `{"results": [...]}`. Both sit behind [`ContentApi`] so commands can be
//! tested against scripted data.

use crate::config::ContentConfig;
use async_trait::async_trait;
use rankbot_core::{Messenger, MessengerError, ReplyTarget};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Content service errors.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("content service returned status {0}")]
    Status(u16),
    #[error("content service returned an empty body")]
    Empty,
}

impl ContentError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Http(e) if e.is_decode() => "decode",
            Self::Http(_) => "http",
            Self::Status(_) => "status",
            Self::Empty => "empty",
        }
    }
}

/// English, romanized and native titles. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Title {
    #[serde(deserialize_with = "text")]
    pub english: Option<String>,
    #[serde(deserialize_with = "text")]
    pub romaji: Option<String>,
    #[serde(deserialize_with = "text")]
    pub native: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Trailer {
    #[serde(deserialize_with = "text")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Anime {
    pub id: u64,
    pub title: Title,
    #[serde(deserialize_with = "text")]
    pub format: Option<String>,
    pub is_adult: bool,
    #[serde(deserialize_with = "text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "text")]
    pub episodes: Option<String>,
    #[serde(deserialize_with = "text")]
    pub duration: Option<String>,
    #[serde(deserialize_with = "text")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub genres: Option<String>,
    #[serde(deserialize_with = "text")]
    pub studios: Option<String>,
    pub trailer: Option<Trailer>,
    #[serde(deserialize_with = "text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "text")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Manga {
    pub id: u64,
    pub title: Title,
    #[serde(deserialize_with = "text")]
    pub format: Option<String>,
    pub is_adult: bool,
    #[serde(deserialize_with = "text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "text")]
    pub chapters: Option<String>,
    #[serde(deserialize_with = "text")]
    pub volumes: Option<String>,
    #[serde(deserialize_with = "text")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub end_date: Option<String>,
    #[serde(deserialize_with = "text")]
    pub genres: Option<String>,
    pub trailer: Option<Trailer>,
    #[serde(deserialize_with = "text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "text")]
    pub cover_image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CharacterName {
    #[serde(deserialize_with = "text")]
    pub full: Option<String>,
    #[serde(deserialize_with = "text")]
    pub native: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Character {
    pub id: u64,
    pub name: CharacterName,
    #[serde(deserialize_with = "text")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "text")]
    pub age: Option<String>,
    #[serde(deserialize_with = "text")]
    pub site_url: Option<String>,
    #[serde(deserialize_with = "text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "text")]
    pub image_url: Option<String>,
}

/// One artwork entry with its attribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Artwork {
    pub url: String,
    pub artist_name: String,
    pub artist_href: String,
    pub source_url: String,
}

#[derive(Deserialize)]
struct ArtworkPage {
    #[serde(default)]
    results: Vec<Artwork>,
}

/// Artwork categories served by the artwork API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtKind {
    Waifu,
    Husbando,
    Neko,
    Kitsune,
}

impl ArtKind {
    pub fn path(self) -> &'static str {
        match self {
            Self::Waifu => "waifu",
            Self::Husbando => "husbando",
            Self::Neko => "neko",
            Self::Kitsune => "kitsune",
        }
    }
}

/// Source of anime titles, manga, characters and artwork.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn search_anime(&self, query: &str) -> Result<Vec<Anime>, ContentError>;

    async fn search_manga(&self, query: &str) -> Result<Vec<Manga>, ContentError>;

    async fn search_characters(&self, query: &str) -> Result<Vec<Character>, ContentError>;

    /// One random artwork of `kind`, or `None` when the service has none.
    async fn artwork(&self, kind: ArtKind) -> Result<Option<Artwork>, ContentError>;

    /// Download the image at `url`.
    async fn image(&self, url: &str) -> Result<Vec<u8>, ContentError>;
}

/// [`ContentApi`] over HTTP.
pub struct HttpContentApi {
    client: reqwest::Client,
    search_url: String,
    art_url: String,
}

impl HttpContentApi {
    pub fn new(config: &ContentConfig) -> Result<Self, ContentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("rankbot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            search_url: config.search_url.trim_end_matches('/').to_string(),
            art_url: config.art_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_endpoint(&self, collection: &str) -> String {
        format!("{}/{collection}", self.search_url)
    }

    fn art_endpoint(&self, kind: ArtKind) -> String {
        format!("{}/{}", self.art_url, kind.path())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ContentError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status(status.as_u16()));
        }
        Ok(response.json().await?)
    }

    async fn search<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<Vec<T>, ContentError> {
        // The search API answers `null` rather than `[]` when nothing matches.
        let found: Option<Vec<T>> = self
            .get_json(&self.search_endpoint(collection), &[("search", query)])
            .await?;
        let found = found.unwrap_or_default();
        debug!(collection, query, results = found.len(), "Content search");
        Ok(found)
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn search_anime(&self, query: &str) -> Result<Vec<Anime>, ContentError> {
        self.search("anime", query).await
    }

    async fn search_manga(&self, query: &str) -> Result<Vec<Manga>, ContentError> {
        self.search("manga", query).await
    }

    async fn search_characters(&self, query: &str) -> Result<Vec<Character>, ContentError> {
        self.search("character", query).await
    }

    async fn artwork(&self, kind: ArtKind) -> Result<Option<Artwork>, ContentError> {
        let page: ArtworkPage = self.get_json(&self.art_endpoint(kind), &[]).await?;
        Ok(page.results.into_iter().next())
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>, ContentError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(body.to_vec())
    }
}

/// Send the image at `image_url` with `caption`, or just the caption when
/// there is no image or it cannot be downloaded.
pub async fn send_with_image(
    messenger: &dyn Messenger,
    content: &dyn ContentApi,
    target: ReplyTarget,
    image_url: Option<&str>,
    caption: &str,
) -> Result<(), MessengerError> {
    let Some(url) = image_url.filter(|u| !u.is_empty()) else {
        return messenger.send_text(target, caption).await;
    };
    match content.image(url).await {
        Ok(photo) => messenger.send_photo(target, photo, caption).await,
        Err(e) => {
            warn!(url, error = %e, code = e.error_code(), "Image unavailable, sending text");
            messenger.send_text(target, caption).await
        }
    }
}

/// Accept any JSON scalar where text is expected. Arrays are joined with
/// `", "`, `{year, month, day}` dates become `YYYY-M-D`, `null` is absent.
fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(render(Value::deserialize(deserializer)?))
}

fn render(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(render).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) if map.contains_key("year") => {
            let parts: Vec<String> = ["year", "month", "day"]
                .iter()
                .filter_map(|k| map.get(*k).cloned().and_then(render))
                .collect();
            (!parts.is_empty()).then(|| parts.join("-"))
        }
        Value::Object(map) => map.get("name").cloned().and_then(render),
    }
}
