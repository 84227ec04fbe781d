//! Anime commands: title, manga and character search, id lookups and
//! artwork.

use super::Deps;
use crate::content::{
    Anime, ArtKind, Artwork, Character, ContentApi, ContentError, Manga, Trailer, send_with_image,
};
use async_trait::async_trait;
use rankbot_core::{
    Command, CommandDescriptor, CommandError, CommandResult, IncomingMessage, InvocationContext,
    Messenger,
};
use std::fmt::Write;
use std::sync::Arc;
use tracing::error;

pub(super) fn anime_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("anime", "anime")
        .alias("ani")
        .describe("Search for anime details.")
        .usage("<anime_name>")
        .xp(1)
}

pub(super) fn manga_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("manga", "anime")
        .alias("mang")
        .alias("manhwa")
        .describe("Search for manga details.")
        .usage("<manga_name>")
        .xp(1)
}

pub(super) fn character_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("character", "anime")
        .alias("char")
        .alias("csearch")
        .describe("Search for anime character details.")
        .usage("<character_name>")
        .xp(1)
}

pub(super) fn aid_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("aid", "anime")
        .alias("animeid")
        .describe("Get detailed info of an anime by ID.")
        .usage("<anime_id>")
        .xp(1)
}

pub(super) fn mid_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("mid", "anime")
        .alias("mangaid")
        .describe("Get detailed info of a manga by ID.")
        .usage("<manga_id>")
        .xp(1)
}

pub(super) fn cid_descriptor() -> CommandDescriptor {
    CommandDescriptor::new("cid", "anime")
        .alias("charid")
        .alias("characterid")
        .describe("Get anime character info by ID.")
        .usage("<character_id>")
        .xp(1)
}

pub(super) fn art_descriptor(kind: ArtKind) -> CommandDescriptor {
    let (name, alias, description) = match kind {
        ArtKind::Waifu => ("waifu", "wife", "Send a random waifu image."),
        ArtKind::Husbando => ("husbu", "husbando", "Send a husbando image."),
        ArtKind::Neko => ("neko", "catgirl", "Send a cute neko image."),
        ArtKind::Kitsune => ("kitsune", "foxgirl", "Send a cute kitsune image."),
    };
    CommandDescriptor::new(name, "anime")
        .alias(alias)
        .describe(description)
        .xp(1)
}

/// What a search or id lookup queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Collection {
    Anime,
    Manga,
    Character,
}

impl Collection {
    fn noun(self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
            Self::Character => "character",
        }
    }

    /// Command showing one entry of this collection by id.
    fn lookup_command(self) -> &'static str {
        match self {
            Self::Anime => "aid",
            Self::Manga => "mid",
            Self::Character => "cid",
        }
    }

    fn fetch_failed(self) -> String {
        format!("⚠️ Failed to fetch {} info. Please try again later.", self.noun())
    }
}

const NOT_FOUND: &str = "🤔 Hmm... I couldn't find anything matching your search.";

fn unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("Unknown")
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn gender_symbol(gender: Option<&str>) -> &'static str {
    match gender {
        Some("Female") => "🚺",
        Some("Male") => "🚹",
        _ => "🚻",
    }
}

// ============================================================================
// search
// ============================================================================

pub(super) struct Search {
    collection: Collection,
    content: Arc<dyn ContentApi>,
    messenger: Arc<dyn Messenger>,
    prefix: String,
}

impl Search {
    pub(super) fn new(deps: &Deps, collection: Collection) -> Self {
        Self {
            collection,
            content: deps.content.clone(),
            messenger: deps.messenger.clone(),
            prefix: deps.prefix.clone(),
        }
    }

    fn more_info(&self, id: u64) -> String {
        format!("🔎 More Info: {}{} {id}", self.prefix, self.collection.lookup_command())
    }

    async fn results(&self, query: &str) -> Result<Vec<String>, ContentError> {
        let entries: Vec<String> = match self.collection {
            Collection::Anime => self
                .content
                .search_anime(query)
                .await?
                .iter()
                .map(|a| {
                    format!(
                        "🎬 English name: {}\n💠 Alternative name: {}\n📀 Type: {}\n📡 Status: {}\n{}",
                        unknown(&a.title.english),
                        unknown(&a.title.romaji),
                        unknown(&a.format),
                        unknown(&a.status),
                        self.more_info(a.id)
                    )
                })
                .collect(),
            Collection::Manga => self
                .content
                .search_manga(query)
                .await?
                .iter()
                .map(|m| {
                    format!(
                        "📖 English name: {}\n🌐 Alternative name: {}\n📌 Status: {}\n⚠️ Is Adult: {} {}\n{}",
                        unknown(&m.title.english),
                        unknown(&m.title.romaji),
                        unknown(&m.status),
                        yes_no(m.is_adult),
                        if m.is_adult { "🔞" } else { "🌀" },
                        self.more_info(m.id)
                    )
                })
                .collect(),
            Collection::Character => self
                .content
                .search_characters(query)
                .await?
                .iter()
                .map(|c| {
                    format!(
                        "🌀 Full name: {}\n💠 Native name: {}\n🔗 Gender: {} {}\n{}",
                        unknown(&c.name.full),
                        unknown(&c.name.native),
                        unknown(&c.gender),
                        gender_symbol(c.gender.as_deref()),
                        self.more_info(c.id)
                    )
                })
                .collect(),
        };
        Ok(entries)
    }
}

#[async_trait]
impl Command for Search {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let query = ctx.args.join(" ");
        if query.is_empty() {
            return Err(CommandError::Denied(format!(
                "❌ Looks like you forgot to type the {} name.",
                self.collection.noun()
            )));
        }

        let entries = self.results(&query).await.map_err(|e| {
            error!(collection = self.collection.noun(), query = %query, error = %e, code = e.error_code(), "Content search failed");
            CommandError::Denied(self.collection.fetch_failed())
        })?;
        if entries.is_empty() {
            return Err(CommandError::Denied(format!(
                "{NOT_FOUND} Maybe try a different name?"
            )));
        }

        let header = match self.collection {
            Collection::Anime => "🎬 Anime Search Results",
            Collection::Manga => "📚 Manga Search Results",
            Collection::Character => "👤 Character Search Results",
        };
        let mut text = format!("{header}\n\nHere's what I found for {query}:");
        for (i, entry) in entries.iter().enumerate() {
            let _ = write!(text, "\n\n#{}\n{entry}", i + 1);
        }
        self.messenger.send_text(msg.reply_target(), &text).await?;
        Ok(())
    }
}

// ============================================================================
// id lookups
// ============================================================================

/// The entry whose id matches, else the service's best match.
fn pick<T>(items: Vec<T>, id: u64, id_of: impl Fn(&T) -> u64) -> Option<T> {
    let exact = items.iter().position(|item| id_of(item) == id);
    items.into_iter().nth(exact.unwrap_or(0))
}

fn trailer_line(trailer: Option<&Trailer>) -> Option<String> {
    trailer
        .and_then(|t| t.id.as_deref())
        .map(|id| format!("\n🎥 Trailer: https://youtu.be/{id}"))
}

fn anime_details(a: &Anime) -> String {
    let mut out = format!(
        "🎬 {} | {}\n💠 Japanese Name: {}\n📀 Type: {}\n🔖 Is Adult: {}\n📡 Status: {}\n🎞 Episodes: {}\n🕒 Duration: {} min per episode\n🗓 First Aired: {}\n📅 Last Aired: {}\n🎨 Genres: {}\n🏢 Studios: {}",
        unknown(&a.title.english),
        unknown(&a.title.romaji),
        unknown(&a.title.native),
        unknown(&a.format),
        yes_no(a.is_adult),
        unknown(&a.status),
        unknown(&a.episodes),
        unknown(&a.duration),
        unknown(&a.start_date),
        unknown(&a.end_date),
        unknown(&a.genres),
        unknown(&a.studios),
    );
    if let Some(line) = trailer_line(a.trailer.as_ref()) {
        out.push_str(&line);
    }
    if let Some(description) = &a.description {
        let _ = write!(out, "\n\n📖 Description:\n{description}");
    }
    out
}

fn manga_details(m: &Manga) -> String {
    let mut out = format!(
        "📚 {} | {}\n🈶 Japanese: {}\n📦 Type: {}\n⚠️ Is Adult: {}\n📌 Status: {}\n📖 Chapters: {}\n📦 Volumes: {}\n⏳ First Aired: {}\n🕰️ Last Aired: {}\n🎭 Genres: {}",
        unknown(&m.title.english),
        unknown(&m.title.romaji),
        unknown(&m.title.native),
        unknown(&m.format),
        yes_no(m.is_adult),
        unknown(&m.status),
        unknown(&m.chapters),
        unknown(&m.volumes),
        unknown(&m.start_date),
        unknown(&m.end_date),
        unknown(&m.genres),
    );
    if let Some(line) = trailer_line(m.trailer.as_ref()) {
        out.push_str(&line);
    }
    if let Some(description) = &m.description {
        let _ = write!(out, "\n\n📄 Description:\n{description}");
    }
    out
}

fn character_details(c: &Character) -> String {
    format!(
        "👤 Name: {}\n💠 Native: {}\n🆔 ID: {}\n🗓 Age: {}\n🔗 Gender: {} {}\n🔗 AniList: {}\n\n📝 Description:\n{}",
        unknown(&c.name.full),
        unknown(&c.name.native),
        c.id,
        unknown(&c.age),
        unknown(&c.gender),
        gender_symbol(c.gender.as_deref()),
        c.site_url.as_deref().unwrap_or("N/A"),
        c.description.as_deref().unwrap_or("No description available."),
    )
}

pub(super) struct Lookup {
    collection: Collection,
    content: Arc<dyn ContentApi>,
    messenger: Arc<dyn Messenger>,
}

impl Lookup {
    pub(super) fn new(deps: &Deps, collection: Collection) -> Self {
        Self {
            collection,
            content: deps.content.clone(),
            messenger: deps.messenger.clone(),
        }
    }

    /// Caption and image URL of the entry with `id`.
    async fn entry(&self, id: u64) -> Result<Option<(String, Option<String>)>, ContentError> {
        let query = id.to_string();
        let entry = match self.collection {
            Collection::Anime => pick(self.content.search_anime(&query).await?, id, |a| a.id)
                .map(|a| (anime_details(&a), a.image_url)),
            Collection::Manga => pick(self.content.search_manga(&query).await?, id, |m| m.id)
                .map(|m| (manga_details(&m), m.cover_image)),
            Collection::Character => {
                pick(self.content.search_characters(&query).await?, id, |c| c.id)
                    .map(|c| (character_details(&c), c.image_url))
            }
        };
        Ok(entry)
    }
}

#[async_trait]
impl Command for Lookup {
    async fn execute(&self, msg: &IncomingMessage, ctx: &InvocationContext) -> CommandResult {
        let noun = self.collection.noun();
        let Some(id) = ctx.arg(0).and_then(|a| a.parse::<u64>().ok()) else {
            return Err(CommandError::Denied(format!(
                "❌ Looks like you forgot to type a valid {noun} ID."
            )));
        };

        let entry = self.entry(id).await.map_err(|e| {
            error!(collection = noun, id, error = %e, code = e.error_code(), "Content lookup failed");
            CommandError::Denied(self.collection.fetch_failed())
        })?;
        let Some((caption, image)) = entry else {
            return Err(CommandError::Denied(format!(
                "🤔 Hmm... I couldn't find anything matching that {noun} ID."
            )));
        };

        send_with_image(
            self.messenger.as_ref(),
            self.content.as_ref(),
            msg.reply_target(),
            image.as_deref(),
            &caption,
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// artwork
// ============================================================================

fn art_caption(kind: ArtKind, art: &Artwork) -> String {
    let heading = match kind {
        ArtKind::Waifu => "💖 Here's a Waifu for you!",
        ArtKind::Husbando => "🧔 Here's a Husbando for you!",
        ArtKind::Neko => "🐾 Here's a Neko for you!",
        ArtKind::Kitsune => "🦊 Here's a Kitsune for you!",
    };
    format!(
        "{heading}\n🎨 Artist: {}\n🔗 Source: {}\n👤 Artist Profile: {}\n🖼 Image: {}",
        art.artist_name, art.source_url, art.artist_href, art.url
    )
}

pub(super) struct Art {
    kind: ArtKind,
    content: Arc<dyn ContentApi>,
    messenger: Arc<dyn Messenger>,
}

impl Art {
    pub(super) fn new(deps: &Deps, kind: ArtKind) -> Self {
        Self {
            kind,
            content: deps.content.clone(),
            messenger: deps.messenger.clone(),
        }
    }
}

#[async_trait]
impl Command for Art {
    async fn execute(&self, msg: &IncomingMessage, _ctx: &InvocationContext) -> CommandResult {
        let kind = self.kind.path();
        let art = self.content.artwork(self.kind).await.map_err(|e| {
            error!(kind, error = %e, code = e.error_code(), "Artwork request failed");
            CommandError::Denied(format!("⚠️ Failed to fetch {kind} image."))
        })?;
        let Some(art) = art else {
            return Err(CommandError::Denied(format!(
                "❌ Couldn't find a {kind} image right now. Try again later."
            )));
        };

        send_with_image(
            self.messenger.as_ref(),
            self.content.as_ref(),
            msg.reply_target(),
            Some(&art.url),
            &art_caption(self.kind, &art),
        )
        .await?;
        Ok(())
    }
}
