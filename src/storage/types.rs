use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock past the busy timeout
    #[error("Database is locked by another process. Please close it and try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_error(&err.to_string()) {
            return DatabaseError::Locked;
        }
        DatabaseError::Other(err)
    }
}

// SQLITE_BUSY (5): database is locked
// SQLITE_LOCKED (6): database table is locked
pub(crate) fn is_lock_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

/// A stored row whose columns could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {column} column: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown status {0:?}")]
    Status(String),
}

// ============================================================================
// JSON Columns
// ============================================================================

/// Value objects stored as JSON text.
///
/// Encoding and decoding only happen at the storage boundary. An empty or
/// `null` column decodes to the default value.
pub trait JsonColumn: Serialize + DeserializeOwned + Default {
    const COLUMN: &'static str;

    fn to_column(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn from_column(src: &str) -> Result<Self, DecodeError> {
        let src = src.trim();
        if src.is_empty() || src == "null" {
            return Ok(Self::default());
        }
        serde_json::from_str(src).map_err(|source| DecodeError::Json {
            column: Self::COLUMN,
            source,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

impl Person {
    /// RSS-style `email (name)`, or whichever half is present.
    pub fn to_rss(&self) -> String {
        match (self.email.is_empty(), self.name.is_empty()) {
            (false, false) => format!("{} ({})", self.email, self.name),
            (false, true) => self.email.clone(),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authors(pub Vec<Person>);

impl JsonColumn for Authors {
    const COLUMN: &'static str = "authors";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub url: String,
    #[serde(default)]
    pub length: String,
    #[serde(default, rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Enclosures(pub Vec<Enclosure>);

impl Enclosures {
    /// Adds `enclosure`, replacing any existing one with the same URL.
    pub fn upsert(&mut self, enclosure: Enclosure) {
        match self.0.iter_mut().find(|e| e.url == enclosure.url) {
            Some(existing) => *existing = enclosure,
            None => self.0.push(enclosure),
        }
    }
}

impl JsonColumn for Enclosures {
    const COLUMN: &'static str = "enclosures";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringList(pub Vec<String>);

impl JsonColumn for StringList {
    const COLUMN: &'static str = "string list";
}

/// Dublin Core style metadata carried by a feed entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DublinCore {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub creator: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contributor: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rights: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub language: Vec<String>,
}

impl JsonColumn for DublinCore {
    const COLUMN: &'static str = "dcExt";
}

// ============================================================================
// Status
// ============================================================================

/// Curation state of an item. Only `Published` items are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Unset,
    Draft,
    Review,
    Published,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unset => "",
            Status::Draft => "draft",
            Status::Review => "review",
            Status::Published => "published",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(Status::Unset),
            "draft" => Ok(Status::Draft),
            "review" => Ok(Status::Review),
            "published" => Ok(Status::Published),
            other => Err(DecodeError::Status(other.to_string())),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One syndicated or authored unit of content, keyed by `link`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item {
    pub link: String,
    pub title: String,
    pub description: String,
    pub authors: Authors,
    pub enclosures: Enclosures,
    pub guid: String,
    pub pub_date: String,
    pub dc_ext: DublinCore,
    pub channel: String,
    pub status: Status,
    pub label: String,
    pub updated: String,
    pub post_path: String,
    pub source_markdown: String,
}

/// One followed feed, keyed by the URL it was fetched from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub link: String,
    pub title: String,
    pub description: String,
    pub feed_link: String,
    pub links: StringList,
    pub updated: String,
    pub published: String,
    pub authors: Authors,
    pub language: String,
    pub copyright: String,
    pub generator: String,
    pub categories: StringList,
    pub feed_type: String,
    pub feed_version: String,
}

/// A standalone rendered document, keyed by its source path.
#[derive(Debug, Clone, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct Page {
    #[sqlx(rename = "inputPath")]
    pub input_path: String,
    #[sqlx(rename = "outputPath")]
    pub output_path: String,
    pub updated: String,
}

/// Listing entry for an authored post.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PostSummary {
    pub link: String,
    pub title: String,
    #[sqlx(rename = "postPath")]
    pub post_path: String,
    #[sqlx(rename = "pubDate")]
    pub pub_date: String,
    pub updated: String,
}

/// Which authored posts to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    All,
    Recent(u32),
    /// Inclusive `YYYY-MM-DD` bounds on the publication date.
    Range { from: String, to: String },
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
pub(crate) struct ItemRow {
    link: String,
    title: String,
    description: String,
    authors: String,
    enclosures: String,
    guid: String,
    #[sqlx(rename = "pubDate")]
    pub_date: String,
    #[sqlx(rename = "dcExt")]
    dc_ext: String,
    channel: String,
    status: String,
    label: String,
    updated: String,
    #[sqlx(rename = "postPath")]
    post_path: String,
    #[sqlx(rename = "sourceMarkdown")]
    source_markdown: String,
}

impl TryFrom<ItemRow> for Item {
    type Error = DecodeError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Item {
            authors: Authors::from_column(&row.authors)?,
            enclosures: Enclosures::from_column(&row.enclosures)?,
            dc_ext: DublinCore::from_column(&row.dc_ext)?,
            status: row.status.parse()?,
            link: row.link,
            title: row.title,
            description: row.description,
            guid: row.guid,
            pub_date: row.pub_date,
            channel: row.channel,
            label: row.label,
            updated: row.updated,
            post_path: row.post_path,
            source_markdown: row.source_markdown,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct ChannelRow {
    link: String,
    title: String,
    description: String,
    feed_link: String,
    links: String,
    updated: String,
    published: String,
    authors: String,
    language: String,
    copyright: String,
    generator: String,
    categories: String,
    feed_type: String,
    feed_version: String,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = DecodeError;

    fn try_from(row: ChannelRow) -> Result<Self, Self::Error> {
        Ok(Channel {
            links: StringList::from_column(&row.links)?,
            authors: Authors::from_column(&row.authors)?,
            categories: StringList::from_column(&row.categories)?,
            link: row.link,
            title: row.title,
            description: row.description,
            feed_link: row.feed_link,
            updated: row.updated,
            published: row.published,
            language: row.language,
            copyright: row.copyright,
            generator: row.generator,
            feed_type: row.feed_type,
            feed_version: row.feed_version,
        })
    }
}

/// Decodes rows one by one, skipping (and logging) any that fail.
pub(crate) fn decode_rows<R, T>(rows: Vec<R>, table: &'static str) -> Vec<T>
where
    T: TryFrom<R, Error = DecodeError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(table = table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect()
}
