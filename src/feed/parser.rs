use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed, FeedType, Link};
use feed_rs::parser;

use crate::storage::{
    Authors, Channel, DublinCore, Enclosure, Enclosures, Item, Person, StringList,
};

/// Layout used for every timestamp harvested from a feed. Sorts lexically and
/// compares directly against SQLite's `date()`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A feed reduced to the fields persisted for its channel and items.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    /// Site link.
    pub link: String,
    /// The feed's self link, if it declares one.
    pub feed_link: String,
    pub links: Vec<String>,
    pub updated: String,
    pub published: String,
    pub authors: Vec<Person>,
    pub language: String,
    pub copyright: String,
    pub generator: String,
    pub categories: Vec<String>,
    pub feed_type: String,
    pub feed_version: String,
    pub items: Vec<Item>,
}

impl ParsedFeed {
    /// Channel record for a feed fetched from `href`.
    pub fn to_channel(&self, href: &str, title: &str) -> Channel {
        Channel {
            link: href.to_string(),
            title: title.to_string(),
            description: self.description.clone(),
            feed_link: self.feed_link.clone(),
            links: StringList(self.links.clone()),
            updated: self.updated.clone(),
            published: self.published.clone(),
            authors: Authors(self.authors.clone()),
            language: self.language.clone(),
            copyright: self.copyright.clone(),
            generator: self.generator.clone(),
            categories: StringList(self.categories.clone()),
            feed_type: self.feed_type.clone(),
            feed_version: self.feed_version.clone(),
        }
    }
}

/// Parses RSS, Atom or JSON Feed. Format is detected by `feed-rs`.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(convert_feed(feed))
}

fn convert_feed(feed: Feed) -> ParsedFeed {
    let (feed_type, feed_version) = match feed.feed_type {
        FeedType::Atom => ("atom", "1.0"),
        FeedType::JSON => ("json", "1.1"),
        FeedType::RSS0 => ("rss", "0.9"),
        FeedType::RSS1 => ("rss", "1.0"),
        FeedType::RSS2 => ("rss", "2.0"),
    };

    let items = feed.entries.into_iter().filter_map(convert_entry).collect();

    ParsedFeed {
        title: feed.title.map(|t| t.content).unwrap_or_default(),
        description: feed.description.map(|t| t.content).unwrap_or_default(),
        link: site_link(&feed.links).unwrap_or_default(),
        feed_link: feed
            .links
            .iter()
            .find(|l| l.rel.as_deref() == Some("self"))
            .map(|l| l.href.clone())
            .unwrap_or_default(),
        links: feed
            .links
            .iter()
            .filter(|l| l.rel.as_deref() != Some("self"))
            .map(|l| l.href.clone())
            .collect(),
        updated: format_timestamp(feed.updated),
        published: format_timestamp(feed.published),
        authors: feed.authors.into_iter().map(convert_person).collect(),
        language: feed.language.unwrap_or_default(),
        copyright: feed.rights.map(|t| t.content).unwrap_or_default(),
        generator: feed.generator.map(|g| g.content).unwrap_or_default(),
        categories: feed.categories.into_iter().map(|c| c.term).collect(),
        feed_type: feed_type.to_string(),
        feed_version: feed_version.to_string(),
        items,
    }
}

/// Converts one entry. Entries with neither a link nor an id have no stable
/// identity and are dropped.
fn convert_entry(entry: Entry) -> Option<Item> {
    let link = site_link(&entry.links).unwrap_or_else(|| entry.id.clone());
    if link.trim().is_empty() {
        tracing::debug!("Skipping entry without link or id");
        return None;
    }

    let description = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    let mut enclosures = Enclosures::default();
    for content in entry.media.iter().flat_map(|m| m.content.iter()) {
        if let Some(url) = &content.url {
            enclosures.upsert(Enclosure {
                url: url.to_string(),
                length: content.size.map(|s| s.to_string()).unwrap_or_default(),
                mime_type: content
                    .content_type
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            });
        }
    }

    let dc_ext = DublinCore {
        creator: entry.authors.iter().map(|a| a.name.clone()).collect(),
        contributor: entry.contributors.iter().map(|c| c.name.clone()).collect(),
        subject: entry.categories.iter().map(|c| c.term.clone()).collect(),
        date: entry
            .published
            .iter()
            .map(|d| d.to_rfc3339())
            .collect(),
        rights: entry.rights.iter().map(|r| r.content.clone()).collect(),
        source: entry.source.iter().cloned().collect(),
        language: entry.language.iter().cloned().collect(),
    };

    Some(Item {
        link,
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description,
        authors: Authors(entry.authors.into_iter().map(convert_person).collect()),
        enclosures,
        guid: entry.id,
        pub_date: format_timestamp(entry.published.or(entry.updated)),
        dc_ext,
        updated: format_timestamp(entry.updated),
        ..Default::default()
    })
}

/// First link that points at a page rather than the feed itself.
fn site_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.iter().find(|l| l.rel.as_deref() != Some("self")))
        .map(|l| l.href.clone())
}

fn convert_person(person: feed_rs::model::Person) -> Person {
    Person {
        name: person.name,
        email: person.email.unwrap_or_default(),
    }
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}
