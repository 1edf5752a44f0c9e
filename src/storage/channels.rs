use anyhow::Result;

use super::schema::Database;
use super::types::{decode_rows, Channel, ChannelRow, JsonColumn};

impl Database {
    // ========================================================================
    // Channel Operations
    // ========================================================================

    /// Replace the channel record for `channel.link` wholesale.
    pub async fn upsert_channel(&self, channel: &Channel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (link, title, description, feed_link, links, updated,
                                  published, authors, language, copyright, generator,
                                  categories, feed_type, feed_version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                feed_link = excluded.feed_link,
                links = excluded.links,
                updated = excluded.updated,
                published = excluded.published,
                authors = excluded.authors,
                language = excluded.language,
                copyright = excluded.copyright,
                generator = excluded.generator,
                categories = excluded.categories,
                feed_type = excluded.feed_type,
                feed_version = excluded.feed_version
            "#,
        )
        .bind(&channel.link)
        .bind(&channel.title)
        .bind(&channel.description)
        .bind(&channel.feed_link)
        .bind(channel.links.to_column()?)
        .bind(&channel.updated)
        .bind(&channel.published)
        .bind(channel.authors.to_column()?)
        .bind(&channel.language)
        .bind(&channel.copyright)
        .bind(&channel.generator)
        .bind(channel.categories.to_column()?)
        .bind(&channel.feed_type)
        .bind(&channel.feed_version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All followed channels ordered by title. Undecodable rows are skipped.
    pub async fn channels(&self) -> Result<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(
            "SELECT link, title, description, feed_link, links, updated, published, authors, \
             language, copyright, generator, categories, feed_type, feed_version \
             FROM channels ORDER BY title COLLATE NOCASE, link",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(rows, "channels"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StringList;
    use pretty_assertions::assert_eq;

    fn channel(link: &str, title: &str) -> Channel {
        Channel {
            link: link.to_string(),
            title: title.to_string(),
            links: StringList(vec!["https://site.example/".into()]),
            categories: StringList(vec!["tech".into(), "rust".into()]),
            feed_type: "rss".into(),
            feed_version: "2.0".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_channel_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        let original = channel("https://a.example/rss", "Alpha");
        db.upsert_channel(&original).await.unwrap();

        let channels = db.channels().await.unwrap();
        assert_eq!(channels, vec![original]);
    }

    #[tokio::test]
    async fn test_upsert_channel_replaces_wholesale() {
        let db = Database::open(":memory:").await.unwrap();
        db.upsert_channel(&channel("https://a.example/rss", "Alpha"))
            .await
            .unwrap();
        let replacement = Channel {
            link: "https://a.example/rss".into(),
            title: "Renamed".into(),
            ..Default::default()
        };
        db.upsert_channel(&replacement).await.unwrap();

        let channels = db.channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0], replacement);
    }

    #[tokio::test]
    async fn test_channels_sorted_by_title() {
        let db = Database::open(":memory:").await.unwrap();
        db.upsert_channel(&channel("https://b.example/rss", "beta"))
            .await
            .unwrap();
        db.upsert_channel(&channel("https://a.example/rss", "Alpha"))
            .await
            .unwrap();
        let titles: Vec<_> = db
            .channels()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, vec!["Alpha", "beta"]);
    }
}
