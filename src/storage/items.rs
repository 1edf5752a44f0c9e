use anyhow::Result;

use super::schema::Database;
use super::types::{
    decode_rows, Item, ItemRow, JsonColumn, PostQuery, PostSummary, Status,
};

const ITEM_COLUMNS: &str = "link, title, description, authors, enclosures, guid, pubDate, \
     dcExt, channel, status, label, updated, postPath, sourceMarkdown";

/// Ordering shared by everything that renders items. `rowid` breaks ties in
/// insertion order.
const RENDER_ORDER: &str = "ORDER BY pubDate DESC, updated DESC, rowid ASC";

impl Database {
    // ========================================================================
    // Item Writes
    // ========================================================================

    /// Insert an item or replace every column of the existing row with the
    /// same link.
    pub async fn upsert_item(&self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (link, postPath, title, description, authors, enclosures,
                               guid, pubDate, dcExt, channel, sourceMarkdown, status,
                               label, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET
                postPath = excluded.postPath,
                title = excluded.title,
                description = excluded.description,
                authors = excluded.authors,
                enclosures = excluded.enclosures,
                guid = excluded.guid,
                pubDate = excluded.pubDate,
                dcExt = excluded.dcExt,
                channel = excluded.channel,
                sourceMarkdown = excluded.sourceMarkdown,
                status = excluded.status,
                label = excluded.label,
                updated = excluded.updated
            "#,
        )
        .bind(&item.link)
        .bind(&item.post_path)
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.authors.to_column()?)
        .bind(item.enclosures.to_column()?)
        .bind(&item.guid)
        .bind(&item.pub_date)
        .bind(item.dc_ext.to_column()?)
        .bind(&item.channel)
        .bind(&item.source_markdown)
        .bind(item.status.as_str())
        .bind(&item.label)
        .bind(&item.updated)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the item whose link or post path equals `link_or_path`.
    /// Returns the number of rows removed.
    pub async fn delete_item(&self, link_or_path: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM items WHERE link = ? OR postPath = ?")
            .bind(link_or_path)
            .bind(link_or_path)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Point update of one item's status. Returns false if no item has `link`.
    pub async fn set_item_status(&self, link: &str, status: Status) -> Result<bool> {
        let result = sqlx::query("UPDATE items SET status = ? WHERE link = ?")
            .bind(status.as_str())
            .bind(link)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Bulk Status Updates
    // ========================================================================

    /// Set every item's status.
    pub async fn reset_all_status(&self, status: Status) -> Result<u64> {
        let result = sqlx::query("UPDATE items SET status = ?")
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Publish items dated within the last `days` days (UTC).
    pub async fn publish_since(&self, days: u32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE items SET status = 'published' WHERE pubDate >= date('now', ?)",
        )
        .bind(format!("-{days} days"))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Move published items dated before the last `days` days back to review.
    pub async fn demote_before(&self, days: u32) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE items SET status = 'review' \
             WHERE status = 'published' AND pubDate < date('now', ?)",
        )
        .bind(format!("-{days} days"))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Publish every item harvested from `channel`.
    pub async fn publish_channel(&self, channel: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE items SET status = 'published' WHERE channel = ?")
            .bind(channel)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Item Queries
    // ========================================================================

    pub async fn get_item(&self, link: &str) -> Result<Option<Item>> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE link = ?"))
                .bind(link)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Item::try_from).transpose()?)
    }

    /// Items eligible for rendering: published, with a title or description,
    /// newest first. Undecodable rows are skipped.
    pub async fn published_items(&self) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = sqlx::query_as(&format!(
            "SELECT {ITEM_COLUMNS} FROM items \
             WHERE status = 'published' AND (title != '' OR description != '') \
             {RENDER_ORDER}"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(rows, "items"))
    }

    /// Every item in render order, optionally restricted to one status.
    pub async fn list_items(&self, status: Option<Status>) -> Result<Vec<Item>> {
        let rows: Vec<ItemRow> = match status {
            Some(status) => {
                sqlx::query_as(&format!(
                    "SELECT {ITEM_COLUMNS} FROM items WHERE status = ? {RENDER_ORDER}"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items {RENDER_ORDER}"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(decode_rows(rows, "items"))
    }

    pub async fn item_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ========================================================================
    // Authored Posts
    // ========================================================================

    /// Authored posts (items with a post path and a publication date).
    pub async fn list_posts(&self, query: &PostQuery) -> Result<Vec<PostSummary>> {
        const BASE: &str = "SELECT link, title, postPath, pubDate, updated FROM items \
                            WHERE postPath != '' AND pubDate != ''";
        let posts: Vec<PostSummary> = match query {
            PostQuery::All => {
                sqlx::query_as(&format!("{BASE} ORDER BY pubDate DESC, rowid ASC"))
                    .fetch_all(&self.pool)
                    .await?
            }
            PostQuery::Recent(limit) => {
                sqlx::query_as(&format!(
                    "{BASE} ORDER BY pubDate DESC, rowid ASC LIMIT ?"
                ))
                .bind(i64::from(*limit))
                .fetch_all(&self.pool)
                .await?
            }
            PostQuery::Range { from, to } => {
                sqlx::query_as(&format!(
                    "{BASE} AND substr(pubDate, 1, 10) BETWEEN ? AND ? \
                     ORDER BY pubDate DESC, rowid ASC"
                ))
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Authors, Person};
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    fn item(link: &str, title: &str, pub_date: &str) -> Item {
        Item {
            link: link.to_string(),
            title: title.to_string(),
            pub_date: pub_date.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_item() {
        let db = test_db().await;
        let mut original = item("https://x.org/1", "One", "2025-01-01 00:00:00");
        original.authors = Authors(vec![Person {
            name: "Jane".into(),
            email: String::new(),
        }]);
        db.upsert_item(&original).await.unwrap();

        let fetched = db.get_item("https://x.org/1").await.unwrap().unwrap();
        assert_eq!(fetched, original);
        assert!(db.get_item("https://x.org/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let db = test_db().await;
        db.upsert_item(&item("https://x.org/1", "Old", "2025-01-01"))
            .await
            .unwrap();
        db.upsert_item(&item("https://x.org/1", "New", "2025-01-02"))
            .await
            .unwrap();

        assert_eq!(db.item_count().await.unwrap(), 1);
        let fetched = db.get_item("https://x.org/1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "New");
        assert_eq!(fetched.pub_date, "2025-01-02");
    }

    #[tokio::test]
    async fn test_delete_item_by_link_or_path() {
        let db = test_db().await;
        let mut post = item("https://x.org/post.html", "Post", "2025-01-01");
        post.post_path = "post.md".into();
        db.upsert_item(&post).await.unwrap();
        db.upsert_item(&item("https://x.org/other", "Other", "2025-01-01"))
            .await
            .unwrap();

        assert_eq!(db.delete_item("post.md").await.unwrap(), 1);
        assert_eq!(db.delete_item("https://x.org/other").await.unwrap(), 1);
        assert_eq!(db.delete_item("nothing").await.unwrap(), 0);
        assert_eq!(db.item_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_published_items_filter_and_order() {
        let db = test_db().await;
        let rows = [
            ("https://x.org/old", "Old", "2024-01-01", Status::Published),
            ("https://x.org/new", "New", "2025-01-01", Status::Published),
            ("https://x.org/review", "Review", "2025-02-01", Status::Review),
            ("https://x.org/empty", "", "2025-03-01", Status::Published),
        ];
        for (link, title, date, status) in rows {
            let mut it = item(link, title, date);
            it.status = status;
            db.upsert_item(&it).await.unwrap();
        }

        let links: Vec<_> = db
            .published_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.link)
            .collect();
        assert_eq!(links, vec!["https://x.org/new", "https://x.org/old"]);
    }

    #[tokio::test]
    async fn test_ties_fall_back_to_insertion_order() {
        let db = test_db().await;
        for link in ["https://x.org/a", "https://x.org/b", "https://x.org/c"] {
            let mut it = item(link, "Same", "2025-01-01");
            it.status = Status::Published;
            db.upsert_item(&it).await.unwrap();
        }
        let links: Vec<_> = db
            .published_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.link)
            .collect();
        assert_eq!(
            links,
            vec!["https://x.org/a", "https://x.org/b", "https://x.org/c"]
        );
    }

    #[tokio::test]
    async fn test_malformed_row_is_skipped() {
        let db = test_db().await;
        let mut good = item("https://x.org/good", "Good", "2025-01-01");
        good.status = Status::Published;
        db.upsert_item(&good).await.unwrap();
        sqlx::query(
            "INSERT INTO items (link, title, status, authors) \
             VALUES ('https://x.org/bad', 'Bad', 'published', '{oops')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let items = db.published_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://x.org/good");
        assert!(db.get_item("https://x.org/bad").await.is_err());
    }

    #[tokio::test]
    async fn test_set_item_status() {
        let db = test_db().await;
        db.upsert_item(&item("https://x.org/1", "One", "2025-01-01"))
            .await
            .unwrap();
        assert!(db
            .set_item_status("https://x.org/1", Status::Published)
            .await
            .unwrap());
        assert!(!db
            .set_item_status("https://x.org/none", Status::Published)
            .await
            .unwrap());
        let listed = db.list_items(Some(Status::Published)).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_status_updates() {
        let db = test_db().await;
        let today = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let old = (chrono::Utc::now() - chrono::Duration::days(100))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let mut fresh = item("https://x.org/fresh", "Fresh", &today);
        fresh.channel = "https://feed.a/rss".into();
        db.upsert_item(&fresh).await.unwrap();
        db.upsert_item(&item("https://x.org/stale", "Stale", &old))
            .await
            .unwrap();

        assert_eq!(db.reset_all_status(Status::Review).await.unwrap(), 2);
        assert_eq!(db.publish_since(21).await.unwrap(), 1);
        assert_eq!(db.publish_channel("https://nobody").await.unwrap(), 0);

        db.reset_all_status(Status::Published).await.unwrap();
        assert_eq!(db.demote_before(90).await.unwrap(), 1);
        let stale = db.get_item("https://x.org/stale").await.unwrap().unwrap();
        assert_eq!(stale.status, Status::Review);
    }

    #[tokio::test]
    async fn test_list_posts_queries() {
        let db = test_db().await;
        for (n, date) in ["2025-01-01", "2025-02-01", "2025-03-01"].iter().enumerate() {
            let mut post = item(&format!("https://x.org/p{n}.html"), "P", date);
            post.post_path = format!("p{n}.md");
            db.upsert_item(&post).await.unwrap();
        }
        db.upsert_item(&item("https://x.org/harvested", "H", "2025-03-01"))
            .await
            .unwrap();

        assert_eq!(db.list_posts(&PostQuery::All).await.unwrap().len(), 3);

        let recent = db.list_posts(&PostQuery::Recent(1)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].post_path, "p2.md");

        let range = db
            .list_posts(&PostQuery::Range {
                from: "2025-01-15".into(),
                to: "2025-02-28".into(),
            })
            .await
            .unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range[0].pub_date, "2025-02-01");
    }
}
