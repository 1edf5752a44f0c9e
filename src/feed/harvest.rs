use anyhow::{Context, Result};
use std::time::Duration;

use super::fetcher::{build_client, fetch_feed, FetchError, FetchLimits};
use super::progress::Progress;
use crate::config::{AppConfig, Collection};
use crate::document::{Document, Link};
use crate::storage::{Database, Status};
use crate::util::absolutize;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Counts for one collection's harvest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub items_saved: usize,
}

/// Outcome of harvesting one collection in a batch.
pub struct HarvestResult {
    pub collection: String,
    pub result: Result<HarvestReport>,
}

/// Fetches every feed listed in a collection's document and upserts the
/// channels and items it finds.
pub struct Harvester {
    client: reqwest::Client,
    limits: FetchLimits,
}

impl Harvester {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_limits(user_agent, FetchLimits::with_timeout(timeout))
    }

    pub fn with_limits(user_agent: &str, limits: FetchLimits) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(user_agent, limits.timeout)?,
            limits,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::with_limits(
            &config.user_agent(),
            FetchLimits {
                timeout: config.timeout(),
                max_body_bytes: config.max_feed_bytes(),
            },
        )
    }

    /// Harvests one collection.
    ///
    /// # Errors
    ///
    /// Fails if the collection document cannot be read, its database cannot be
    /// opened, or an item cannot be stored. Fetch and parse failures only skip
    /// the affected feed.
    pub async fn harvest(&self, collection: &Collection) -> Result<HarvestReport> {
        let doc = Document::read(&collection.file)
            .await
            .with_context(|| format!("Failed to read {}", collection.file.display()))?;
        let db = collection
            .open_db()
            .await
            .with_context(|| format!("Failed to open {}", collection.db_name.display()))?;

        let links = doc.links();
        tracing::info!(
            collection = %collection.name(),
            feeds = links.len(),
            "Harvesting collection"
        );

        let mut report = HarvestReport::default();
        for link in &links {
            match self.harvest_link(&db, link).await? {
                Some(saved) => {
                    report.feeds_ok += 1;
                    report.items_saved += saved;
                }
                None => report.feeds_failed += 1,
            }
        }

        db.close().await;
        tracing::info!(
            collection = %collection.name(),
            ok = report.feeds_ok,
            failed = report.feeds_failed,
            items = report.items_saved,
            "Harvest complete"
        );
        Ok(report)
    }

    /// Returns `None` when the feed was skipped.
    async fn harvest_link(&self, db: &Database, link: &Link) -> Result<Option<usize>> {
        let feed = match fetch_feed(&self.client, &link.url, self.limits).await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(feed = %link.url, error = %e, "Skipping feed");
                return Ok(None);
            }
        };

        let title = if link.label.is_empty() {
            feed.title.as_str()
        } else {
            link.label.as_str()
        };
        if let Err(e) = db.upsert_channel(&feed.to_channel(&link.url, title)).await {
            tracing::warn!(feed = %link.url, error = %e, "Failed to save channel, skipping feed");
            return Ok(None);
        }

        let total = feed.items.len();
        tracing::info!(feed = %link.url, items = total, "Processing items");
        let mut progress = Progress::new(total);
        for (i, mut item) in feed.items.into_iter().enumerate() {
            item.link = absolutize(&feed.link, &item.link);
            item.status = Status::Unset;
            item.label = link.label.clone();
            item.channel = link.url.clone();
            db.upsert_item(&item)
                .await
                .with_context(|| format!("Failed to save item {}", item.link))?;

            if let Some(message) = progress.check(i + 1) {
                tracing::info!(feed = %link.url, "{}", message);
            }
        }
        tracing::info!(feed = %link.url, processed = total, total = total, "Processed items");
        Ok(Some(total))
    }

    /// Harvests collections one after another. A failing collection is logged
    /// and does not stop the batch.
    pub async fn harvest_all(&self, collections: &[Collection]) -> Vec<HarvestResult> {
        let mut results = Vec::with_capacity(collections.len());
        for collection in collections {
            let result = self.harvest(collection).await;
            if let Err(e) = &result {
                tracing::warn!(collection = %collection.name(), error = %format!("{e:#}"), "Harvest failed");
            }
            results.push(HarvestResult {
                collection: collection.name(),
                result,
            });
        }
        results
    }
}

/// Harvests `collection` with a one-off client.
pub async fn harvest(collection: &Collection, user_agent: &str) -> Result<HarvestReport> {
    Harvester::new(user_agent, DEFAULT_TIMEOUT)?
        .harvest(collection)
        .await
}
