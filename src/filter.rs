//! Status classification rules.
//!
//! Each collection lists rules as short strings in its configuration:
//!
//! | Rule | Effect |
//! | --- | --- |
//! | `reset <status>` | set every item's status (`review`, `draft`, `published`, `none`) |
//! | `promote-recent <days>` | publish items dated within the last `days` days |
//! | `demote-older <days>` | send published items older than `days` days back to review |
//! | `publish-channel <feed url>` | publish everything harvested from one feed |
//!
//! Rules run in order against the collection's database. Each statement
//! commits on its own, so a failing rule leaves earlier rules applied.
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::Collection;
use crate::storage::{Database, DatabaseError, Status};

const DEFAULT_RULES: [&str; 2] = ["reset review", "promote-recent 21"];

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter rule {rule:?}: {reason}")]
    Parse { rule: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("filter rule {rule:?} failed: {source}")]
    Apply {
        rule: String,
        #[source]
        source: anyhow::Error,
    },
}

/// One classification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    ResetStatus(Status),
    PromoteByRecency { days: u32 },
    DemoteOlderThan { days: u32 },
    PublishChannel(String),
}

impl FilterRule {
    /// Applies the rule; returns the number of items touched.
    pub async fn apply(&self, db: &Database) -> anyhow::Result<u64> {
        match self {
            FilterRule::ResetStatus(status) => db.reset_all_status(*status).await,
            FilterRule::PromoteByRecency { days } => db.publish_since(*days).await,
            FilterRule::DemoteOlderThan { days } => db.demote_before(*days).await,
            FilterRule::PublishChannel(channel) => db.publish_channel(channel).await,
        }
    }
}

impl FromStr for FilterRule {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| FilterError::Parse {
            rule: s.to_string(),
            reason: reason.to_string(),
        };
        let days = |arg: Option<&str>| -> Result<u32, FilterError> {
            arg.ok_or_else(|| err("missing number of days"))?
                .parse()
                .map_err(|_| err("number of days must be a non-negative integer"))
        };

        let mut parts = s.split_whitespace();
        let keyword = parts.next().ok_or_else(|| err("empty rule"))?;
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(err("too many arguments"));
        }

        match keyword {
            "reset" => {
                let status = match arg.ok_or_else(|| err("missing status"))? {
                    "none" => Status::Unset,
                    other => other.parse().map_err(|_| err("unknown status"))?,
                };
                Ok(FilterRule::ResetStatus(status))
            }
            "promote-recent" => Ok(FilterRule::PromoteByRecency { days: days(arg)? }),
            "demote-older" => Ok(FilterRule::DemoteOlderThan { days: days(arg)? }),
            "publish-channel" => Ok(FilterRule::PublishChannel(
                arg.ok_or_else(|| err("missing feed url"))?.to_string(),
            )),
            _ => Err(err("unknown rule")),
        }
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRule::ResetStatus(Status::Unset) => write!(f, "reset none"),
            FilterRule::ResetStatus(status) => write!(f, "reset {status}"),
            FilterRule::PromoteByRecency { days } => write!(f, "promote-recent {days}"),
            FilterRule::DemoteOlderThan { days } => write!(f, "demote-older {days}"),
            FilterRule::PublishChannel(url) => write!(f, "publish-channel {url}"),
        }
    }
}

pub fn default_rules() -> Vec<FilterRule> {
    vec![
        FilterRule::ResetStatus(Status::Review),
        FilterRule::PromoteByRecency { days: 21 },
    ]
}

pub(crate) fn default_rule_strings() -> Vec<String> {
    DEFAULT_RULES.iter().map(|r| r.to_string()).collect()
}

/// Parses rule strings, skipping blank ones.
pub fn parse_rules(rules: &[String]) -> Result<Vec<FilterRule>, FilterError> {
    rules
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|r| r.parse())
        .collect()
}

/// Runs `rules` in order, stopping at the first failure.
pub async fn apply_rules(db: &Database, rules: &[FilterRule]) -> Result<u64, FilterError> {
    let mut touched = 0;
    for rule in rules {
        let n = rule.apply(db).await.map_err(|source| FilterError::Apply {
            rule: rule.to_string(),
            source,
        })?;
        tracing::debug!(rule = %rule, items = n, "Applied filter rule");
        touched += n;
    }
    Ok(touched)
}

/// Applies a collection's configured rules (the defaults when it lists none)
/// to its database.
pub async fn apply_filters(collection: &Collection) -> Result<u64, FilterError> {
    let mut rules = parse_rules(&collection.filters)?;
    if rules.is_empty() {
        rules = default_rules();
    }
    let db = collection.open_db().await?;
    let touched = apply_rules(&db, &rules).await?;
    db.close().await;
    tracing::info!(
        collection = %collection.name(),
        rules = rules.len(),
        items = touched,
        "Applied filters"
    );
    Ok(touched)
}

/// Applies filters to each collection; failures are logged and counted.
pub async fn apply_filters_all(collections: &[Collection]) -> usize {
    let mut failures = 0;
    for collection in collections {
        if let Err(e) = apply_filters(collection).await {
            tracing::warn!(collection = %collection.name(), error = %e, "Filtering failed");
            failures += 1;
        }
    }
    failures
}

// ============================================================================
// Point Curation
// ============================================================================

async fn set_status(collection: &Collection, link: &str, status: Status) -> Result<bool, FilterError> {
    let db = collection.open_db().await?;
    let found = db
        .set_item_status(link, status)
        .await
        .map_err(|source| FilterError::Apply {
            rule: format!("set {link} {status}"),
            source,
        })?;
    db.close().await;
    if !found {
        tracing::warn!(collection = %collection.name(), link = %link, "No item with this link");
    }
    Ok(found)
}

/// Publishes one item regardless of the rule list.
pub async fn publish_item(collection: &Collection, link: &str) -> Result<bool, FilterError> {
    set_status(collection, link, Status::Published).await
}

/// Sends one item back to review.
pub async fn review_item(collection: &Collection, link: &str) -> Result<bool, FilterError> {
    set_status(collection, link, Status::Review).await
}

/// Clears one item's status.
pub async fn clear_item(collection: &Collection, link: &str) -> Result<bool, FilterError> {
    set_status(collection, link, Status::Unset).await
}
