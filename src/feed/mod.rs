//! Feed harvesting: HTTP fetch, parsing, and persistence of channels and items.
//!
//! - [`fetcher`] - HTTP retrieval with a bounded body, timeout and logged redirects
//! - [`parser`] - RSS/Atom/JSON Feed parsing via `feed-rs`
//! - [`progress`] - time-windowed progress reports for long feeds
//! - [`harvest`] - per-collection orchestration
//!
//! # Example
//!
//! ```ignore
//! use feedpress::feed::Harvester;
//!
//! let harvester = Harvester::from_config(&config)?;
//! for outcome in harvester.harvest_all(&config.collections).await {
//!     println!("{}: {:?}", outcome.collection, outcome.result.is_ok());
//! }
//! ```

mod fetcher;
mod harvest;
mod parser;
mod progress;

pub use fetcher::{
    build_client, default_user_agent, fetch_feed, FetchError, FetchLimits, ACCEPT_FEEDS,
    DEFAULT_MAX_FEED_BYTES, MAX_REDIRECTS,
};
pub use harvest::{harvest, HarvestReport, HarvestResult, Harvester, DEFAULT_TIMEOUT};
pub use parser::{parse_feed, ParsedFeed, TIMESTAMP_FORMAT};
pub use progress::{Progress, REPORT_INTERVAL};
