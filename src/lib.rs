//! Feed curation pipeline.
//!
//! A collection is a Markdown document listing feed links. Harvesting fetches
//! every link into the collection's SQLite database, filters classify item
//! status, and the generator renders published items to HTML, RSS and OPML.
//! Hand-authored posts and pages enter through [`publish`].

pub mod config;
pub mod document;
pub mod feed;
pub mod filter;
pub mod generate;
pub mod publish;
pub mod storage;
pub mod util;
