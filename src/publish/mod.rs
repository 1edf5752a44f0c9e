//! Admission of hand-authored documents.
//!
//! Posts become published items in a collection's database and are rendered
//! to a standalone page under `htdocs`. Pages are rendered the same way but
//! are recorded in the `pages` table only, so they never reach a feed.

mod include;
mod page;
mod post;

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::config::ConfigError;
use crate::document::DocumentError;
use crate::storage::DatabaseError;

pub use page::{list_pages, page, unpage};
pub use post::{list_posts, post, unpost};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("{path} is a draft or has no pubDate")]
    NotPublishable { path: PathBuf },

    #[error("{path} has neither a title nor a description")]
    MissingTitleAndDescription { path: PathBuf },

    #[error("no base_url configured, cannot form a link for postPath {post_path:?}")]
    MissingBaseUrl { post_path: String },

    #[error("failed to include {path}: {source}")]
    Include {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {field} {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Storage queries and output writes.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Slash-separated relative form of `path` for metadata and URLs. Root and
/// `.` components are dropped.
fn path_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
