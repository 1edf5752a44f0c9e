//! Markdown documents with a YAML metadata block.
//!
//! Documents serve two roles: feed-list documents (a collection's title and
//! syndication metadata plus a list of feed links) and authored posts or
//! pages (metadata plus a Markdown body rendered to HTML).
//!
//! - [`front_matter`] splits the `---` delimited block and types its keys
//! - [`links`] extracts `- [label](url "description")` entries
//! - [`markdown`] renders the body with `pulldown-cmark`

mod front_matter;
mod links;
mod markdown;

use std::path::Path;
use thiserror::Error;

use crate::storage::Person;

pub use front_matter::{split_front_matter, FrontMatter};
pub use links::{extract_links, Link};
pub use markdown::markdown_to_html;

/// Errors raised while reading or interpreting a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The opening `---` was never closed. The raw text is kept as body.
    #[error("unclosed metadata block")]
    UnclosedFrontMatter { body: String },

    #[error("invalid metadata: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("missing required field {0:?}")]
    MissingField(String),

    #[error("field {key:?} is not a person or list of persons")]
    InvalidPersons { key: String },

    #[error("failed to access document: {0}")]
    Io(#[from] std::io::Error),
}

/// A parsed document: optional metadata plus the text after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front_matter: Option<FrontMatter>,
    pub body: String,
}

impl Document {
    pub fn parse(src: &[u8]) -> Result<Self, DocumentError> {
        let (front_matter, body) = split_front_matter(src)?;
        Ok(Self { front_matter, body })
    }

    pub async fn read(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Self::parse(&bytes)
    }

    /// Returns the string value of `key`, or `default` if it is absent or blank.
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.string(key))
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.boolean(key))
            .unwrap_or(default)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, DocumentError> {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.string(key))
            .ok_or_else(|| DocumentError::MissingField(key.to_string()))
    }

    pub fn get_persons(&self, key: &str, required: bool) -> Result<Vec<Person>, DocumentError> {
        match &self.front_matter {
            Some(fm) => fm.persons(key, required),
            None if required => Err(DocumentError::MissingField(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    /// Mutable metadata, created empty if the document had none.
    pub fn front_matter_mut(&mut self) -> &mut FrontMatter {
        self.front_matter.get_or_insert_with(FrontMatter::default)
    }

    pub fn links(&self) -> Vec<Link> {
        extract_links(&self.body)
    }

    pub fn to_html(&self) -> String {
        markdown_to_html(&self.body)
    }

    /// Serializes the document back to `---` delimited text.
    pub fn render(&self) -> Result<String, DocumentError> {
        let Some(fm) = &self.front_matter else {
            return Ok(self.body.clone());
        };
        let yaml = serde_yaml::to_string(fm)?;
        Ok(format!("---\n{yaml}---\n{}", self.body))
    }

    /// Rewrites the document at `path`, keeping the previous content as
    /// `<name>.bak`.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let content = self.render()?;

        if tokio::fs::try_exists(path).await? {
            let mut backup = path.as_os_str().to_owned();
            backup.push(".bak");
            tokio::fs::rename(path, &backup).await?;
        }
        tokio::fs::write(path, content).await?;
        tracing::debug!(path = %path.display(), "Rewrote document metadata");
        Ok(())
    }
}
