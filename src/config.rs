//! Application configuration (`feedpress.toml`) and the collection registry.
//!
//! The config file is optional: a missing or empty file yields
//! `AppConfig::default()`. Unknown keys are accepted but logged, since they are
//! usually typos. Generator configuration lives in a separate TOML file per
//! collection (or one shared file) and follows the same rules.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::document::{Document, DocumentError};
use crate::storage::{Database, DatabaseError};

/// Default name of the application config file.
pub const CONFIG_FILE: &str = "feedpress.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No collection named {0:?} is registered")]
    CollectionNotFound(String),

    #[error("Failed to read collection document: {0}")]
    Document(#[from] DocumentError),
}

// ============================================================================
// Collections
// ============================================================================

/// A named feed list and everything needed to harvest and render it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    /// Source feed-list document. Its stem names every output artifact.
    pub file: PathBuf,
    pub title: String,
    pub description: String,
    /// Output feed link, absolute or relative to the base URL.
    pub link: String,
    pub language: String,
    pub copyright: String,
    pub managing_editor: String,
    pub web_master: String,
    pub pub_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    pub db_name: PathBuf,
    /// Generator config for this collection; falls back to the app-wide one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<PathBuf>,
    /// Filter rules in their string form, e.g. `"promote-recent 21"`.
    pub filters: Vec<String>,
}

impl Collection {
    /// Builds a collection from a feed-list document's metadata, filling in
    /// the database name, output link and filters when the document omits them.
    pub fn from_document(file: &Path, doc: &Document) -> Self {
        let stem = file_stem(file);
        let fm = doc.front_matter.clone().unwrap_or_default();

        let db_name = match fm.db_name.filter(|s| !s.trim().is_empty()) {
            Some(db) => beside(file, &db),
            None => file.with_extension("db"),
        };
        let filters = match fm.filters {
            Some(filters) if !filters.is_empty() => filters,
            _ => crate::filter::default_rule_strings(),
        };

        Self {
            file: file.to_path_buf(),
            title: doc.get_str("title", &stem),
            description: doc.get_str("description", ""),
            link: doc.get_str("link", &format!("{stem}.xml")),
            language: doc.get_str("language", ""),
            copyright: doc.get_str("copyright", ""),
            managing_editor: doc.get_str("managingEditor", ""),
            web_master: doc.get_str("webMaster", ""),
            pub_date: doc.get_str("pubDate", ""),
            ttl: fm.ttl,
            db_name,
            generator: fm
                .generator
                .filter(|s| !s.trim().is_empty())
                .map(|g| beside(file, &g)),
            filters,
        }
    }

    /// File basename without extension.
    pub fn name(&self) -> String {
        file_stem(&self.file)
    }

    pub async fn open_db(&self) -> Result<Database, DatabaseError> {
        Database::open(&self.db_name.to_string_lossy()).await
    }

    fn matches(&self, name: &str) -> bool {
        let basename = self.file.file_name().map(|f| f.to_string_lossy());
        self.name() == name || basename.as_deref() == Some(name) || self.file == Path::new(name)
    }
}

/// Resolves a path named inside the document at `file` against the
/// document's directory. Absolute paths are kept.
fn beside(file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target.trim());
    match file.parent() {
        Some(dir) if target.is_relative() => dir.join(target),
        _ => target.to_path_buf(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Application Config
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output directory for generated artifacts.
    pub htdocs: PathBuf,
    /// Public URL of `htdocs`, used for authored links and enclosures.
    pub base_url: String,
    /// User-Agent for feed requests. Defaults to `feedpress/<version>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Shared generator config, used when a collection names none.
    pub generator: PathBuf,
    /// Per-request timeout for feed fetches.
    pub timeout_secs: u64,
    /// Largest feed body accepted, in mebibytes.
    pub max_feed_mb: usize,
    /// Collection whose database holds standalone pages.
    pub pages: String,
    pub collections: Vec<Collection>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            htdocs: PathBuf::from("htdocs"),
            base_url: String::new(),
            user_agent: None,
            generator: PathBuf::from("generator.toml"),
            timeout_secs: 30,
            max_feed_mb: 10,
            pages: "pages".to_string(),
            collections: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(AppConfig::default())`
    /// - Empty file → `Ok(AppConfig::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_config_file(path)? else {
            return Ok(Self::default());
        };
        warn_unknown_keys(
            &content,
            &[
                "htdocs",
                "base_url",
                "user_agent",
                "generator",
                "timeout_secs",
                "max_feed_mb",
                "pages",
                "collections",
            ],
        );
        let config: AppConfig = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            collections = config.collections.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Finds a collection by name, file basename, or file path.
    pub fn collection(&self, name: &str) -> Result<&Collection, ConfigError> {
        self.collections
            .iter()
            .find(|c| c.matches(name))
            .ok_or_else(|| ConfigError::CollectionNotFound(name.to_string()))
    }

    /// Resolves `names` to collections; an empty list selects all of them.
    pub fn select(&self, names: &[String]) -> Result<Vec<Collection>, ConfigError> {
        if names.is_empty() {
            return Ok(self.collections.clone());
        }
        names
            .iter()
            .map(|n| self.collection(n).cloned())
            .collect()
    }

    /// Collection holding standalone pages.
    pub fn pages_collection(&self) -> Result<&Collection, ConfigError> {
        self.collection(&self.pages)
    }

    /// Database holding the pages table: the pages collection's database, or
    /// `<pages>.db` when no such collection is registered.
    pub fn pages_db(&self) -> PathBuf {
        match self.pages_collection() {
            Ok(collection) => collection.db_name.clone(),
            Err(_) => PathBuf::from(format!("{}.db", self.pages)),
        }
    }

    /// Registers the feed-list document at `file`, replacing any collection
    /// with the same basename.
    pub async fn add_collection(&mut self, file: &Path) -> Result<Collection, ConfigError> {
        let doc = Document::read(file).await?;
        let collection = Collection::from_document(file, &doc);
        let basename = file.file_name();

        match self
            .collections
            .iter_mut()
            .find(|c| c.file.file_name() == basename)
        {
            Some(existing) => {
                tracing::info!(collection = %collection.name(), "Replacing registered collection");
                *existing = collection.clone();
            }
            None => {
                tracing::info!(collection = %collection.name(), "Registered collection");
                self.collections.push(collection.clone());
            }
        }
        Ok(collection)
    }

    /// Unregisters a collection. Its database file is left in place.
    pub fn remove_collection(&mut self, name: &str) -> Result<Collection, ConfigError> {
        let idx = self
            .collections
            .iter()
            .position(|c| c.matches(name))
            .ok_or_else(|| ConfigError::CollectionNotFound(name.to_string()))?;
        Ok(self.collections.remove(idx))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn max_feed_bytes(&self) -> usize {
        self.max_feed_mb.max(1).saturating_mul(1024 * 1024)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(crate::feed::default_user_agent)
    }

    /// Loads the generator config for `collection`.
    pub fn generator_config(&self, collection: &Collection) -> Result<GeneratorConfig, ConfigError> {
        let path = collection.generator.as_deref().unwrap_or(&self.generator);
        GeneratorConfig::load(path)
    }
}

// ============================================================================
// Generator Config
// ============================================================================

/// Page shell snippets for generated HTML.
///
/// `meta`, `links` and `scripts` are lists of attribute maps, each rendered as
/// one `<meta>`, `<link>` or `<script>` element in `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Stylesheet URLs.
    pub css: Vec<String>,
    /// ES module URLs, loaded with `<script type="module">`.
    pub modules: Vec<String>,
    pub header: String,
    pub nav: String,
    pub top_content: String,
    pub bottom_content: String,
    pub footer: String,
    pub meta: Vec<BTreeMap<String, String>>,
    pub links: Vec<BTreeMap<String, String>>,
    pub scripts: Vec<BTreeMap<String, String>>,
}

impl GeneratorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_config_file(path)? else {
            return Ok(Self::default());
        };
        warn_unknown_keys(
            &content,
            &[
                "css",
                "modules",
                "header",
                "nav",
                "top_content",
                "bottom_content",
                "footer",
                "meta",
                "links",
                "scripts",
            ],
        );
        Ok(toml::from_str(&content)?)
    }
}

// ============================================================================
// File Helpers
// ============================================================================

/// Maximum config file size (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

/// Reads a config file, returning `None` when it is missing or blank.
fn read_config_file(path: &Path) -> Result<Option<String>, ConfigError> {
    // Check file size before reading to avoid loading a huge or corrupted file.
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_FILE_SIZE => {
            return Err(ConfigError::TooLarge(format!(
                "{} is {} bytes (max {} bytes)",
                path.display(),
                meta.len(),
                MAX_FILE_SIZE
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::Io(e)),
        Ok(_) => {}
    }

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Race condition: file deleted between metadata and read
            tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
            return Ok(None);
        }
        Err(e) => return Err(ConfigError::Io(e)),
    };

    if content.trim().is_empty() {
        tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
        return Ok(None);
    }
    Ok(Some(content))
}

fn warn_unknown_keys(content: &str, known_keys: &[&str]) {
    if let Ok(raw) = content.parse::<toml::Table>() {
        for key in raw.keys() {
            if !known_keys.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
