//! Output generation: HTML index, RSS 2.0 feed, OPML outline and sitemap.
//!
//! Every artifact is rewritten in full on each run. Only published items with
//! a title or description are rendered, newest first.

mod html;
mod opml;
mod rss;
mod sitemap;
mod xml;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::{AppConfig, Collection, ConfigError, GeneratorConfig};
use crate::storage::{Enclosure, Item};
use crate::util::join_path;

pub use sitemap::generate_sitemap;

/// MIME type of the enclosure synthesized for authored posts.
const MARKDOWN_MIME: &str = "text/markdown";

/// Counts from one collection's generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub items: usize,
    pub channels: usize,
}

/// Renders collections into `htdocs` with one page layout.
#[derive(Debug, Clone)]
pub struct Generator {
    pub app_name: String,
    pub version: String,
    pub base_url: String,
    pub htdocs: PathBuf,
    pub layout: GeneratorConfig,
    /// Stamped into every artifact written by this generator.
    pub build_time: DateTime<Utc>,
}

impl Generator {
    pub fn new(config: &AppConfig, layout: GeneratorConfig) -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_url: config.base_url.clone(),
            htdocs: config.htdocs.clone(),
            layout,
            build_time: Utc::now(),
        }
    }

    /// Generator using the layout configured for `collection`.
    pub fn for_collection(config: &AppConfig, collection: &Collection) -> Result<Self, ConfigError> {
        let layout = config.generator_config(collection)?;
        Ok(Self::new(config, layout))
    }

    /// `<app>/<version>`, used in generator meta tags and RSS.
    pub fn generator_tag(&self) -> String {
        format!("{}/{}", self.app_name, self.version)
    }

    /// Writes `<name>.html`, `<name>.xml` and `<name>.opml` for `collection`.
    pub async fn generate(&self, collection: &Collection) -> Result<GenerateReport> {
        let name = collection.name();
        let db = collection
            .open_db()
            .await
            .with_context(|| format!("Failed to open database for {name}"))?;
        let items = db.published_items().await;
        let channels = db.channels().await;
        db.close().await;

        let mut items = items?;
        let channels = channels?;
        let source_dir = collection.file.parent().unwrap_or(Path::new(""));
        for item in &mut items {
            self.attach_source(source_dir, item).await;
        }

        let html = html::render_index(self, collection, &items)?;
        let rss = rss::render_rss(self, collection, &items)?;
        let opml = opml::render_opml(self, collection, &channels)?;

        replace_file(&self.htdocs.join(format!("{name}.html")), html.as_bytes()).await?;
        replace_file(&self.htdocs.join(format!("{name}.xml")), rss.as_bytes()).await?;
        replace_file(&self.htdocs.join(format!("{name}.opml")), opml.as_bytes()).await?;

        tracing::info!(
            collection = %name,
            items = items.len(),
            channels = channels.len(),
            "Generated collection"
        );
        Ok(GenerateReport {
            items: items.len(),
            channels: channels.len(),
        })
    }

    /// Wraps one rendered document in the page shell and writes it to
    /// `<htdocs>/<rel_path>`. Returns the written path.
    pub async fn write_html_page(
        &self,
        rel_path: &str,
        title: &str,
        link: &str,
        post_path: &str,
        pub_date: &str,
        inner_html: &str,
    ) -> Result<PathBuf> {
        let page = html::render_page(self, title, link, post_path, pub_date, inner_html)?;
        let path = self.htdocs.join(rel_path.trim_start_matches('/'));
        replace_file(&path, page.as_bytes()).await?;
        tracing::debug!(path = %path.display(), "Wrote page");
        Ok(path)
    }

    /// Adds a markdown enclosure for an authored post whose source file is
    /// present on disk. Relative post paths resolve against `source_dir`.
    async fn attach_source(&self, source_dir: &Path, item: &mut Item) {
        if item.post_path.is_empty() {
            return;
        }
        let Ok(meta) = tokio::fs::metadata(source_dir.join(&item.post_path)).await else {
            return;
        };
        let url = if self.base_url.is_empty() {
            item.post_path.clone()
        } else {
            join_path(&self.base_url, &item.post_path)
        };
        item.enclosures.upsert(Enclosure {
            url,
            length: meta.len().to_string(),
            mime_type: MARKDOWN_MIME.to_string(),
        });
    }
}

/// Generates each collection in turn. Failures are logged and counted.
pub async fn generate_all(config: &AppConfig, collections: &[Collection]) -> usize {
    let mut failures = 0;
    for collection in collections {
        let result = match Generator::for_collection(config, collection) {
            Ok(generator) => generator.generate(collection).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(collection = %collection.name(), error = %e, "Generation failed");
            failures += 1;
        }
    }
    failures
}

/// Removes `path` if present, then writes `contents`, creating parent
/// directories as needed.
pub(crate) async fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
        }
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
