use anyhow::Result;
use quick_xml::events::BytesStart;
use std::collections::BTreeMap;

use super::{replace_file, xml};
use crate::config::AppConfig;
use crate::storage::{Database, PostQuery};
use crate::util::{date_prefix, join_path, markdown_to_html_path};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Writes `<htdocs>/sitemap.xml` listing every authored post and page.
///
/// Collections whose database cannot be read are skipped with a warning.
/// Returns the number of URLs written.
pub async fn generate_sitemap(config: &AppConfig) -> Result<usize> {
    // url -> lastmod
    let mut entries: BTreeMap<String, String> = BTreeMap::new();

    for collection in &config.collections {
        let db = match collection.open_db().await {
            Ok(db) => db,
            Err(e) => {
                tracing::warn!(collection = %collection.name(), error = %e, "Skipping collection in sitemap");
                continue;
            }
        };
        let posts = db.list_posts(&PostQuery::All).await;
        db.close().await;
        let posts = match posts {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!(collection = %collection.name(), error = %e, "Skipping collection in sitemap");
                continue;
            }
        };
        for post in posts {
            let url = if config.base_url.is_empty() {
                post.link
            } else {
                join_path(&config.base_url, &markdown_to_html_path(&post.post_path))
            };
            let lastmod = if post.updated.is_empty() {
                post.pub_date
            } else {
                post.updated
            };
            entries.insert(url, date_prefix(&lastmod).to_string());
        }
    }

    let pages_db = config.pages_db();
    if pages_db.exists() {
        let db = Database::open(&pages_db.to_string_lossy()).await?;
        let pages = db.pages().await;
        db.close().await;
        for page in pages? {
            let url = join_path(&config.base_url, &page.output_path);
            entries.insert(url, date_prefix(&page.updated).to_string());
        }
    }

    let xml = render_sitemap(&entries)?;
    let path = config.htdocs.join("sitemap.xml");
    replace_file(&path, xml.as_bytes()).await?;
    tracing::info!(path = %path.display(), urls = entries.len(), "Wrote sitemap");
    Ok(entries.len())
}

fn render_sitemap(entries: &BTreeMap<String, String>) -> Result<String> {
    let mut writer = xml::new_document()?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    xml::start(&mut writer, urlset)?;

    for (loc, lastmod) in entries {
        xml::start(&mut writer, BytesStart::new("url"))?;
        xml::text_element(&mut writer, "loc", loc)?;
        xml::optional_element(&mut writer, "lastmod", lastmod)?;
        xml::end(&mut writer, "url")?;
    }

    xml::end(&mut writer, "urlset")?;
    xml::finish(writer, "sitemap")
}
