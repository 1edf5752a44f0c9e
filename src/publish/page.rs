use chrono::Utc;
use std::path::Path;

use super::include::expand_includes;
use super::{path_string, PublishError};
use crate::config::{AppConfig, GeneratorConfig};
use crate::document::{markdown_to_html, Document};
use crate::feed::TIMESTAMP_FORMAT;
use crate::generate::Generator;
use crate::storage::{Database, Page};
use crate::util::markdown_to_html_path;

/// Renders `input` to `<htdocs>/<output>` and records it in the pages table.
///
/// Without `output` the page goes to the document's `postPath` (or its input
/// path, reduced to the file name when absolute) with `.md` swapped for `.html`.
pub async fn page(
    config: &AppConfig,
    input: &Path,
    output: Option<&str>,
) -> Result<Page, PublishError> {
    let doc = Document::read(input).await?;
    let input_path = input.to_string_lossy().into_owned();
    let default_post_path = if input.is_relative() {
        path_string(input)
    } else {
        input
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let post_path = doc.get_str("postPath", &default_post_path);
    let output_path = match output.map(str::trim).filter(|o| !o.is_empty()) {
        Some(out) => out.trim_start_matches('/').to_string(),
        None => markdown_to_html_path(&post_path),
    };

    let layout = match config.pages_collection() {
        Ok(collection) => config.generator_config(collection)?,
        Err(_) => GeneratorConfig::load(&config.generator)?,
    };
    let title = doc.get_str("title", "");
    let body = expand_includes(&doc.body, input.parent().unwrap_or(Path::new(""))).await?;
    Generator::new(config, layout)
        .write_html_page(&output_path, &title, "", &post_path, "", &markdown_to_html(&body))
        .await?;

    let page = Page {
        input_path,
        output_path,
        updated: Utc::now().format(TIMESTAMP_FORMAT).to_string(),
    };
    let db = open_pages_db(config).await?;
    let stored = db.upsert_page(&page).await;
    db.close().await;
    stored?;

    tracing::info!(input = %page.input_path, output = %page.output_path, "Wrote page");
    Ok(page)
}

/// Forgets the page whose input or output path is `path`. The rendered file
/// is left in place.
pub async fn unpage(config: &AppConfig, path: &str) -> Result<u64, PublishError> {
    let db = open_pages_db(config).await?;
    let removed = db.delete_page(path).await;
    db.close().await;
    let removed = removed?;
    if removed == 0 {
        tracing::warn!(path = %path, "No such page");
    }
    Ok(removed)
}

/// Recorded pages, most recently updated first.
pub async fn list_pages(config: &AppConfig) -> Result<Vec<Page>, PublishError> {
    let db = open_pages_db(config).await?;
    let pages = db.pages().await;
    db.close().await;
    Ok(pages?)
}

async fn open_pages_db(config: &AppConfig) -> Result<Database, PublishError> {
    Ok(Database::open(&config.pages_db().to_string_lossy()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Collection;
    use pretty_assertions::assert_eq;

    fn config(root: &Path) -> AppConfig {
        AppConfig {
            htdocs: root.join("htdocs"),
            generator: root.join("generator.toml"),
            collections: vec![Collection {
                file: root.join("pages.md"),
                db_name: root.join("pages.db"),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_page_writes_html_and_records_row() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let input = dir.path().join("about.md");
        std::fs::write(&input, "---\ntitle: About\npostPath: about.md\n---\n# About us\n").unwrap();

        let page = page(&config, &input, None).await.unwrap();
        assert_eq!(page.output_path, "about.html");

        let html = std::fs::read_to_string(dir.path().join("htdocs/about.html")).unwrap();
        assert!(html.contains("<title>About</title>"));
        assert!(html.contains("<h1>About us</h1>"));
        assert!(html.contains("data-post-path=\"about.md\""));

        let pages = list_pages(&config).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].input_path, page.input_path);
    }

    #[tokio::test]
    async fn test_page_explicit_output_and_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let input = dir.path().join("contact.md");
        std::fs::write(&input, "Write to us.\n").unwrap();

        page(&config, &input, Some("/info/contact.html")).await.unwrap();
        page(&config, &input, Some("info/contact.html")).await.unwrap();

        assert!(dir.path().join("htdocs/info/contact.html").exists());
        let pages = list_pages(&config).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].output_path, "info/contact.html");
    }

    #[tokio::test]
    async fn test_pages_stay_out_of_items() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let input = dir.path().join("about.md");
        std::fs::write(&input, "---\ntitle: About\n---\nHi\n").unwrap();
        page(&config, &input, Some("about.html")).await.unwrap();

        let db = Database::open(&config.pages_db().to_string_lossy()).await.unwrap();
        assert_eq!(db.item_count().await.unwrap(), 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unpage_by_either_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "A\n").unwrap();
        std::fs::write(&b, "B\n").unwrap();
        let page_a = page(&config, &a, Some("a.html")).await.unwrap();
        page(&config, &b, Some("b.html")).await.unwrap();

        assert_eq!(unpage(&config, &page_a.input_path).await.unwrap(), 1);
        assert_eq!(unpage(&config, "b.html").await.unwrap(), 1);
        assert_eq!(unpage(&config, "b.html").await.unwrap(), 0);
        assert!(list_pages(&config).await.unwrap().is_empty());
    }
}
