use chrono::Utc;
use std::path::Path;

use super::include::expand_includes;
use super::{path_string, PublishError};
use crate::config::{AppConfig, Collection};
use crate::document::{markdown_to_html, Document};
use crate::feed::TIMESTAMP_FORMAT;
use crate::generate::Generator;
use crate::storage::{Authors, Item, PostQuery, PostSummary, Status};
use crate::util::{join_path, markdown_to_html_path, parse_timestamp};

/// Publishes the document at `path` as an item of `collection`.
///
/// Missing `postPath` and `dateModified` are derived and written back to the
/// document (the previous file is kept as `.bak`). The rendered page lands at
/// `<htdocs>/<postPath>` with `.md` swapped for `.html`.
pub async fn post(
    config: &AppConfig,
    collection: &Collection,
    path: &Path,
) -> Result<Item, PublishError> {
    let mut doc = Document::read(path).await?;

    let pub_date = doc.get_str("pubDate", &doc.get_str("datePublished", ""));
    if doc.get_bool("draft", false) || pub_date.is_empty() {
        return Err(PublishError::NotPublishable {
            path: path.to_path_buf(),
        });
    }

    let title = doc.get_str("title", "");
    let source_dir = path.parent().unwrap_or(Path::new(""));
    let source_markdown = expand_includes(&doc.body, source_dir).await?;
    let inner_html = markdown_to_html(&source_markdown);
    let mut description = doc.get_str("description", &doc.get_str("abstract", ""));
    if description.is_empty() {
        description = inner_html.trim().to_string();
    }
    if title.is_empty() && description.is_empty() {
        return Err(PublishError::MissingTitleAndDescription {
            path: path.to_path_buf(),
        });
    }

    let mut rewrite = false;
    let post_path = match doc.get_str("postPath", "") {
        p if p.is_empty() => {
            rewrite = true;
            derive_post_path(collection, path)
        }
        p => p,
    };
    let date_modified = match doc.get_str("dateModified", "") {
        d if d.is_empty() => {
            rewrite = true;
            Utc::now().format("%Y-%m-%d").to_string()
        }
        d => d,
    };
    let updated = parse_timestamp(&date_modified)
        .ok_or_else(|| PublishError::InvalidDate {
            field: "dateModified",
            value: date_modified.clone(),
        })?
        .format(TIMESTAMP_FORMAT)
        .to_string();

    let html_path = markdown_to_html_path(&post_path);
    let link = match doc.get_str("link", "") {
        l if !l.is_empty() => l,
        _ if config.base_url.is_empty() => {
            return Err(PublishError::MissingBaseUrl { post_path });
        }
        _ => join_path(&config.base_url, &html_path),
    };
    let authors = doc.get_persons("author", false)?;

    if rewrite {
        let fm = doc.front_matter_mut();
        fm.post_path = Some(post_path.clone());
        fm.date_modified = Some(date_modified);
        doc.save(path).await?;
    }

    let generator = Generator::for_collection(config, collection)?;
    generator
        .write_html_page(&html_path, &title, &link, &post_path, &pub_date, &inner_html)
        .await?;

    let item = Item {
        guid: doc.get_str("guid", &link),
        channel: doc.get_str("channel", &collection.link),
        link,
        title,
        description,
        authors: Authors(authors),
        pub_date,
        status: Status::Published,
        label: collection.title.clone(),
        updated,
        post_path,
        source_markdown,
        ..Default::default()
    };

    let db = collection.open_db().await?;
    let stored = db.upsert_item(&item).await;
    db.close().await;
    stored?;

    tracing::info!(
        collection = %collection.name(),
        link = %item.link,
        post_path = %item.post_path,
        "Posted document"
    );
    Ok(item)
}

/// Removes the item whose link or post path is `link_or_path`.
pub async fn unpost(collection: &Collection, link_or_path: &str) -> Result<u64, PublishError> {
    let db = collection.open_db().await?;
    let removed = db.delete_item(link_or_path).await;
    db.close().await;
    let removed = removed?;
    if removed == 0 {
        tracing::warn!(collection = %collection.name(), target = %link_or_path, "Nothing to unpost");
    } else {
        tracing::info!(collection = %collection.name(), target = %link_or_path, "Unposted");
    }
    Ok(removed)
}

/// Authored posts in `collection`, newest first.
pub async fn list_posts(
    collection: &Collection,
    query: &PostQuery,
) -> Result<Vec<PostSummary>, PublishError> {
    let db = collection.open_db().await?;
    let posts = db.list_posts(query).await;
    db.close().await;
    Ok(posts?)
}

/// Document path relative to the collection's directory, or just its file
/// name when it lies elsewhere.
fn derive_post_path(collection: &Collection, path: &Path) -> String {
    let base = collection.file.parent().unwrap_or(Path::new(""));
    match path.strip_prefix(base) {
        Ok(rel) => path_string(rel),
        Err(_) if path.is_relative() => path_string(path),
        Err(_) => path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
