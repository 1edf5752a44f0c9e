//! Integration tests for the harvest → filter → generate pipeline.
//!
//! Each test serves feeds from a wiremock server and keeps the collection
//! document, database and htdocs in its own temp directory.

use chrono::{Duration, Utc};
use feedpress::config::{AppConfig, Collection};
use feedpress::feed::{default_user_agent, Harvester};
use feedpress::filter::apply_filters;
use feedpress::generate::generate_all;
use feedpress::storage::Status;
use pretty_assertions::assert_eq;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss(items: &[(&str, &str, chrono::DateTime<Utc>)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel>\
         <title>Upstream</title><link>https://upstream.example/</link>\
         <description>Upstream news</description>",
    );
    for (guid, title, date) in items {
        body.push_str(&format!(
            "<item><guid>{guid}</guid><title>{title}</title>\
             <link>https://upstream.example/{guid}</link>\
             <description>About {title}</description>\
             <pubDate>{}</pubDate></item>",
            date.to_rfc2822()
        ));
    }
    body.push_str("</channel></rss>");
    body
}

async fn serve(body: String) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

fn collection(dir: &Path, server: &MockServer) -> Collection {
    let file = dir.join("news.md");
    std::fs::write(
        &file,
        format!(
            "---\ntitle: News\n---\n- [Upstream]({}/rss \"Upstream news\")\n",
            server.uri()
        ),
    )
    .unwrap();
    Collection {
        file,
        title: "News".into(),
        description: "Curated news".into(),
        link: "news.xml".into(),
        db_name: dir.join("news.db"),
        filters: vec!["reset review".into(), "promote-recent 21".into()],
        ..Default::default()
    }
}

fn harvester() -> Harvester {
    Harvester::new(&default_user_agent(), std::time::Duration::from_secs(5)).unwrap()
}

// ============================================================================
// Harvest
// ============================================================================

#[tokio::test]
async fn test_harvest_twice_leaves_identical_rows() {
    let now = Utc::now();
    let server = serve(rss(&[
        ("a", "Alpha", now),
        ("b", "Beta", now - Duration::days(1)),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let c = collection(dir.path(), &server);

    harvester().harvest(&c).await.unwrap();
    let db = c.open_db().await.unwrap();
    let first_items = db.list_items(None).await.unwrap();
    let first_channels = db.channels().await.unwrap();
    db.close().await;

    harvester().harvest(&c).await.unwrap();
    let db = c.open_db().await.unwrap();
    let second_items = db.list_items(None).await.unwrap();
    let second_channels = db.channels().await.unwrap();
    db.close().await;

    assert_eq!(first_items.len(), 2);
    assert_eq!(first_items, second_items);
    assert_eq!(first_channels, second_channels);
}

// ============================================================================
// Filter
// ============================================================================

#[tokio::test]
async fn test_default_filters_publish_recent_and_hold_old() {
    let now = Utc::now();
    let server = serve(rss(&[
        ("fresh", "Fresh", now),
        ("stale", "Stale", now - Duration::days(30)),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let c = collection(dir.path(), &server);
    harvester().harvest(&c).await.unwrap();

    apply_filters(&c).await.unwrap();

    let db = c.open_db().await.unwrap();
    let fresh = db.get_item("https://upstream.example/fresh").await.unwrap().unwrap();
    let stale = db.get_item("https://upstream.example/stale").await.unwrap().unwrap();
    assert_eq!(fresh.status, Status::Published);
    assert_eq!(stale.status, Status::Review);
}

// ============================================================================
// Generate
// ============================================================================

#[tokio::test]
async fn test_generate_renders_published_items_newest_first() {
    let now = Utc::now();
    let server = serve(rss(&[
        ("older", "Older", now - Duration::days(2)),
        ("newest", "Newest", now),
        ("ancient", "Ancient", now - Duration::days(60)),
        ("middle", "Middle", now - Duration::days(1)),
    ]))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let c = collection(dir.path(), &server);
    let config = AppConfig {
        htdocs: dir.path().join("htdocs"),
        base_url: "https://site.example".into(),
        generator: dir.path().join("generator.toml"),
        collections: vec![c.clone()],
        ..Default::default()
    };

    harvester().harvest(&c).await.unwrap();
    apply_filters(&c).await.unwrap();
    assert_eq!(generate_all(&config, &config.collections).await, 0);

    let htdocs = dir.path().join("htdocs");
    let html = std::fs::read_to_string(htdocs.join("news.html")).unwrap();
    let xml = std::fs::read_to_string(htdocs.join("news.xml")).unwrap();
    let opml = std::fs::read_to_string(htdocs.join("news.opml")).unwrap();

    let order = ["Newest", "Middle", "Older"];
    let positions: Vec<usize> = order
        .iter()
        .map(|t| xml.find(&format!("<title>{t}</title>")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(xml.matches("<item>").count(), 3);
    assert!(!xml.contains("Ancient"));
    assert!(xml.contains("<link>https://site.example/news.html</link>"));

    assert_eq!(html.matches("<article").count(), 3);
    assert!(html.find("<h1>Newest</h1>").unwrap() < html.find("<h1>Older</h1>").unwrap());
    assert!(!html.contains("Ancient"));

    assert!(opml.contains(&format!("xmlUrl=\"{}/rss\"", server.uri())));
    assert!(opml.contains("title=\"Upstream\""));
}

#[tokio::test]
async fn test_failed_collection_does_not_stop_batch() {
    let server = serve(rss(&[("a", "Alpha", Utc::now())])).await;
    let dir = tempfile::tempdir().unwrap();
    let good = collection(dir.path(), &server);
    let broken = Collection {
        file: dir.path().join("gone.md"),
        db_name: dir.path().join("no/such/dir/gone.db"),
        ..Default::default()
    };

    let results = harvester().harvest_all(&[broken, good.clone()]).await;
    assert!(results[0].result.is_err());
    assert_eq!(results[1].result.as_ref().unwrap().items_saved, 1);
}
