use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use feedpress::config::{AppConfig, CONFIG_FILE};
use feedpress::feed::Harvester;
use feedpress::storage::PostQuery;
use feedpress::util::TextFragment;
use feedpress::{filter, generate, publish};

const DEFAULT_PAGES_DOCUMENT: &str = "---
title: A feedpress website
description: Pages and posts written by hand.
---

# Welcome

";

const DEFAULT_GENERATOR: &str = r#"# Page shell for generated HTML.
css = []
modules = []

header = ""
nav = ""
top_content = ""
bottom_content = ""
footer = ""

[[meta]]
name = "viewport"
content = "width=device-width, initial-scale=1.0"
"#;

#[derive(Parser, Debug)]
#[command(
    name = "feedpress",
    version,
    about = "Curate syndicated feeds and render them as static HTML, RSS and OPML"
)]
struct Args {
    /// Application config file
    #[arg(long, short, global = true, value_name = "FILE", default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a config file, a pages collection and a generator layout
    Init,
    /// Register a feed-list document as a collection
    Add { file: PathBuf },
    /// Unregister a collection (its database is kept)
    Del { name: String },
    /// Fetch every feed listed by the named collections (all by default)
    Harvest { names: Vec<String> },
    /// Apply each collection's filter rules
    Filter { names: Vec<String> },
    /// Apply filters, then write HTML, RSS and OPML
    Generate { names: Vec<String> },
    /// Publish a Markdown document: `post [collection] <file>`
    Post {
        #[arg(num_args = 1..=2, required = true, value_name = "[COLLECTION] FILE")]
        args: Vec<String>,
    },
    /// Remove a post by link or post path
    Unpost { collection: String, link: String },
    /// List authored posts
    Posts {
        collection: String,
        /// Only the N most recent posts
        #[arg(long, value_name = "N", conflicts_with_all = ["from", "to"])]
        recent: Option<u32>,
        /// First publication date (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Last publication date (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    /// Render a standalone page
    Page { file: PathBuf, output: Option<String> },
    /// Forget a page by input or output path
    Unpage { path: String },
    /// List pages
    Pages,
    /// Write htdocs/sitemap.xml
    Sitemap,
    /// Mark one item published
    Publish { collection: String, link: String },
    /// Send one item back to review
    Review { collection: String, link: String },
    /// Clear one item's status
    Clear { collection: String, link: String },
    /// Print a Markdown quote for a `#:~:text=` link, or build one from TEXT
    Reply { url: String, text: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    match args.command {
        Command::Init => init(&args.config, &mut config).await?,
        Command::Add { file } => {
            let collection = config.add_collection(&file).await?;
            // Creates the schema up front.
            collection.open_db().await?.close().await;
            config.save(&args.config)?;
            println!("Added {}", collection.name());
        }
        Command::Del { name } => {
            let removed = config.remove_collection(&name)?;
            config.save(&args.config)?;
            println!("Removed {}", removed.name());
        }
        Command::Harvest { names } => {
            let collections = config.select(&names)?;
            let harvester = Harvester::from_config(&config)?;
            let results = harvester.harvest_all(&collections).await;
            let failures = results.iter().filter(|r| r.result.is_err()).count();
            if failures > 0 {
                bail!("{failures} of {} collections failed to harvest", results.len());
            }
        }
        Command::Filter { names } => {
            let collections = config.select(&names)?;
            let failures = filter::apply_filters_all(&collections).await;
            if failures > 0 {
                bail!("{failures} of {} collections failed to filter", collections.len());
            }
        }
        Command::Generate { names } => {
            let collections = config.select(&names)?;
            let failures = filter::apply_filters_all(&collections).await
                + generate::generate_all(&config, &collections).await;
            if failures > 0 {
                bail!("{failures} collection steps failed");
            }
        }
        Command::Post { args } => {
            let (collection, file) = match args.as_slice() {
                [file] => (config.pages.clone(), file.clone()),
                [collection, file] => (collection.clone(), file.clone()),
                _ => bail!("expected [COLLECTION] FILE"),
            };
            let collection = config.collection(&collection)?;
            let item = publish::post(&config, collection, Path::new(&file)).await?;
            println!("Posted {}", item.link);
        }
        Command::Unpost { collection, link } => {
            let collection = config.collection(&collection)?;
            let removed = publish::unpost(collection, &link).await?;
            println!("Removed {removed} item(s)");
        }
        Command::Posts {
            collection,
            recent,
            from,
            to,
        } => {
            let query = match (recent, from, to) {
                (Some(n), _, _) => PostQuery::Recent(n),
                (None, Some(from), Some(to)) => PostQuery::Range { from, to },
                _ => PostQuery::All,
            };
            let collection = config.collection(&collection)?;
            for post in publish::list_posts(collection, &query).await? {
                println!(
                    "- [{}]({}), {}",
                    post.title,
                    post.post_path,
                    feedpress::util::date_prefix(&post.pub_date)
                );
            }
        }
        Command::Page { file, output } => {
            let page = publish::page(&config, &file, output.as_deref()).await?;
            println!("Wrote {}", config.htdocs.join(&page.output_path).display());
        }
        Command::Unpage { path } => {
            let removed = publish::unpage(&config, &path).await?;
            println!("Removed {removed} page(s)");
        }
        Command::Pages => {
            for page in publish::list_pages(&config).await? {
                println!("- {} -> {}, {}", page.input_path, page.output_path, page.updated);
            }
        }
        Command::Sitemap => {
            let count = generate::generate_sitemap(&config).await?;
            println!("Wrote {count} URLs to the sitemap");
        }
        Command::Publish { collection, link } => {
            filter::publish_item(config.collection(&collection)?, &link).await?;
        }
        Command::Review { collection, link } => {
            filter::review_item(config.collection(&collection)?, &link).await?;
        }
        Command::Clear { collection, link } => {
            filter::clear_item(config.collection(&collection)?, &link).await?;
        }
        Command::Reply { url, text } => {
            let fragment = match text {
                Some(text) => TextFragment::new(&url, &text),
                None => TextFragment::parse(&url),
            }
            .with_context(|| format!("Failed to parse {url:?}"))?;
            print!("{}", fragment.reply_markdown(chrono::Local::now().date_naive()));
        }
    }
    Ok(())
}

/// Writes whatever starter files are missing and registers the pages
/// collection. Existing files are left alone.
async fn init(config_path: &Path, config: &mut AppConfig) -> Result<()> {
    let pages_file = PathBuf::from(format!("{}.md", config.pages));
    write_if_missing(&pages_file, DEFAULT_PAGES_DOCUMENT)?;
    write_if_missing(&config.generator, DEFAULT_GENERATOR)?;
    std::fs::create_dir_all(&config.htdocs)
        .with_context(|| format!("Failed to create {}", config.htdocs.display()))?;

    if config.pages_collection().is_err() {
        let collection = config.add_collection(&pages_file).await?;
        collection.open_db().await?.close().await;
    }
    config.save(config_path)?;
    println!("Initialized {}", config_path.display());
    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "Keeping existing file");
        return Ok(());
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
