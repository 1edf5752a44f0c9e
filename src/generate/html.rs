use std::collections::BTreeMap;
use std::fmt::{self, Write};

use super::Generator;
use crate::config::Collection;
use crate::document::markdown_to_html;
use crate::storage::Item;
use crate::util::{date_prefix, indent_text, to_xml_string as esc};

/// Extra `<head>` element for one rendering.
pub(crate) struct HeadLink<'a> {
    pub rel: &'a str,
    pub mime_type: &'a str,
    pub href: String,
}

/// Index page for a collection: one `<article>` per item.
pub(crate) fn render_index(
    gen: &Generator,
    collection: &Collection,
    items: &[Item],
) -> Result<String, fmt::Error> {
    let feed = HeadLink {
        rel: "alternate",
        mime_type: "application/rss+xml",
        href: format!("{}.xml", collection.name()),
    };
    let mut out = String::new();
    write_open(&mut out, gen, &collection.language, &collection.title, Some(&feed))?;
    if !gen.layout.top_content.is_empty() {
        writeln!(out, "    {}", indent_text(&gen.layout.top_content, 4))?;
    }
    writeln!(out, "    <section>")?;
    for item in items {
        write_item(&mut out, item)?;
    }
    writeln!(out, "    </section>")?;
    if !gen.layout.bottom_content.is_empty() {
        writeln!(out, "    {}", indent_text(&gen.layout.bottom_content, 4))?;
    }
    write_close(&mut out, gen)?;
    Ok(out)
}

/// Standalone page wrapping a single rendered document.
pub(crate) fn render_page(
    gen: &Generator,
    title: &str,
    link: &str,
    post_path: &str,
    pub_date: &str,
    inner_html: &str,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_open(&mut out, gen, "", title, None)?;
    write!(out, "    <article")?;
    if !pub_date.is_empty() {
        write!(out, " data-published=\"{}\"", esc(date_prefix(pub_date)))?;
    }
    if !link.is_empty() {
        write!(out, " data-link=\"{}\"", esc(link))?;
    }
    if !post_path.is_empty() {
        write!(out, " data-post-path=\"{}\"", esc(post_path))?;
    }
    writeln!(out, ">")?;
    writeln!(out, "      {}", indent_text(inner_html.trim_end(), 6))?;
    writeln!(out, "    </article>")?;
    write_close(&mut out, gen)?;
    Ok(out)
}

fn write_item(out: &mut String, item: &Item) -> fmt::Result {
    writeln!(
        out,
        "      <article data-published=\"{}\" data-link=\"{}\">",
        esc(date_prefix(&item.pub_date)),
        esc(&item.link)
    )?;
    if item.title.is_empty() {
        writeln!(out, "        <h1>@{}</h1>", esc(&item.label))?;
    } else {
        writeln!(out, "        <h1>{}</h1>", esc(&item.title))?;
    }
    if !item.pub_date.is_empty() {
        writeln!(
            out,
            "        <div class=\"date\">(date: {})</div>",
            esc(date_prefix(&item.pub_date))
        )?;
    }

    let content = if item.source_markdown.is_empty() {
        item.description.clone()
    } else {
        markdown_to_html(&item.source_markdown)
    };
    if !content.trim().is_empty() {
        writeln!(out, "        {}", indent_text(content.trim_end(), 8))?;
    }
    writeln!(
        out,
        "        <address><a href=\"{0}\">{0}</a></address>",
        esc(&item.link)
    )?;
    writeln!(out, "      </article>")
}

fn write_open(
    out: &mut String,
    gen: &Generator,
    language: &str,
    title: &str,
    feed: Option<&HeadLink<'_>>,
) -> fmt::Result {
    let lang = if language.is_empty() { "en-US" } else { language };
    writeln!(out, "<!doctype html>")?;
    writeln!(out, "<html lang=\"{}\">", esc(lang))?;
    writeln!(out, "  <head>")?;
    writeln!(out, "    <meta charset=\"utf-8\">")?;
    writeln!(
        out,
        "    <meta name=\"generator\" content=\"{}\">",
        esc(&gen.generator_tag())
    )?;
    writeln!(
        out,
        "    <meta name=\"date\" content=\"{}\">",
        gen.build_time.to_rfc3339()
    )?;
    for meta in &gen.layout.meta {
        writeln!(out, "    <meta{}>", attributes(meta))?;
    }
    writeln!(out, "    <title>{}</title>", esc(title))?;
    for css in &gen.layout.css {
        writeln!(out, "    <link rel=\"stylesheet\" href=\"{}\">", esc(css))?;
    }
    for link in &gen.layout.links {
        writeln!(out, "    <link{}>", attributes(link))?;
    }
    if let Some(feed) = feed {
        writeln!(
            out,
            "    <link rel=\"{}\" type=\"{}\" href=\"{}\">",
            feed.rel,
            feed.mime_type,
            esc(&feed.href)
        )?;
    }
    for script in &gen.layout.scripts {
        writeln!(out, "    <script{}></script>", attributes(script))?;
    }
    for module in &gen.layout.modules {
        writeln!(out, "    <script type=\"module\" src=\"{}\"></script>", esc(module))?;
    }
    writeln!(out, "  </head>")?;
    writeln!(out, "  <body>")?;
    if !gen.layout.header.is_empty() {
        writeln!(out, "    <header>{}</header>", indent_text(&gen.layout.header, 4))?;
    }
    if !gen.layout.nav.is_empty() {
        writeln!(out, "    <nav>{}</nav>", indent_text(&gen.layout.nav, 4))?;
    }
    Ok(())
}

fn write_close(out: &mut String, gen: &Generator) -> fmt::Result {
    if !gen.layout.footer.is_empty() {
        writeln!(out, "    <footer>{}</footer>", indent_text(&gen.layout.footer, 4))?;
    }
    writeln!(out, "  </body>")?;
    writeln!(out, "</html>")
}

fn attributes(attrs: &BTreeMap<String, String>) -> String {
    attrs
        .iter()
        .map(|(k, v)| format!(" {}=\"{}\"", esc(k), esc(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GeneratorConfig};

    fn generator(layout: GeneratorConfig) -> Generator {
        Generator::new(&AppConfig::default(), layout)
    }

    fn collection() -> Collection {
        Collection {
            file: "news.md".into(),
            title: "News & Views".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_index_shell() {
        let mut meta = BTreeMap::new();
        meta.insert("name".to_string(), "viewport".to_string());
        let gen = generator(GeneratorConfig {
            css: vec!["/site.css".into()],
            modules: vec!["/app.js".into()],
            header: "<h1>Site</h1>".into(),
            nav: "<a href=\"/\">Home</a>".into(),
            footer: "<p>bye</p>".into(),
            meta: vec![meta],
            ..Default::default()
        });
        let html = render_index(&gen, &collection(), &[]).unwrap();

        assert!(html.starts_with("<!doctype html>\n<html lang=\"en-US\">"));
        assert!(html.contains(&format!(
            "<meta name=\"generator\" content=\"feedpress/{}\">",
            env!("CARGO_PKG_VERSION")
        )));
        assert!(html.contains("<meta name=\"date\" content=\""));
        assert!(html.contains("<meta name=\"viewport\">"));
        assert!(html.contains("<title>News &#38; Views</title>"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/site.css\">"));
        assert!(html.contains("<link rel=\"alternate\" type=\"application/rss+xml\" href=\"news.xml\">"));
        assert!(html.contains("<script type=\"module\" src=\"/app.js\"></script>"));
        assert!(html.contains("<header><h1>Site</h1></header>"));
        assert!(html.contains("<footer><p>bye</p></footer>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_item_article() {
        let gen = generator(GeneratorConfig::default());
        let items = vec![
            Item {
                link: "https://x.org/a?b=1&c=2".into(),
                title: "A <title>".into(),
                description: "<p>Hello</p>".into(),
                pub_date: "2025-01-02 03:04:05".into(),
                ..Default::default()
            },
            Item {
                link: "https://x.org/untitled".into(),
                label: "Someone".into(),
                description: "<p>Just a note</p>".into(),
                ..Default::default()
            },
        ];
        let html = render_index(&gen, &collection(), &items).unwrap();

        assert!(html.contains(
            "<article data-published=\"2025-01-02\" data-link=\"https://x.org/a?b=1&#38;c=2\">"
        ));
        assert!(html.contains("<h1>A &#60;title&#62;</h1>"));
        assert!(html.contains("(date: 2025-01-02)"));
        assert!(html.contains("<p>Hello</p>"));
        assert!(html.contains("<h1>@Someone</h1>"));
        assert_eq!(html.matches("<address>").count(), 2);
    }

    #[test]
    fn test_markdown_source_rendered_at_render_time() {
        let gen = generator(GeneratorConfig::default());
        let items = vec![Item {
            link: "https://x.org/post.html".into(),
            title: "Post".into(),
            description: "ignored".into(),
            source_markdown: "Some *emphasis*".into(),
            ..Default::default()
        }];
        let html = render_index(&gen, &collection(), &items).unwrap();
        assert!(html.contains("<em>emphasis</em>"));
        assert!(!html.contains("ignored"));
    }

    #[test]
    fn test_standalone_page() {
        let gen = generator(GeneratorConfig::default());
        let html = render_page(
            &gen,
            "About",
            "https://x.org/about.html",
            "about.md",
            "2025-01-01",
            "<p>About me</p>\n",
        )
        .unwrap();
        assert!(html.contains("<title>About</title>"));
        assert!(html.contains(
            "<article data-published=\"2025-01-01\" data-link=\"https://x.org/about.html\" data-post-path=\"about.md\">"
        ));
        assert!(html.contains("<p>About me</p>"));
        assert!(!html.contains("application/rss+xml"));
    }
}
