use anyhow::Result;
use quick_xml::events::BytesStart;

use super::xml::{self, XmlWriter};
use super::Generator;
use crate::config::Collection;
use crate::storage::Item;
use crate::util::{join_path, to_rfc822};

const RSS_DOCS: &str = "https://cyber.harvard.edu/rss/rss.html";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Absolute URL of the collection's RSS file.
pub(crate) fn feed_url(gen: &Generator, collection: &Collection) -> String {
    let link = if collection.link.is_empty() {
        format!("{}.xml", collection.name())
    } else {
        collection.link.clone()
    };
    if link.contains("://") || gen.base_url.is_empty() {
        link
    } else {
        join_path(&gen.base_url, &link)
    }
}

/// RSS 2.0 document for a collection's published items.
///
/// Empty channel and item fields are omitted.
pub(crate) fn render_rss(gen: &Generator, collection: &Collection, items: &[Item]) -> Result<String> {
    let site_link = if gen.base_url.is_empty() {
        format!("{}.html", collection.name())
    } else {
        join_path(&gen.base_url, &format!("{}.html", collection.name()))
    };

    let mut writer = xml::new_document()?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    xml::start(&mut writer, rss)?;
    xml::start(&mut writer, BytesStart::new("channel"))?;

    let self_link = feed_url(gen, collection);
    let mut atom_link = BytesStart::new("atom:link");
    atom_link.push_attribute(("href", self_link.as_str()));
    atom_link.push_attribute(("rel", "self"));
    atom_link.push_attribute(("type", "application/rss+xml"));
    xml::empty(&mut writer, atom_link)?;

    xml::optional_element(&mut writer, "title", &collection.title)?;
    xml::optional_element(&mut writer, "description", &collection.description)?;
    xml::text_element(&mut writer, "link", &site_link)?;
    xml::optional_element(&mut writer, "language", &collection.language)?;
    xml::optional_element(&mut writer, "copyright", &collection.copyright)?;
    xml::optional_element(&mut writer, "managingEditor", &collection.managing_editor)?;
    xml::optional_element(&mut writer, "webMaster", &collection.web_master)?;
    if let Some(pub_date) = to_rfc822(&collection.pub_date) {
        xml::text_element(&mut writer, "pubDate", &pub_date)?;
    }
    xml::text_element(&mut writer, "lastBuildDate", &gen.build_time.to_rfc2822())?;
    xml::text_element(&mut writer, "generator", &gen.generator_tag())?;
    xml::text_element(&mut writer, "docs", RSS_DOCS)?;
    if let Some(ttl) = collection.ttl {
        xml::text_element(&mut writer, "ttl", &ttl.to_string())?;
    }

    for item in items {
        write_item(&mut writer, item)?;
    }

    xml::end(&mut writer, "channel")?;
    xml::end(&mut writer, "rss")?;
    xml::finish(writer, "RSS")
}

fn write_item(writer: &mut XmlWriter, item: &Item) -> Result<()> {
    xml::start(writer, BytesStart::new("item"))?;
    xml::optional_element(writer, "title", &item.title)?;
    xml::optional_element(writer, "link", &item.link)?;
    xml::optional_element(writer, "description", &item.description)?;
    for author in &item.authors.0 {
        xml::optional_element(writer, "author", &author.to_rss())?;
    }
    for category in &item.dc_ext.subject {
        xml::optional_element(writer, "category", category)?;
    }
    for enclosure in &item.enclosures.0 {
        let length = if enclosure.length.is_empty() {
            "0"
        } else {
            enclosure.length.as_str()
        };
        let mut element = BytesStart::new("enclosure");
        element.push_attribute(("url", enclosure.url.as_str()));
        element.push_attribute(("length", length));
        element.push_attribute(("type", enclosure.mime_type.as_str()));
        xml::empty(writer, element)?;
    }
    if !item.guid.is_empty() {
        let permalink = if item.guid == item.link { "true" } else { "false" };
        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", permalink));
        xml::text_with_attributes(writer, guid, &item.guid)?;
    }
    if let Some(pub_date) = to_rfc822(&item.pub_date) {
        xml::text_element(writer, "pubDate", &pub_date)?;
    }
    xml::end(writer, "item")
}
