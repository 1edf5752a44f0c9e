use anyhow::Result;
use quick_xml::events::BytesStart;

use super::xml;
use super::Generator;
use crate::config::Collection;
use crate::storage::Channel;

/// Renders an OPML 2.0 outline with one entry per followed channel.
///
/// Empty attributes are omitted. The outline type comes from the channel's
/// detected feed type, defaulting to `rss`.
pub(crate) fn render_opml(
    gen: &Generator,
    collection: &Collection,
    channels: &[Channel],
) -> Result<String> {
    let mut writer = xml::new_document()?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    xml::start(&mut writer, opml)?;

    xml::start(&mut writer, BytesStart::new("head"))?;
    xml::text_element(&mut writer, "title", &collection.title)?;
    xml::text_element(&mut writer, "dateCreated", &gen.build_time.to_rfc2822())?;
    xml::end(&mut writer, "head")?;

    xml::start(&mut writer, BytesStart::new("body"))?;

    for channel in channels {
        let title = if channel.title.is_empty() {
            channel.link.as_str()
        } else {
            channel.title.as_str()
        };
        let outline_type = if channel.feed_type.is_empty() {
            "rss"
        } else {
            channel.feed_type.as_str()
        };
        let xml_url = if channel.feed_link.is_empty() {
            channel.link.as_str()
        } else {
            channel.feed_link.as_str()
        };
        let html_url = channel.links.0.first().map(String::as_str).unwrap_or("");
        let category = channel.categories.0.join(",");

        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("type", outline_type));
        outline.push_attribute(("text", title));
        outline.push_attribute(("title", title));
        outline.push_attribute(("xmlUrl", xml_url));
        for (name, value) in [
            ("htmlUrl", html_url),
            ("description", channel.description.as_str()),
            ("category", category.as_str()),
        ] {
            if !value.is_empty() {
                outline.push_attribute((name, value));
            }
        }
        xml::empty(&mut writer, outline)?;
    }

    xml::end(&mut writer, "body")?;
    xml::end(&mut writer, "opml")?;
    xml::finish(writer, "OPML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, GeneratorConfig};
    use crate::storage::StringList;

    fn generator() -> Generator {
        Generator::new(&AppConfig::default(), GeneratorConfig::default())
    }

    fn collection() -> Collection {
        Collection {
            file: "news.md".into(),
            title: "News".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_outline_per_channel() {
        let channels = vec![
            Channel {
                link: "https://a.example/rss".into(),
                title: "Alpha".into(),
                description: "First".into(),
                feed_link: "https://a.example/rss".into(),
                links: StringList(vec!["https://a.example/".into()]),
                categories: StringList(vec!["tech".into(), "news".into()]),
                feed_type: "atom".into(),
                ..Default::default()
            },
            Channel {
                link: "https://b.example/feed".into(),
                ..Default::default()
            },
        ];
        let opml = render_opml(&generator(), &collection(), &channels).unwrap();

        assert!(opml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(opml.contains("<title>News</title>"));
        assert!(opml.contains("<dateCreated>"));
        assert!(opml.contains(
            "<outline type=\"atom\" text=\"Alpha\" title=\"Alpha\" xmlUrl=\"https://a.example/rss\" htmlUrl=\"https://a.example/\" description=\"First\" category=\"tech,news\"/>"
        ));
        assert!(opml.contains(
            "<outline type=\"rss\" text=\"https://b.example/feed\" title=\"https://b.example/feed\" xmlUrl=\"https://b.example/feed\"/>"
        ));
        assert_eq!(opml.matches("<outline").count(), 2);
    }

    #[test]
    fn test_attributes_are_escaped() {
        let channels = vec![Channel {
            link: "https://a.example/rss?x=1&y=2".into(),
            title: "Fish & <Chips>".into(),
            ..Default::default()
        }];
        let opml = render_opml(&generator(), &collection(), &channels).unwrap();
        assert!(opml.contains("title=\"Fish &amp; &lt;Chips&gt;\""));
        assert!(opml.contains("xmlUrl=\"https://a.example/rss?x=1&amp;y=2\""));
    }

    #[test]
    fn test_empty_body() {
        let opml = render_opml(&generator(), &collection(), &[]).unwrap();
        assert!(opml.contains("<body>"));
        assert!(opml.contains("</body>"));
        assert!(!opml.contains("<outline"));
    }
}
