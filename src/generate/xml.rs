use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

pub(crate) type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Indented writer with the UTF-8 declaration already emitted.
pub(crate) fn new_document() -> Result<XmlWriter> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;
    Ok(writer)
}

pub(crate) fn start(writer: &mut XmlWriter, element: BytesStart<'_>) -> Result<()> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    writer
        .write_event(Event::Start(element))
        .with_context(|| format!("Failed to write {name} element"))
}

pub(crate) fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {name} end"))
}

pub(crate) fn empty(writer: &mut XmlWriter, element: BytesStart<'_>) -> Result<()> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    writer
        .write_event(Event::Empty(element))
        .with_context(|| format!("Failed to write {name} element"))
}

/// Writes `<name>text</name>`.
pub(crate) fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    text_with_attributes(writer, BytesStart::new(name), text)
}

/// Writes `element` wrapping `text`, keeping whatever attributes it carries.
pub(crate) fn text_with_attributes(
    writer: &mut XmlWriter,
    element: BytesStart<'_>,
    text: &str,
) -> Result<()> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    start(writer, element)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("Failed to write {name} text"))?;
    end(writer, &name)
}

/// Like [`text_element`], but writes nothing for an empty value.
pub(crate) fn optional_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    text_element(writer, name, text)
}

pub(crate) fn finish(writer: XmlWriter, what: &str) -> Result<String> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).with_context(|| format!("Generated {what} contains invalid UTF-8"))
}
