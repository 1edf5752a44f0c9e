use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

use super::DocumentError;
use crate::storage::Person;

const DELIMITER: &str = "---";

/// Typed metadata block of a Markdown document.
///
/// Known keys are typed fields; anything else is preserved in `extra` so a
/// document can be rewritten without dropping keys this crate doesn't use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, rename = "postPath", skip_serializing_if = "Option::is_none")]
    pub post_path: Option<String>,
    #[serde(default, rename = "pubDate", skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(default, rename = "datePublished", skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, rename = "dateModified", skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    /// Free-form person data; see [`FrontMatter::persons`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,

    // Collection documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(default, rename = "managingEditor", skip_serializing_if = "Option::is_none")]
    pub managing_editor: Option<String>,
    #[serde(default, rename = "webMaster", skip_serializing_if = "Option::is_none")]
    pub web_master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(default, rename = "dbName", skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FrontMatter {
    /// Looks up a string-valued key by its document name (`pubDate`, not
    /// `pub_date`). Empty strings count as absent.
    pub fn string(&self, key: &str) -> Option<&str> {
        let typed = match key {
            "title" => self.title.as_deref(),
            "description" => self.description.as_deref(),
            "abstract" => self.summary.as_deref(),
            "link" => self.link.as_deref(),
            "postPath" => self.post_path.as_deref(),
            "pubDate" => self.pub_date.as_deref(),
            "datePublished" => self.date_published.as_deref(),
            "dateModified" => self.date_modified.as_deref(),
            "channel" => self.channel.as_deref(),
            "guid" => self.guid.as_deref(),
            "language" => self.language.as_deref(),
            "copyright" => self.copyright.as_deref(),
            "managingEditor" => self.managing_editor.as_deref(),
            "webMaster" => self.web_master.as_deref(),
            "generator" => self.generator.as_deref(),
            "dbName" => self.db_name.as_deref(),
            _ => match self.extra.get(key) {
                Some(Value::String(s)) => Some(s.as_str()),
                _ => None,
            },
        };
        typed.filter(|s| !s.trim().is_empty())
    }

    /// Looks up a boolean key. Only `draft` is typed; other keys come from
    /// the untyped remainder.
    pub fn boolean(&self, key: &str) -> Option<bool> {
        match key {
            "draft" => self.draft,
            _ => match self.extra.get(key) {
                Some(Value::Bool(b)) => Some(*b),
                _ => None,
            },
        }
    }

    /// Decodes a person list.
    ///
    /// Accepts a single string (`"jane@example.org (Jane Doe)"` or a plain
    /// name), a `{name, email}` map, or a list of either.
    pub fn persons(&self, key: &str, required: bool) -> Result<Vec<Person>, DocumentError> {
        let value = match key {
            "author" => self.author.as_ref(),
            _ => self.extra.get(key),
        };
        let persons = match value {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => parse_persons(v).ok_or_else(|| DocumentError::InvalidPersons {
                key: key.to_string(),
            })?,
        };
        if required && persons.is_empty() {
            return Err(DocumentError::MissingField(key.to_string()));
        }
        Ok(persons)
    }
}

fn parse_persons(value: &Value) -> Option<Vec<Person>> {
    match value {
        Value::String(s) => Some(vec![person_from_str(s)]),
        Value::Mapping(_) => person_from_map(value).map(|p| vec![p]),
        Value::Sequence(seq) => seq
            .iter()
            .map(|v| match v {
                Value::String(s) => Some(person_from_str(s)),
                Value::Mapping(_) => person_from_map(v),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Splits `"jane@example.org (Jane Doe)"` into its parts. A string with no
/// `@` is treated as a bare name.
fn person_from_str(src: &str) -> Person {
    let src = src.trim();
    if !src.contains('@') {
        return Person {
            name: src.to_string(),
            email: String::new(),
        };
    }
    match src.split_once('(') {
        Some((email, name)) => Person {
            name: name.trim_end().trim_end_matches(')').trim().to_string(),
            email: email.trim().to_string(),
        },
        None => Person {
            name: String::new(),
            email: src.to_string(),
        },
    }
}

fn person_from_map(value: &Value) -> Option<Person> {
    let field = |k: &str| {
        value
            .get(k)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let person = Person {
        name: field("name"),
        email: field("email"),
    };
    (!person.name.is_empty() || !person.email.is_empty()).then_some(person)
}

/// Splits a document into its metadata block and body.
///
/// The block must start on the first line and is closed by the next line
/// consisting of exactly `---`. A document without an opening delimiter is
/// returned unchanged as the body.
pub fn split_front_matter(src: &[u8]) -> Result<(Option<FrontMatter>, String), DocumentError> {
    let text = String::from_utf8_lossy(src);
    let mut lines = text.split_inclusive('\n');

    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => return Ok((None, text.into_owned())),
    }

    let mut offset = 0;
    let mut block_start = None;
    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        match block_start {
            None => block_start = Some(offset),
            Some(start) if is_delimiter(line) => {
                let yaml = &text[start..line_start];
                let body = text[offset..].to_string();
                return Ok((parse_block(yaml)?, body));
            }
            Some(_) => {}
        }
    }

    Err(DocumentError::UnclosedFrontMatter {
        body: text.into_owned(),
    })
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == DELIMITER
}

fn parse_block(yaml: &str) -> Result<Option<FrontMatter>, DocumentError> {
    if yaml.trim().is_empty() {
        return Ok(None);
    }
    let front_matter: FrontMatter = serde_yaml::from_str(yaml)?;
    Ok(Some(front_matter))
}
