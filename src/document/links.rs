use regex::Regex;
use std::sync::LazyLock;

/// `- [LABEL](URL "OPTIONAL DESCRIPTION")` anywhere on a line.
static LINK_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"-\s+\[([^\]]*)\]\(\s*([^\s)]+)(?:\s+"([^"]*)")?\s*\)"#).ok()
});

/// A feed reference extracted from a feed-list document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub label: String,
    pub url: String,
    pub description: String,
}

/// Scans `body` line by line for dash-introduced links. Only the first
/// match on a line counts; lines without one are skipped.
pub fn extract_links(body: &str) -> Vec<Link> {
    let Some(pattern) = LINK_LINE.as_ref() else {
        return Vec::new();
    };
    body.lines()
        .filter_map(|line| pattern.captures(line))
        .map(|caps| Link {
            label: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            url: caps.get(2).map_or("", |m| m.as_str()).to_string(),
            description: caps.get(3).map_or("", |m| m.as_str()).trim().to_string(),
        })
        .collect()
}
