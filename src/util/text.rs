use std::borrow::Cow;

/// Escapes text for inclusion in XML or HTML character data and attributes.
///
/// `&` is replaced first so the numeric references introduced for the other
/// characters are never escaped twice.
///
/// # Examples
///
/// ```
/// use feedpress::util::to_xml_string;
///
/// assert_eq!(to_xml_string("a < b & c"), "a &#60; b &#38; c");
/// assert_eq!(to_xml_string("plain"), "plain");
/// ```
pub fn to_xml_string(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let escaped = input
        .replace('&', "&#38;")
        .replace('<', "&#60;")
        .replace('>', "&#62;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;");
    Cow::Owned(escaped)
}

/// Re-indents a multi-line block so every line after the first starts with
/// `spaces` spaces. The first line is left as-is since the caller has already
/// positioned it.
pub fn indent_text(src: &str, spaces: usize) -> String {
    let separator = format!("\n{}", " ".repeat(spaces));
    src.lines().collect::<Vec<_>>().join(&separator)
}

/// Returns the `YYYY-MM-DD` prefix of a stored timestamp, or the whole string
/// if it is shorter than a date.
pub fn date_prefix(value: &str) -> &str {
    match value.char_indices().nth(10) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Swaps a trailing `.md` extension for `.html`. Other paths pass through.
pub fn markdown_to_html_path(path: &str) -> String {
    match path.strip_suffix(".md") {
        Some(stem) => format!("{stem}.html"),
        None => path.to_string(),
    }
}
