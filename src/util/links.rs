use url::Url;

/// Returns the root of `href`'s origin, e.g. `https://example.org:8080/`.
pub fn origin_root(href: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(href)?;
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Resolves a root-relative `link` against `base`.
///
/// Absolute links and links that are not root-relative are returned
/// unchanged. When `base` cannot be parsed the two are concatenated.
pub fn absolutize(base: &str, link: &str) -> String {
    if !link.starts_with('/') || link.starts_with("//") {
        return link.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(link)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}{}", base.trim_end_matches('/'), link),
    }
}

/// Joins a base URL and a relative path with exactly one `/` between them.
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// A quoted passage addressed by a `#:~:text=` fragment link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment {
    pub text: String,
    pub link: String,
    pub host: String,
}

impl TextFragment {
    /// Builds a link to `text` within the page at `href`, replacing any
    /// existing fragment.
    pub fn new(href: &str, text: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(href)?;
        // `-` and `,` delimit prefix, suffix and range in a text directive.
        let encoded = urlencoding::encode(text.trim()).replace('-', "%2D");
        url.set_fragment(Some(&format!(":~:text={encoded}")));
        Ok(Self {
            text: text.trim().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            link: url.to_string(),
        })
    }

    /// Reads the quoted text back out of a fragment link. Links without a
    /// text directive yield the decoded fragment as is.
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        let url = Url::parse(href)?;
        let fragment = url.fragment().unwrap_or_default();
        let directive = fragment.split_once(":~:").map_or(fragment, |(_, d)| d);
        let encoded = directive.split_once('=').map_or(directive, |(_, t)| t);
        let text = urlencoding::decode(encoded)
            .map(|t| t.into_owned())
            .unwrap_or_else(|_| encoded.to_string());
        Ok(Self {
            text,
            link: href.to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
        })
    }

    /// Markdown block quoting the passage with an attribution line.
    pub fn reply_markdown(&self, accessed: chrono::NaiveDate) -> String {
        format!(
            "\n\n> {}\n\n([{}]({}), accessed {})\n\n",
            self.text.trim(),
            self.host,
            self.link.trim(),
            accessed.format("%Y-%m-%d")
        )
    }
}
