use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_feed, ParsedFeed};
use crate::util::{absolutize, origin_root};

/// Default cap on a feed response body.
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024;

/// Redirect hops followed before a request is failed.
pub const MAX_REDIRECTS: usize = 5;

pub const ACCEPT_FEEDS: &str = "application/rss+xml, application/atom+xml, \
     application/feed+json, application/xml, application/json;q=0.9, */*;q=0.8";

/// Errors that can occur while fetching a single feed.
///
/// All of these are recoverable at the harvest level: the feed is logged and
/// skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// HTTP response with a status other than 200
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Redirect chain longer than [`MAX_REDIRECTS`]
    #[error("Too many redirects: {0}")]
    TooManyRedirects(String),
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Feed body larger than [`FetchLimits::max_body_bytes`]
    #[error("Feed {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: usize },
    /// Connection closed before the declared Content-Length arrived
    #[error("Feed {url} truncated: expected {expected} bytes, received {received}")]
    Truncated {
        url: String,
        expected: u64,
        received: usize,
    },
}

/// Bounds applied to every feed request of a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl FetchLimits {
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            max_body_bytes: DEFAULT_MAX_FEED_BYTES,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_redirect() {
            FetchError::TooManyRedirects(err.to_string())
        } else {
            FetchError::Network(err)
        }
    }
}

pub fn default_user_agent() -> String {
    format!("feedpress/{}", env!("CARGO_PKG_VERSION"))
}

/// Builds the HTTP client used for every feed request of a harvest.
///
/// Each redirect hop is logged; the chain fails once more than
/// [`MAX_REDIRECTS`] hops would be needed.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_FEEDS));

    let redirects = Policy::custom(|attempt| {
        let hops = attempt.previous().len();
        if hops > MAX_REDIRECTS {
            let chain = attempt
                .previous()
                .iter()
                .map(|u| u.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            attempt.error(format!("stopped after {MAX_REDIRECTS} redirects: {chain}"))
        } else {
            tracing::info!(
                from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or_default(),
                to = %attempt.url(),
                hop = hops,
                "Following redirect"
            );
            attempt.follow()
        }
    });

    reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .redirect(redirects)
        .timeout(timeout)
        .build()
        .map_err(FetchError::Network)
}

/// Fetches and parses one feed.
///
/// A feed whose own link is empty or root-relative is anchored at the
/// request's origin.
pub async fn fetch_feed(
    client: &reqwest::Client,
    href: &str,
    limits: FetchLimits,
) -> Result<ParsedFeed, FetchError> {
    let response = tokio::time::timeout(limits.timeout, client.get(href).send())
        .await
        .map_err(|_| FetchError::Timeout)??;

    if response.status() != reqwest::StatusCode::OK {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let body = read_feed_body(href, response, limits.max_body_bytes).await?;
    let mut feed = parse_feed(&body).map_err(|e| FetchError::Parse(e.to_string()))?;

    if feed.link.is_empty() || feed.link.starts_with('/') {
        let origin = origin_root(href).map_err(|e| FetchError::Parse(e.to_string()))?;
        let path = if feed.link.is_empty() { "/" } else { feed.link.as_str() };
        feed.link = absolutize(&origin, path);
    }
    Ok(feed)
}

/// Streams the body of the feed at `href`, failing as soon as it is known to
/// exceed `limit` bytes. A declared Content-Length over the limit fails
/// before any body is read.
async fn read_feed_body(
    href: &str,
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::ResponseTooLarge {
        url: href.to_string(),
        limit,
    };
    let declared = response.content_length();
    let capacity = match declared {
        Some(len) => usize::try_from(len)
            .ok()
            .filter(|&len| len <= limit)
            .ok_or_else(too_large)?,
        None => 0,
    };

    let mut body = Vec::with_capacity(capacity);
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len().saturating_add(chunk.len()) > limit {
            tracing::debug!(feed = %href, limit, "Feed body over limit");
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    match declared {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::Truncated {
            url: href.to_string(),
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Test</title>
    <item><guid>1</guid><title>Test</title><link>/posts/1</link></item>
</channel></rss>"#;

    const LIMITS: FetchLimits = FetchLimits::with_timeout(Duration::from_secs(5));

    fn client() -> reqwest::Client {
        build_client(&default_user_agent(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_accept_and_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header_exists("accept"))
            .and(header("user-agent", default_user_agent().as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let feed = fetch_feed(
            &client(),
            &format!("{}/feed", mock_server.uri()),
            LIMITS,
        )
        .await
        .unwrap();
        assert_eq!(feed.title, "Test");
        assert_eq!(feed.items.len(), 1);

        let requests = mock_server.received_requests().await.unwrap();
        let accept = requests[0].headers.get("accept").unwrap().to_str().unwrap();
        assert_eq!(accept, ACCEPT_FEEDS);
    }

    #[tokio::test]
    async fn test_empty_feed_link_normalized_to_origin() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let feed = fetch_feed(
            &client(),
            &format!("{}/deep/feed.xml", mock_server.uri()),
            LIMITS,
        )
        .await
        .unwrap();
        assert_eq!(feed.link, format!("{}/", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let result = fetch_feed(&client(), &mock_server.uri(), LIMITS).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(404))));
    }

    #[tokio::test]
    async fn test_non_200_success_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let result = fetch_feed(&client(), &mock_server.uri(), LIMITS).await;
        assert!(matches!(result, Err(FetchError::HttpStatus(204))));
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a feed"))
            .mount(&mock_server)
            .await;

        let result = fetch_feed(&client(), &mock_server.uri(), LIMITS).await;
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_redirects_within_limit_are_followed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/new", mock_server.uri()).as_str()),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let feed = fetch_feed(
            &client(),
            &format!("{}/old", mock_server.uri()),
            LIMITS,
        )
        .await
        .unwrap();
        assert_eq!(feed.items.len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_loop_fails() {
        let mock_server = MockServer::start().await;
        for hop in 0..10 {
            Mock::given(method("GET"))
                .and(path(format!("/hop{hop}")))
                .respond_with(ResponseTemplate::new(302).insert_header(
                    "Location",
                    format!("{}/hop{}", mock_server.uri(), hop + 1).as_str(),
                ))
                .mount(&mock_server)
                .await;
        }

        let result = fetch_feed(
            &client(),
            &format!("{}/hop0", mock_server.uri()),
            LIMITS,
        )
        .await;
        assert!(matches!(result, Err(FetchError::TooManyRedirects(_))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let client = build_client(&default_user_agent(), Duration::from_millis(200)).unwrap();
        let limits = FetchLimits::with_timeout(Duration::from_millis(200));
        let result = fetch_feed(&client, &mock_server.uri(), limits).await;
        assert!(matches!(result, Err(FetchError::Timeout)));
    }

    #[tokio::test]
    async fn test_body_over_limit_is_rejected_with_feed_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS.repeat(4)))
            .mount(&mock_server)
            .await;

        let href = format!("{}/big.xml", mock_server.uri());
        let limits = FetchLimits {
            max_body_bytes: VALID_RSS.len(),
            ..LIMITS
        };
        let result = fetch_feed(&client(), &href, limits).await;
        match result {
            Err(FetchError::ResponseTooLarge { url, limit }) => {
                assert_eq!(url, href);
                assert_eq!(limit, VALID_RSS.len());
            }
            other => panic!("expected ResponseTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_body_at_limit_is_accepted() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let limits = FetchLimits {
            max_body_bytes: VALID_RSS.len(),
            ..LIMITS
        };
        let feed = fetch_feed(&client(), &mock_server.uri(), limits).await.unwrap();
        assert_eq!(feed.items.len(), 1);
    }
}
