use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a feed's raw bytes.
///
/// Every variant carries the URL that was being fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or uses a scheme other than http/https
    #[error("invalid feed URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// Response status was 300 or above
    #[error("{url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },
    /// Headers and body not fully received within the configured timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// Response body exceeded the configured size limit
    #[error("response from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: usize },
    /// Received fewer bytes than Content-Length announced
    #[error("incomplete response from {url}: expected {expected} bytes, received {received}")]
    IncompleteResponse {
        url: String,
        expected: u64,
        received: usize,
    },
    /// Local file could not be read
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// URL whose fetch failed.
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Timeout { url }
            | FetchError::ResponseTooLarge { url, .. }
            | FetchError::IncompleteResponse { url, .. }
            | FetchError::Io { url, .. } => url,
        }
    }
}

/// Turns a feed URL into the raw bytes of the document behind it.
///
/// The pipeline depends only on this trait, so the transport can be swapped
/// for a file reader or an in-memory stub without touching orchestration.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Retrieves the document at `url`.
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Transport settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Sent as the `User-Agent` header
    pub user_agent: String,
    /// Upper bound on one whole request, body included
    pub timeout: Duration,
    /// Bodies larger than this are rejected
    pub max_feed_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("feedfold/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_feed_bytes: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

/// Fetches feeds over HTTP(S) with `reqwest`.
///
/// Any status of 300 or above is a failure, including redirects that the
/// client did not follow and `304 Not Modified`. Requests are made once;
/// there are no retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_feed_bytes: usize,
}

impl HttpFetcher {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Uses an existing client, taking only the limits from `config`.
    pub fn with_client(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self {
            client,
            timeout: config.timeout,
            max_feed_bytes: config.max_feed_bytes,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {} (only http/https allowed)", parsed.scheme()),
            });
        }

        // Covers the body too, not just the headers
        tokio::time::timeout(self.timeout, self.fetch(parsed, url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
    }
}

impl HttpFetcher {
    async fn fetch(&self, parsed: Url, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.as_u16() >= 300 {
            tracing::debug!(feed = %url, status = %status, "Rejecting non-success response");
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        read_limited_bytes(url, response, self.max_feed_bytes).await
    }
}

async fn read_limited_bytes(
    url: &str,
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::ResponseTooLarge {
        url: url.to_string(),
        limit,
    };

    // Fast path: check Content-Length header
    let expected_length = response.content_length();
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(too_large());
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                url: url.to_string(),
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

/// Reads feeds from the local filesystem, treating each URL as a path.
///
/// A leading `file://` is stripped. Useful for tests and for working on
/// saved feed snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(path).await.map_err(|source| FetchError::Io {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Test</title>
    <item><title>One</title><pubDate>Mon, 02 Jan 2006 15:04:05 GMT</pubDate></item>
</channel></rss>"#;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_client(reqwest::Client::new(), &FetchConfig::default())
    }

    #[tokio::test]
    async fn test_get_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .mount(&mock_server)
            .await;

        let bytes = fetcher()
            .get(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, VALID_RSS.as_bytes());
    }

    #[tokio::test]
    async fn test_get_sends_configured_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "feedfold-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            user_agent: "feedfold-test/1.0".to_string(),
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert!(fetcher.get(&mock_server.uri()).await.is_ok());
    }

    #[tokio::test]
    async fn test_get_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing", mock_server.uri());
        match fetcher().get(&url).await.unwrap_err() {
            FetchError::HttpStatus { url: u, status: 404 } => assert_eq!(u, url),
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_3xx_is_failure() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&mock_server)
            .await;

        match fetcher().get(&mock_server.uri()).await.unwrap_err() {
            FetchError::HttpStatus { status: 304, .. } => {}
            e => panic!("Expected HttpStatus(304), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        match fetcher().get(&mock_server.uri()).await.unwrap_err() {
            FetchError::HttpStatus { status: 500, .. } => {}
            e => panic!("Expected HttpStatus(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_body_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(2048)))
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            max_feed_bytes: 1024,
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::with_client(reqwest::Client::new(), &config);
        match fetcher.get(&mock_server.uri()).await.unwrap_err() {
            FetchError::ResponseTooLarge { limit: 1024, .. } => {}
            e => panic!("Expected ResponseTooLarge, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_rejects_non_http_scheme() {
        let err = fetcher().get("ftp://example.com/feed.xml").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(err.url(), "ftp://example.com/feed.xml");
    }

    #[tokio::test]
    async fn test_get_rejects_unparsable_url() {
        let err = fetcher().get("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_get_connection_refused_is_network_error() {
        // Bind and drop to obtain a port nothing is listening on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher()
            .get(&format!("http://{}/feed", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_get_times_out_waiting_for_headers() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            timeout: Duration::from_millis(50),
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::with_client(reqwest::Client::new(), &config);
        let err = fetcher.get(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_get_times_out_when_body_stalls() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Sends headers and a few bytes of a 1000 byte body, then goes quiet
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n<rss><channel>")
                .await
                .unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = FetchConfig {
            timeout: Duration::from_millis(200),
            ..FetchConfig::default()
        };
        let fetcher = HttpFetcher::with_client(reqwest::Client::new(), &config);
        let started = std::time::Instant::now();
        let err = fetcher
            .get(&format!("http://{}/feed", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_file_fetcher_reads_fixture() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/ten_items.xml");
        let bytes = FileFetcher.get(path).await.unwrap();
        assert!(bytes.starts_with(b"<?xml"));

        let with_scheme = FileFetcher.get(&format!("file://{}", path)).await.unwrap();
        assert_eq!(bytes, with_scheme);
    }

    #[tokio::test]
    async fn test_file_fetcher_missing_path_is_io_error() {
        let err = FileFetcher
            .get("/nonexistent/feedfold/feed.xml")
            .await
            .unwrap_err();
        match &err {
            FetchError::Io { url, source } => {
                assert_eq!(url, "/nonexistent/feedfold/feed.xml");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            e => panic!("Expected Io error, got {:?}", e),
        }
    }
}
