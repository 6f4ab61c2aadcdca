//! HTTP fetching of watch pages, embed pages and player scripts

use crate::error::ResolveError;
use crate::platform::retry::{RetryConfig, RetryExecutor, RetryFuture};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::debug;

/// Default desktop browser user agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Source of page and script text
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the body of `url` as text
    async fn fetch_text(&self, url: &str) -> Result<String, ResolveError>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: Option<String>,
    /// Proxy URL
    pub proxy_url: Option<String>,
    /// Retry policy for failed requests
    pub retry: RetryConfig,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            proxy_url: None,
            retry: RetryConfig::default(),
        }
    }
}

/// reqwest-backed [`PageFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: HttpClientConfig,
    retry: RetryExecutor,
}

impl HttpFetcher {
    /// Create a fetcher with default configuration
    pub fn new() -> Result<Self, ResolveError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a fetcher with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, ResolveError> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));

        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        let client = builder.build()?;
        let retry = RetryExecutor::with_config(config.retry.clone());

        Ok(Self {
            client,
            config,
            retry,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    async fn fetch_once(client: Client, url: String) -> Result<String, ResolveError> {
        let response = client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ResolveError::Timeout(url.clone())
            } else {
                ResolveError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, ResolveError> {
        debug!("Fetching {}", url);
        let body: String = self
            .retry
            .execute(|| -> RetryFuture<String> {
                Box::pin(Self::fetch_once(self.client.clone(), url.to_string()))
            })
            .await?;
        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(5),
            retry: RetryConfig::default()
                .with_max_retries(2)
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter_factor(0.0),
            ..HttpClientConfig::default()
        }
    }

    #[test]
    fn test_fetcher_creation() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.config().timeout, Duration::from_secs(30));
        assert_eq!(fetcher.config().retry.max_retries, 3);
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/watch")
            .with_status(200)
            .with_body("<html>page</html>")
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_config(fast_config()).unwrap();
        let body = fetcher
            .fetch_text(&format!("{}/watch", server.url()))
            .await
            .unwrap();

        assert_eq!(body, "<html>page</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_through_proxy() {
        let mut proxy = mockito::Server::new_async().await;
        let mock = proxy
            .mock("GET", "/watch")
            .with_status(200)
            .with_body("<html>proxied</html>")
            .create_async()
            .await;

        let config = HttpClientConfig {
            proxy_url: Some(proxy.url()),
            ..fast_config()
        };
        let fetcher = HttpFetcher::with_config(config).unwrap();
        let body = fetcher
            .fetch_text("http://sigres.invalid/watch")
            .await
            .unwrap();

        assert_eq!(body, "<html>proxied</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_config(fast_config()).unwrap();
        let result = fetcher
            .fetch_text(&format!("{}/missing", server.url()))
            .await;

        assert!(matches!(
            result,
            Err(ResolveError::HttpStatus { status: 404, .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let fetcher = HttpFetcher::with_config(fast_config()).unwrap();
        let result = fetcher.fetch_text(&format!("{}/flaky", server.url())).await;

        assert!(matches!(
            result,
            Err(ResolveError::HttpStatus { status: 503, .. })
        ));
        mock.assert_async().await;
    }
}
