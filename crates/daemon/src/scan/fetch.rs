// Outbound search requests.

use std::future::Future;

use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::debug;
use url::Url;

use super::error::FetchError;
use crate::config::SearchConfig;

/// Fetches the raw body of one search request.
pub trait SearchFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// `reqwest`-backed fetcher with a fixed User-Agent and per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpSearchFetcher {
    client: reqwest::Client,
}

impl HttpSearchFetcher {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to create search HTTP client")?;

        Ok(Self { client })
    }
}

impl SearchFetcher for HttpSearchFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|error| FetchError::InvalidUrl {
            url: url.to_string(),
            message: error.to_string(),
        })?;

        let response = self.client.get(parsed).send().await.map_err(|error| {
            if error.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Request { url: url.to_string(), message: error.to_string() }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let body = response.text().await.map_err(|error| FetchError::Body {
            url: url.to_string(),
            message: error.to_string(),
        })?;
        debug!(url, bytes = body.len(), "fetched search page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_url_is_rejected_before_sending() {
        let fetcher =
            HttpSearchFetcher::new(&SearchConfig::default()).expect("client should build");
        let error = fetcher.fetch("not a url").await.expect_err("fetch should fail");
        assert!(matches!(error, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let config = SearchConfig { request_timeout_secs: 2, ..SearchConfig::default() };
        let fetcher = HttpSearchFetcher::new(&config).expect("client should build");
        // Nothing listens on the loopback discard port.
        let error =
            fetcher.fetch("http://127.0.0.1:9/search?q=x").await.expect_err("fetch should fail");
        assert!(matches!(error, FetchError::Request { .. } | FetchError::Timeout { .. }));
    }
}
