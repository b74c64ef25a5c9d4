use crate::config::ScraperConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use tracing::debug;
use url::Url;

/// Thin wrapper around a `reqwest::Client` preloaded with the browser-like
/// headers the exchange site insists on.
pub struct HttpClient {
    inner: reqwest::Client,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(default_headers(config)?)
            .timeout(config.timeout())
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    /// One GET, no retry. Status handling is left to the caller.
    pub async fn get(&self, url: Url) -> Result<(reqwest::StatusCode, String), FetchError> {
        debug!("GET {}", url);
        let resp = self.inner.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }
}

fn default_headers(config: &ScraperConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        REFERER,
        HeaderValue::from_str(&config.referer).context("Invalid referer header")?,
    );
    headers.insert(
        ORIGIN,
        HeaderValue::from_str(&config.origin).context("Invalid origin header")?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    if config.xhr_header {
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
    }
    Ok(headers)
}
