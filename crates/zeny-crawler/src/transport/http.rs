//! HTTP transport wrapping reqwest.
//!
//! Not a browser. The "open page" is a character page URL given up front and
//! re-fetched on demand. Every call issues exactly one request: no retries,
//! no backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};

use super::{FetchedPage, PageTransport};
use crate::config::CrawlConfig;
use crate::types::{CrawlError, ZenyResult};

/// HTTP transport for crawling without a browser.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    page_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport whose open page is `page_url`.
    pub fn new(config: &CrawlConfig, page_url: impl Into<String>) -> ZenyResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| CrawlError::Config(format!("invalid session cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            page_url: page_url.into(),
            timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn active_url(&self) -> ZenyResult<String> {
        Ok(self.page_url.clone())
    }

    async fn current_document(&self) -> ZenyResult<FetchedPage> {
        let page = self.get(&self.page_url).await?;
        if !page.is_success() {
            return Err(CrawlError::Browser(format!(
                "open page {} answered HTTP {}",
                self.page_url, page.status
            )));
        }
        Ok(page)
    }

    async fn get(&self, url: &str) -> ZenyResult<FetchedPage> {
        tracing::debug!("GET {url}");
        let resp = self.client.get(url).timeout(self.timeout).send().await?;

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp.text().await?;

        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}
