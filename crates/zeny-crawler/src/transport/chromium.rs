//! Chromium transport using chromiumoxide.
//!
//! Attaches to a browser the user already has open (started with
//! `--remote-debugging-port`), picks the tab showing a character page, and
//! runs every read and fetch inside that tab so its logged-in session applies.

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use regex::Regex;
use tokio::task::JoinHandle;

use super::{FetchedPage, PageTransport};
use crate::types::{CrawlError, ZenyResult};

const CURRENT_DOCUMENT_JS: &str = "({ url: location.href, status: 200, body: document.documentElement.outerHTML })";

/// Build the in-tab fetch script for `url`.
fn fetch_script(url: &str) -> ZenyResult<String> {
    let literal = serde_json::to_string(url)?;
    Ok(format!(
        "(async () => {{ \
           const r = await fetch({literal}, {{ credentials: 'include' }}); \
           return {{ url: r.url, status: r.status, body: await r.text() }}; \
         }})()"
    ))
}

/// Transport bound to one tab of a running Chromium.
pub struct ChromiumTransport {
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumTransport {
    /// Connect to `ws_url` and bind to the first tab whose URL matches `page_pattern`.
    pub async fn connect(ws_url: &str, page_pattern: &Regex) -> ZenyResult<Self> {
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to connect to {ws_url}: {e}")))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let pages = browser
            .pages()
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to list tabs: {e}")))?;

        let mut seen = Vec::new();
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            if page_pattern.is_match(&url) {
                tracing::info!("attached to tab {url}");
                return Ok(Self {
                    _browser: browser,
                    page,
                    handler,
                });
            }
            seen.push(url);
        }

        handler.abort();
        Err(CrawlError::NotCharacterPage(if seen.is_empty() {
            "no open tabs".to_string()
        } else {
            seen.join(", ")
        }))
    }

    async fn evaluate_page(&self, script: String) -> ZenyResult<FetchedPage> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(CrawlError::Browser)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| CrawlError::Browser(format!("JS execution failed: {e}")))?;

        result
            .into_value::<FetchedPage>()
            .map_err(|e| CrawlError::Browser(format!("failed to convert JS result: {e:?}")))
    }
}

impl Drop for ChromiumTransport {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[async_trait]
impl PageTransport for ChromiumTransport {
    async fn active_url(&self) -> ZenyResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| CrawlError::Browser(format!("failed to get URL: {e}")))?
            .unwrap_or_default();
        Ok(url)
    }

    async fn current_document(&self) -> ZenyResult<FetchedPage> {
        self.evaluate_page(CURRENT_DOCUMENT_JS.to_string()).await
    }

    async fn get(&self, url: &str) -> ZenyResult<FetchedPage> {
        tracing::debug!("in-tab GET {url}");
        self.evaluate_page(fetch_script(url)?).await
    }
}
