//! Page transports: how stage code reads the open page and fetches others.
//!
//! A transport either talks HTTP directly (`HttpTransport`) or drives a live
//! browser tab over the DevTools protocol (`ChromiumTransport`), where every
//! fetch runs inside the tab and carries its cookies.

pub mod chromium;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::ZenyResult;

pub use chromium::ChromiumTransport;
pub use http::HttpTransport;

/// A fetched HTML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL the document was loaded from (after redirects).
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Access to the page the user has open plus single GETs against the remote service.
#[async_trait]
pub trait PageTransport: Send + Sync {
    /// URL of the page currently open.
    async fn active_url(&self) -> ZenyResult<String>;
    /// HTML of the page currently open.
    async fn current_document(&self) -> ZenyResult<FetchedPage>;
    /// One GET, no retries. Non-success statuses are returned, not raised.
    async fn get(&self, url: &str) -> ZenyResult<FetchedPage>;
}
