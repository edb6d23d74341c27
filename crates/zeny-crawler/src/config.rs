//! Crawl configuration and the versioned selector table.
//!
//! The remote pages have changed shape over time. Every structural selector,
//! the listing-URL template and the character-page pattern live in
//! `selectors.json`, embedded at compile time, keyed by a profile version.
//! A config file can pick another profile or provide a complete custom one.

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{CrawlError, ZenyResult};

/// Raw JSON content of the built-in selector table.
const SELECTORS_JSON: &str = include_str!("selectors.json");

/// Default remote service origin.
pub const DEFAULT_BASE_URL: &str = "https://rowebtool.gungho.jp";

/// Pause before every remote fetch.
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 1_500;

/// Minimum wait between two runs (5 minutes).
pub const DEFAULT_COOLDOWN_MS: i64 = 5 * 60 * 1000;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

const DEFAULT_USER_AGENT: &str = concat!("zeny-crawler/", env!("CARGO_PKG_VERSION"));

/// Placeholder in [`SelectorProfile::listing_path`] replaced by the world value.
const WORLD_PLACEHOLDER: &str = "{world}";

/// One revision of the remote page structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorProfile {
    pub version: String,
    /// The `<select>` holding one `<option>` per world.
    pub world_select: String,
    /// Anchors to character detail pages on a world listing page.
    pub character_links: String,
    /// Table cell holding the character name on a detail page.
    pub character_name: String,
    /// Table cell holding the zeny balance on a detail page.
    pub zeny: String,
    /// Listing page path relative to the base URL, with a `{world}` placeholder.
    pub listing_path: String,
    /// Regex the active page URL must match before a crawl may start.
    pub page_pattern: String,
}

#[derive(Debug, Deserialize)]
struct SelectorTable {
    default: String,
    profiles: Vec<SelectorProfile>,
}

impl SelectorTable {
    fn builtin() -> ZenyResult<Self> {
        serde_json::from_str(SELECTORS_JSON)
            .map_err(|e| CrawlError::Config(format!("built-in selector table is invalid: {e}")))
    }

    fn find(&self, version: &str) -> Option<&SelectorProfile> {
        self.profiles.iter().find(|p| p.version == version)
    }
}

/// Versions of every built-in selector profile.
pub fn builtin_profile_versions() -> ZenyResult<Vec<String>> {
    Ok(SelectorTable::builtin()?
        .profiles
        .into_iter()
        .map(|p| p.version)
        .collect())
}

/// Settings for a crawl session. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Origin the listing path is joined onto.
    pub base_url: String,
    pub courtesy_delay_ms: u64,
    pub cooldown_ms: i64,
    pub request_timeout_ms: u64,
    pub user_agent: String,
    /// Raw `Cookie` header sent by the HTTP transport.
    pub session_cookie: Option<String>,
    /// Whether a run that finds no worlds still starts the cooldown window.
    pub cooldown_on_missing_worlds: bool,
    /// Built-in profile version; `None` picks the table's default.
    pub selector_profile: Option<String>,
    /// Complete custom profile; takes precedence over `selector_profile`.
    pub selectors: Option<SelectorProfile>,
    /// Overrides the profile's page pattern.
    pub page_pattern: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            courtesy_delay_ms: DEFAULT_COURTESY_DELAY_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_cookie: None,
            cooldown_on_missing_worlds: false,
            selector_profile: None,
            selectors: None,
            page_pattern: None,
        }
    }
}

impl CrawlConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> ZenyResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            CrawlError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        tracing::debug!("loaded crawl config from {}", path.display());
        Ok(config)
    }

    /// Resolve the selector profile in effect.
    pub fn selector_profile(&self) -> ZenyResult<SelectorProfile> {
        if let Some(custom) = &self.selectors {
            return Ok(custom.clone());
        }

        let table = SelectorTable::builtin()?;
        let version = self.selector_profile.as_deref().unwrap_or(&table.default);
        table.find(version).cloned().ok_or_else(|| {
            CrawlError::Config(format!("unknown selector profile {version:?}"))
        })
    }

    /// Compiled pattern for character-profile page URLs.
    pub fn page_pattern(&self) -> ZenyResult<Regex> {
        let pattern = match &self.page_pattern {
            Some(p) => p.clone(),
            None => self.selector_profile()?.page_pattern,
        };
        Regex::new(&pattern)
            .map_err(|e| CrawlError::Config(format!("invalid page pattern {pattern:?}: {e}")))
    }

    /// URL of a world's character listing page.
    pub fn listing_url(&self, profile: &SelectorProfile, world_value: &str) -> String {
        let path = profile.listing_path.replace(WORLD_PLACEHOLDER, world_value);
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
