//! Core data types for crawl records and the error taxonomy.

use serde::{Deserialize, Serialize};

/// Placeholder for a field whose selector matched nothing on a fetched page.
pub const UNKNOWN_PLACEHOLDER: &str = "unknown";

/// Placeholder for both fields of a character whose detail page could not be fetched.
///
/// Kept distinct from [`UNKNOWN_PLACEHOLDER`] so a missing cell and a failed
/// request can be told apart in the rendered output.
pub const FAILURE_SENTINEL: &str = "unavailable";

/// A world (server partition) as listed in the page's world selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldInfo {
    /// Opaque identifier used in listing URLs.
    pub value: String,
    /// Human-readable label.
    pub text: String,
}

impl WorldInfo {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Link to a single character's detail page, tagged with its origin world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterPageLink {
    #[serde(flatten)]
    pub world: WorldInfo,
    /// Absolute URL of the detail page.
    pub href: String,
}

impl CharacterPageLink {
    pub fn new(world: WorldInfo, href: impl Into<String>) -> Self {
        Self {
            world,
            href: href.into(),
        }
    }
}

/// Everything scraped for one character.
///
/// Stored flat as `{value, text, href, characterName, zeny}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDetail {
    #[serde(flatten)]
    pub link: CharacterPageLink,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zeny: Option<String>,
}

impl CharacterDetail {
    /// A successfully scraped record.
    pub fn scraped(
        link: CharacterPageLink,
        character_name: impl Into<String>,
        zeny: impl Into<String>,
    ) -> Self {
        Self {
            link,
            character_name: Some(character_name.into()),
            zeny: Some(zeny.into()),
        }
    }

    /// A record whose detail page could not be fetched.
    pub fn failed(link: CharacterPageLink) -> Self {
        Self::scraped(link, FAILURE_SENTINEL, FAILURE_SENTINEL)
    }

    pub fn world(&self) -> &WorldInfo {
        &self.link.world
    }

    pub fn is_failure(&self) -> bool {
        self.zeny.as_deref() == Some(FAILURE_SENTINEL)
            && self.character_name.as_deref() == Some(FAILURE_SENTINEL)
    }
}

/// One run's full output, in crawl order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlResult {
    pub entries: Vec<CharacterDetail>,
}

impl CrawlResult {
    pub fn new(entries: Vec<CharacterDetail>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, detail: CharacterDetail) {
        self.entries.push(detail);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CharacterDetail> {
        self.entries.iter()
    }
}

impl FromIterator<CharacterDetail> for CrawlResult {
    fn from_iter<I: IntoIterator<Item = CharacterDetail>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// How amounts are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPreference {
    /// Every digit, with thousands separators.
    #[default]
    Full,
    /// Magnitude-abbreviated (K / M / G), expandable on focus.
    Short,
}

impl DisplayPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Short => "short",
        }
    }
}

impl std::fmt::Display for DisplayPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DisplayPreference {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "short" => Ok(Self::Short),
            other => Err(CrawlError::Config(format!(
                "unknown display preference {other:?} (expected \"full\" or \"short\")"
            ))),
        }
    }
}

/// All errors surfaced by the crawler library.
#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Active page is not a character page: {0}")]
    NotCharacterPage(String),

    #[error("Cooling down: {remaining_ms} ms until the next run is allowed")]
    CoolingDown { remaining_ms: i64 },

    #[error("A crawl is already running")]
    AlreadyRunning,

    #[error("Stage {stage} returned an unexpected output")]
    StageMismatch { stage: &'static str },
}

/// Convenience result type.
pub type ZenyResult<T> = Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn alpha_link() -> CharacterPageLink {
        CharacterPageLink::new(
            WorldInfo::new("1", "Alpha"),
            "https://rowebtool.gungho.jp/character/1/42",
        )
    }

    #[test]
    fn test_detail_serializes_flat_camel_case() {
        let detail = CharacterDetail::scraped(alpha_link(), "Poring", "12,345 Zeny");
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["value"], "1");
        assert_eq!(json["text"], "Alpha");
        assert_eq!(json["href"], "https://rowebtool.gungho.jp/character/1/42");
        assert_eq!(json["characterName"], "Poring");
        assert_eq!(json["zeny"], "12,345 Zeny");
        assert!(json.get("link").is_none());
        assert!(json.get("world").is_none());
    }

    #[test]
    fn test_detail_loads_without_optional_fields() {
        let json = r#"{"value":"2","text":"Beta","href":"https://x/character/2/1"}"#;
        let detail: CharacterDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.world().text, "Beta");
        assert!(detail.character_name.is_none());
        assert!(detail.zeny.is_none());
    }

    #[test]
    fn test_failed_detail_uses_sentinel_for_both_fields() {
        let detail = CharacterDetail::failed(alpha_link());
        assert_eq!(detail.character_name.as_deref(), Some(FAILURE_SENTINEL));
        assert_eq!(detail.zeny.as_deref(), Some(FAILURE_SENTINEL));
        assert!(detail.is_failure());
        assert_ne!(FAILURE_SENTINEL, UNKNOWN_PLACEHOLDER);
    }

    #[test]
    fn test_crawl_result_is_a_plain_array() {
        let result = CrawlResult::new(vec![CharacterDetail::failed(alpha_link())]);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_display_preference_parse() {
        assert_eq!("full".parse::<DisplayPreference>().unwrap(), DisplayPreference::Full);
        assert_eq!(" Short ".parse::<DisplayPreference>().unwrap(), DisplayPreference::Short);
        assert!("tiny".parse::<DisplayPreference>().is_err());
        assert_eq!(
            serde_json::to_string(&DisplayPreference::Short).unwrap(),
            "\"short\""
        );
    }
}
