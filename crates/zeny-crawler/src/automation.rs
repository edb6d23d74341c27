//! Browser automation seam: run a named scraper stage inside a page context.
//!
//! The orchestrator only ever talks to [`BrowserAutomation`]. How a stage is
//! executed (plain HTTP, a DevTools-driven tab, a test double) is up to the
//! implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::scraper::PageScraper;
use crate::transport::PageTransport;
use crate::types::{CharacterDetail, CharacterPageLink, CrawlError, WorldInfo, ZenyResult};

/// A stage invocation with its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "args", rename_all = "camelCase")]
pub enum Stage {
    ListWorlds,
    ListCharacterLinks(WorldInfo),
    ScrapeDetail(CharacterPageLink),
}

impl Stage {
    /// Stable stage identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::ListWorlds => "listWorlds",
            Self::ListCharacterLinks(_) => "listCharacterLinks",
            Self::ScrapeDetail(_) => "scrapeDetail",
        }
    }
}

/// What a stage produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "result", rename_all = "camelCase")]
pub enum StageOutput {
    ListWorlds(Option<Vec<WorldInfo>>),
    ListCharacterLinks(Option<Vec<CharacterPageLink>>),
    ScrapeDetail(CharacterDetail),
}

impl StageOutput {
    pub fn into_worlds(self) -> ZenyResult<Option<Vec<WorldInfo>>> {
        match self {
            Self::ListWorlds(w) => Ok(w),
            _ => Err(CrawlError::StageMismatch { stage: "listWorlds" }),
        }
    }

    pub fn into_links(self) -> ZenyResult<Option<Vec<CharacterPageLink>>> {
        match self {
            Self::ListCharacterLinks(l) => Ok(l),
            _ => Err(CrawlError::StageMismatch {
                stage: "listCharacterLinks",
            }),
        }
    }

    pub fn into_detail(self) -> ZenyResult<CharacterDetail> {
        match self {
            Self::ScrapeDetail(d) => Ok(d),
            _ => Err(CrawlError::StageMismatch {
                stage: "scrapeDetail",
            }),
        }
    }
}

/// Executes scraper stages in the context of the page the user has open.
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    /// URL of the page the stages run against.
    async fn active_url(&self) -> ZenyResult<String>;
    /// Run one stage and return its output.
    async fn evaluate(&self, stage: Stage) -> ZenyResult<StageOutput>;
}

/// [`BrowserAutomation`] that runs the built-in [`PageScraper`] over a transport.
pub struct ScraperAutomation<T: PageTransport> {
    scraper: PageScraper,
    transport: T,
}

impl<T: PageTransport> ScraperAutomation<T> {
    pub fn new(scraper: PageScraper, transport: T) -> Self {
        Self { scraper, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: PageTransport> BrowserAutomation for ScraperAutomation<T> {
    async fn active_url(&self) -> ZenyResult<String> {
        self.transport.active_url().await
    }

    async fn evaluate(&self, stage: Stage) -> ZenyResult<StageOutput> {
        tracing::debug!("evaluating stage {}", stage.id());
        match stage {
            Stage::ListWorlds => Ok(StageOutput::ListWorlds(
                self.scraper.list_worlds(&self.transport).await?,
            )),
            Stage::ListCharacterLinks(world) => Ok(StageOutput::ListCharacterLinks(
                self.scraper
                    .list_character_links(&self.transport, &world)
                    .await?,
            )),
            Stage::ScrapeDetail(link) => Ok(StageOutput::ScrapeDetail(
                self.scraper.scrape_detail(&self.transport, &link).await,
            )),
        }
    }
}
