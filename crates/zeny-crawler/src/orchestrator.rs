//! Crawl orchestrator: drives the scraper stages world by world, character by
//! character, strictly in sequence.
//!
//! Stage failures that the stages absorb themselves (a world with no links, a
//! character page that failed to load) never stop the run. Errors returned by
//! the automation layer do, and propagate to the caller untouched.

use crate::automation::{BrowserAutomation, Stage};
use crate::progress::{self, CrawlEventKind, ProgressSender};
use crate::types::{CrawlError, CrawlResult, ZenyResult};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Every world was visited; the result may be empty.
    Completed(CrawlResult),
    /// The open page offered no worlds. Nothing was collected.
    NoWorlds,
}

/// Sequential multi-stage crawl over one page context.
pub struct CrawlOrchestrator<'a> {
    automation: &'a dyn BrowserAutomation,
    progress: Option<ProgressSender>,
    run_id: String,
    seq: u64,
}

impl<'a> CrawlOrchestrator<'a> {
    pub fn new(automation: &'a dyn BrowserAutomation) -> Self {
        Self {
            automation,
            progress: None,
            run_id: uuid::Uuid::new_v4().to_string(),
            seq: 0,
        }
    }

    /// Report progress on `tx`.
    pub fn with_progress(mut self, tx: Option<ProgressSender>) -> Self {
        self.progress = tx;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn emit(&mut self, kind: CrawlEventKind) {
        progress::emit(&self.progress, &self.run_id, &mut self.seq, kind);
    }

    /// Collect every character of every world.
    pub async fn run(&mut self) -> ZenyResult<CrawlOutcome> {
        match self.collect().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.report_failure(&e);
                Err(e)
            }
        }
    }

    /// Report an error that ended this run, including one raised after
    /// collection finished.
    pub fn report_failure(&mut self, error: &CrawlError) {
        tracing::error!("crawl {} failed: {error}", self.run_id);
        self.emit(CrawlEventKind::RunFailed {
            message: error.to_string(),
        });
    }

    async fn collect(&mut self) -> ZenyResult<CrawlOutcome> {
        tracing::info!("crawl {} started", self.run_id);
        self.emit(CrawlEventKind::RunStarted);

        let worlds = self.automation.evaluate(Stage::ListWorlds).await?.into_worlds()?;
        let worlds = match worlds {
            Some(w) if !w.is_empty() => w,
            Some(_) => {
                self.emit(CrawlEventKind::RunAborted {
                    reason: "No worlds to collect were found".to_string(),
                });
                return Ok(CrawlOutcome::NoWorlds);
            }
            None => {
                self.emit(CrawlEventKind::RunAborted {
                    reason: "Failed to read the world list".to_string(),
                });
                return Ok(CrawlOutcome::NoWorlds);
            }
        };
        self.emit(CrawlEventKind::WorldsDiscovered {
            count: worlds.len(),
        });

        let mut result = CrawlResult::default();

        for world in worlds {
            self.emit(CrawlEventKind::WorldStarted {
                world: world.text.clone(),
            });

            let links = self
                .automation
                .evaluate(Stage::ListCharacterLinks(world.clone()))
                .await?
                .into_links()?;

            let Some(links) = links else {
                tracing::info!("skipping world {} ({})", world.text, world.value);
                self.emit(CrawlEventKind::WorldSkipped {
                    world: world.text.clone(),
                });
                continue;
            };

            for link in links {
                self.emit(CrawlEventKind::CharacterFetching {
                    world: link.world.text.clone(),
                    url: link.href.clone(),
                });

                let detail = self
                    .automation
                    .evaluate(Stage::ScrapeDetail(link))
                    .await?
                    .into_detail()?;

                self.emit(CrawlEventKind::CharacterScraped {
                    world: detail.world().text.clone(),
                    failed: detail.is_failure(),
                });
                result.push(detail);
            }
        }

        tracing::info!("crawl {} finished with {} entries", self.run_id, result.len());
        self.emit(CrawlEventKind::RunCompleted {
            entries: result.len(),
        });
        Ok(CrawlOutcome::Completed(result))
    }
}
