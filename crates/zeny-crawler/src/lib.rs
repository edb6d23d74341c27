//! zeny-crawler: collects per-character Zeny holdings from the Ragnarok Online
//! web tool, one world at a time, behind a five-minute cooldown.

pub mod automation;
pub mod config;
pub mod cooldown;
pub mod format;
pub mod orchestrator;
pub mod progress;
pub mod scraper;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use automation::{BrowserAutomation, ScraperAutomation, Stage, StageOutput};
pub use config::{CrawlConfig, SelectorProfile};
pub use cooldown::{CooldownGate, CooldownStatus};
pub use format::{format_full, format_short, format_timestamp, parse_zeny, render, Rendering};
pub use orchestrator::{CrawlOrchestrator, CrawlOutcome};
pub use progress::{CrawlEvent, CrawlEventKind};
pub use scraper::PageScraper;
pub use session::{Clock, CrawlSession, SystemClock};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore, ResultStore};
pub use transport::{ChromiumTransport, FetchedPage, HttpTransport, PageTransport};
pub use types::*;
