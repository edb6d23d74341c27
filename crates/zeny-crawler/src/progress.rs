//! Crawl progress events and the broadcast channel carrying them.
//!
//! The orchestrator emits a `CrawlEvent` at every step. Events flow through a
//! `tokio::sync::broadcast` channel to any subscriber (CLI status line, log).
//! With no subscriber, events are dropped.

use serde::{Deserialize, Serialize};

/// Detail URLs longer than this are elided in status messages.
const URL_DISPLAY_MAX: usize = 60;
const URL_DISPLAY_HEAD: usize = 30;
const URL_DISPLAY_TAIL: usize = 25;

/// A progress event emitted during a crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub kind: CrawlEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrawlEventKind {
    RunStarted,
    WorldsDiscovered { count: usize },
    WorldStarted { world: String },
    WorldSkipped { world: String },
    CharacterFetching { world: String, url: String },
    CharacterScraped { world: String, failed: bool },
    RunCompleted { entries: usize },
    /// The open page offered no worlds; nothing was collected.
    RunAborted { reason: String },
    /// An unexpected error ended the run.
    RunFailed { message: String },
}

impl CrawlEventKind {
    /// User-facing status line for this event.
    pub fn status_message(&self) -> String {
        match self {
            Self::RunStarted => "Fetching the world list from the open page...".to_string(),
            Self::WorldsDiscovered { count } => format!("Found {count} world(s)"),
            Self::WorldStarted { world } => format!("Collecting character links for {world}..."),
            Self::WorldSkipped { world } => format!("No characters collected for {world}"),
            Self::CharacterFetching { world, url } => {
                format!("{world} - fetching {}...", shorten_url(url))
            }
            Self::CharacterScraped { world, failed: true } => {
                format!("{world} - character page unavailable")
            }
            Self::CharacterScraped { world, failed: false } => format!("{world} - character read"),
            Self::RunCompleted { entries: 0 } => "Finished (no characters found)".to_string(),
            Self::RunCompleted { entries } => format!("Finished: {entries} character(s)"),
            Self::RunAborted { reason } => reason.clone(),
            Self::RunFailed { message } => format!("Error: {message}"),
        }
    }
}

/// Elide the middle of long URLs: first 30 chars, `...`, last 25 chars.
pub fn shorten_url(url: &str) -> String {
    let chars: Vec<char> = url.chars().collect();
    if chars.len() <= URL_DISPLAY_MAX {
        return url.to_string();
    }
    let head: String = chars[..URL_DISPLAY_HEAD].iter().collect();
    let tail: String = chars[chars.len() - URL_DISPLAY_TAIL..].iter().collect();
    format!("{head}...{tail}")
}

pub type ProgressSender = tokio::sync::broadcast::Sender<CrawlEvent>;

pub type ProgressReceiver = tokio::sync::broadcast::Receiver<CrawlEvent>;

/// A run emits a handful of events per character; 256 covers a large account.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Emit a progress event, ignoring send errors (no receivers listening).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, kind: CrawlEventKind) {
    tracing::debug!("{}", kind.status_message());
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(CrawlEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = CrawlEvent {
            run_id: "run-1".to_string(),
            seq: 3,
            kind: CrawlEventKind::WorldsDiscovered { count: 4 },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("WorldsDiscovered"));

        let parsed: CrawlEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seq, 3);
    }

    #[test]
    fn test_shorten_url() {
        let short = "https://rowebtool.gungho.jp/character/1/42";
        assert_eq!(shorten_url(short), short);

        let long = format!("https://rowebtool.gungho.jp/character/{}", "9".repeat(60));
        let shown = shorten_url(&long);
        assert_eq!(shown.chars().count(), 30 + 3 + 25);
        assert!(shown.starts_with("https://rowebtool.gungho.jp/ch"));
        assert!(shown.ends_with(&"9".repeat(25)));
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(
            CrawlEventKind::RunCompleted { entries: 0 }.status_message(),
            "Finished (no characters found)"
        );
        assert_eq!(
            CrawlEventKind::RunFailed {
                message: "boom".to_string()
            }
            .status_message(),
            "Error: boom"
        );
    }

    #[test]
    fn test_emit_without_receivers() {
        let (tx, rx) = channel();
        drop(rx);
        let mut seq = 0;
        emit(&Some(tx), "run", &mut seq, CrawlEventKind::RunStarted);
        assert_eq!(seq, 1);
        emit(&None, "run", &mut seq, CrawlEventKind::RunStarted);
        assert_eq!(seq, 1);
    }
}
