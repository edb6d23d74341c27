//! Text and JSON output for the CLI.

use serde_json::{json, Value};
use zeny_crawler::format::{format_full, format_timestamp};
use zeny_crawler::{CooldownStatus, CrawlEvent, Rendering};

fn last_run_line(last_run_ms: Option<i64>) -> String {
    match last_run_ms {
        Some(ms) => format!("Last run: {}", format_timestamp(ms)),
        None => "Last run: never".to_string(),
    }
}

/// The stored result as text, preceded by the last-run time.
pub fn rendering_text(rendering: &Rendering, last_run_ms: Option<i64>) -> String {
    let mut out = last_run_line(last_run_ms);
    out.push('\n');
    out.push_str(&rendering.to_string());
    if rendering.groups.len() > 1 {
        out.push_str(&format!("Grand total: {}\n", format_full(rendering.grand_total())));
    }
    out
}

pub fn rendering_json(rendering: &Rendering, last_run_ms: Option<i64>) -> Value {
    json!({
        "last_run": last_run_ms,
        "last_run_display": last_run_ms.map(format_timestamp),
        "mode": rendering.mode,
        "grand_total": rendering.grand_total(),
        "worlds": rendering.groups.iter().map(|g| json!({
            "value": g.world.value,
            "text": g.world.text,
            "total": g.total.value,
            "total_display": g.total.text(),
            "characters": g.entries.iter().map(|e| json!({
                "name": e.character_name,
                "zeny": e.amount.value(),
                "display": e.amount.text(),
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
}

pub fn status_text(status: CooldownStatus, last_run_ms: Option<i64>) -> String {
    format!("{}\n{}\n", status.status_message(), last_run_line(last_run_ms))
}

pub fn status_json(status: CooldownStatus, last_run_ms: Option<i64>) -> Value {
    let remaining_ms = match status {
        CooldownStatus::Ready => 0,
        CooldownStatus::Cooling { remaining_ms } => remaining_ms,
    };
    json!({
        "ready": status.is_ready(),
        "remaining_ms": remaining_ms,
        "message": status.status_message(),
        "last_run": last_run_ms,
    })
}

/// One progress line, as text or a JSON object.
pub fn progress_line(event: &CrawlEvent, as_json: bool) -> String {
    if as_json {
        serde_json::to_string(event).unwrap_or_else(|_| event.kind.status_message())
    } else {
        event.kind.status_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeny_crawler::format::render;
    use zeny_crawler::{
        CharacterDetail, CharacterPageLink, CrawlEventKind, CrawlResult, DisplayPreference,
        WorldInfo,
    };

    fn sample() -> CrawlResult {
        let alpha = WorldInfo::new("1", "Alpha");
        let beta = WorldInfo::new("2", "Beta");
        vec![
            CharacterDetail::scraped(CharacterPageLink::new(alpha.clone(), "a1"), "Poring", "12,345 Zeny"),
            CharacterDetail::scraped(CharacterPageLink::new(alpha, "a2"), "Drops", "655 Zeny"),
            CharacterDetail::failed(CharacterPageLink::new(beta, "b1")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rendering_text_lists_worlds() {
        let text = rendering_text(&render(&sample(), DisplayPreference::Full), None);
        assert_eq!(
            text,
            "Last run: never\n\
             Alpha (total: 13,000 Zeny)\n  - Poring (12,345 Zeny)\n  - Drops (655 Zeny)\n\
             Beta (total: 0 Zeny)\n  - unavailable (unavailable)\n\
             Grand total: 13,000 Zeny\n"
        );
    }

    #[test]
    fn test_empty_rendering_says_no_data() {
        let text = rendering_text(&render(&CrawlResult::default(), DisplayPreference::Full), None);
        assert_eq!(text, "Last run: never\nNo data\n");
    }

    #[test]
    fn test_rendering_json_short_mode() {
        let value = rendering_json(&render(&sample(), DisplayPreference::Short), Some(0));
        assert_eq!(value["mode"], "short");
        assert_eq!(value["grand_total"], 13_000);
        assert_eq!(value["worlds"][0]["total_display"], "13K Zeny");
        assert_eq!(value["worlds"][0]["characters"][1]["display"], "655 Zeny");
        assert_eq!(value["worlds"][1]["characters"][0]["zeny"], 0);
    }

    #[test]
    fn test_status_json() {
        let value = status_json(CooldownStatus::Cooling { remaining_ms: 61_000 }, Some(5));
        assert_eq!(value["ready"], false);
        assert_eq!(value["message"], "Next run allowed in 1m 1s");
        assert_eq!(value["last_run"], 5);
        assert_eq!(status_json(CooldownStatus::Ready, None)["remaining_ms"], 0);
    }

    #[test]
    fn test_progress_line() {
        let event = CrawlEvent {
            run_id: "r".to_string(),
            seq: 1,
            kind: CrawlEventKind::WorldsDiscovered { count: 3 },
        };
        assert_eq!(progress_line(&event, false), "Found 3 world(s)");
        assert!(progress_line(&event, true).contains(r#""type":"WorldsDiscovered""#));
    }
}
