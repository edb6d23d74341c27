//! Rendering of crawl results: per-world grouping, totals and amount display.
//!
//! Amounts arrive as page text such as `"12,345 Zeny"`. Parsing strips
//! thousands separators and the unit, then reads a leading integer. Entries
//! that do not parse (placeholders, sentinels) add nothing to a total but are
//! still listed with their raw text.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Local, TimeZone};
use regex::Regex;
use serde::Serialize;

use crate::types::{CrawlResult, DisplayPreference, WorldInfo};

const UNIT: &str = "Zeny";
const UNKNOWN_CHARACTER: &str = "unknown character";
const NO_DATA: &str = "No data";

fn unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*zeny").expect("unit regex is valid"))
}

fn leading_int_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").expect("integer regex is valid"))
}

/// Parse a zeny amount as shown on a character page.
///
/// `None` when no leading integer remains after stripping `,` and the unit.
pub fn parse_zeny(text: &str) -> Option<i64> {
    let without_commas = text.replace(',', "");
    let cleaned = unit_regex().replacen(&without_commas, 1, "");
    leading_int_regex()
        .captures(&cleaned)
        .and_then(|c| c[1].parse::<i64>().ok())
}

/// `12345` → `"12,345"`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Every digit: `"1,500,000 Zeny"`.
pub fn format_full(value: i64) -> String {
    format!("{} {UNIT}", group_thousands(value))
}

/// Magnitude-abbreviated, truncated: `"1M Zeny"`. Below 1,000 same as [`format_full`].
pub fn format_short(value: i64) -> String {
    const G: i64 = 1_000_000_000;
    const M: i64 = 1_000_000;
    const K: i64 = 1_000;

    if value >= G {
        format!("{}G {UNIT}", value / G)
    } else if value >= M {
        format!("{}M {UNIT}", value / M)
    } else if value >= K {
        format!("{}K {UNIT}", value / K)
    } else {
        format_full(value)
    }
}

/// `YYYY/MM/DD HH:MM:SS` in local time.
pub fn format_timestamp(timestamp_ms: i64) -> String {
    format_timestamp_in(timestamp_ms, &Local)
}

/// `YYYY/MM/DD HH:MM:SS` in the given zone.
pub fn format_timestamp_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc.with_timezone(tz).format("%Y/%m/%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// A rendered amount.
///
/// In short mode the abbreviated text is shown until the amount gains focus;
/// focus reveals the full value and blur restores the abbreviation. In full
/// mode focus changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountView {
    pub value: i64,
    mode: DisplayPreference,
    focused: bool,
}

impl AmountView {
    pub fn new(value: i64, mode: DisplayPreference) -> Self {
        Self {
            value,
            mode,
            focused: false,
        }
    }

    /// Whether focus changes the displayed text.
    pub fn is_interactive(&self) -> bool {
        self.mode == DisplayPreference::Short
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Text currently displayed.
    pub fn text(&self) -> String {
        match (self.mode, self.focused) {
            (DisplayPreference::Short, false) => format_short(self.value),
            _ => format_full(self.value),
        }
    }

    /// Full-precision text regardless of focus.
    pub fn full_text(&self) -> String {
        format_full(self.value)
    }
}

impl fmt::Display for AmountView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// One character line under a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryLine {
    pub character_name: String,
    pub amount: EntryAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum EntryAmount {
    Parsed(AmountView),
    /// Raw page text that did not parse (placeholder or sentinel).
    Raw(String),
}

impl EntryAmount {
    pub fn text(&self) -> String {
        match self {
            Self::Parsed(view) => view.text(),
            Self::Raw(raw) => raw.clone(),
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            Self::Parsed(view) => view.value,
            Self::Raw(_) => 0,
        }
    }
}

/// All characters of one world, with their total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldGroup {
    pub world: WorldInfo,
    pub total: AmountView,
    pub entries: Vec<EntryLine>,
}

impl WorldGroup {
    pub fn total_value(&self) -> i64 {
        self.total.value
    }
}

/// A crawl result grouped and formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rendering {
    pub mode: DisplayPreference,
    pub groups: Vec<WorldGroup>,
}

impl Rendering {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn grand_total(&self) -> i64 {
        saturating_sum(self.groups.iter().map(WorldGroup::total_value))
    }

    pub fn group(&self, world_value: &str) -> Option<&WorldGroup> {
        self.groups.iter().find(|g| g.world.value == world_value)
    }
}

impl fmt::Display for Rendering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return writeln!(f, "{NO_DATA}");
        }
        for group in &self.groups {
            writeln!(f, "{} (total: {})", group.world.text, group.total)?;
            for entry in &group.entries {
                writeln!(f, "  - {} ({})", entry.character_name, entry.amount.text())?;
            }
        }
        Ok(())
    }
}

/// Sum of every parseable amount in `group`'s entries.
pub fn world_total(group: &WorldGroup) -> i64 {
    saturating_sum(group.entries.iter().map(|e| e.amount.value()))
}

/// Totals clamp at the `i64` bounds instead of overflowing.
fn saturating_sum(values: impl IntoIterator<Item = i64>) -> i64 {
    values.into_iter().fold(0i64, i64::saturating_add)
}

/// Group `result` by world (first-seen order) and format amounts for `mode`.
pub fn render(result: &CrawlResult, mode: DisplayPreference) -> Rendering {
    let mut groups: Vec<(WorldInfo, Vec<EntryLine>)> = Vec::new();

    for detail in result.iter() {
        let raw = detail.zeny.as_deref().unwrap_or("0");
        let amount = match parse_zeny(raw) {
            Some(value) => EntryAmount::Parsed(AmountView::new(value, mode)),
            None => EntryAmount::Raw(raw.to_string()),
        };
        let line = EntryLine {
            character_name: detail
                .character_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_CHARACTER.to_string()),
            amount,
        };

        match groups.iter_mut().find(|(w, _)| w.value == detail.world().value) {
            Some((_, lines)) => lines.push(line),
            None => groups.push((detail.world().clone(), vec![line])),
        }
    }

    let groups = groups
        .into_iter()
        .map(|(world, entries)| {
            let total = saturating_sum(entries.iter().map(|e| e.amount.value()));
            WorldGroup {
                world,
                total: AmountView::new(total, mode),
                entries,
            }
        })
        .collect();

    Rendering { mode, groups }
}
