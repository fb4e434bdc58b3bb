//! # Text Processing Module
//!
//! Helpers for turning free-form chat input into item names and event dates.
//!
//! ## Features
//!
//! - Name normalization: trimming, whitespace collapsing and lower-casing, so
//!   "Red  Chair" and "red chair" address the same item
//! - Multi-line item input, one item per line
//! - Event dates as `DD.MM.YYYY`, `DD.MM`, `DD month [YYYY]` (Russian or
//!   English month names) and relative words like "завтра"

use chrono::{Datelike, Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Maximum length (in characters) of an item, recipient or event name
pub const MAX_NAME_LENGTH: usize = 100;

lazy_static! {
    static ref NUMERIC_DATE: Regex = Regex::new(r"^(\d{1,2})[./-](\d{1,2})(?:[./-](\d{2}|\d{4}))?$")
        .expect("Numeric date pattern should be valid");
    static ref WORD_DATE: Regex =
        Regex::new(r"^(\d{1,2})\s+([a-zа-яё]+)\.?(?:\s+(\d{4}))?(?:\s*(?:г|года?)\.?)?$")
            .expect("Word date pattern should be valid");
}

/// Month name prefixes, checked in order
const MONTH_PREFIXES: &[(&str, u32)] = &[
    ("янв", 1),
    ("фев", 2),
    ("мар", 3),
    ("апр", 4),
    ("ма", 5),
    ("июн", 6),
    ("июл", 7),
    ("авг", 8),
    ("сен", 9),
    ("окт", 10),
    ("ноя", 11),
    ("дек", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Trim, collapse inner whitespace and lower-case
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Trim and collapse inner whitespace, keeping the original case
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Validates a name typed by the user and returns its display form.
///
/// Errors are localization keys.
pub fn validate_name(name: &str) -> Result<String, &'static str> {
    let collapsed = collapse_whitespace(name);

    if collapsed.is_empty() {
        return Err("name-empty");
    }

    if collapsed.chars().count() > MAX_NAME_LENGTH {
        return Err("name-too-long");
    }

    Ok(collapsed)
}

/// Split a message into item names, one per non-empty line.
///
/// Lines that normalize to the same name are kept once, first spelling wins.
pub fn split_item_lines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for line in text.lines() {
        let name = collapse_whitespace(line);
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            names.push(name);
        }
    }

    trace!(lines = names.len(), "Split item input into lines");
    names
}

fn month_from_word(word: &str) -> Option<u32> {
    MONTH_PREFIXES
        .iter()
        .find(|(prefix, _)| word.starts_with(prefix))
        .map(|(_, month)| *month)
}

fn expand_year(raw: &str) -> Option<i32> {
    let year: i32 = raw.parse().ok()?;
    if raw.len() == 2 {
        Some(2000 + year)
    } else {
        Some(year)
    }
}

/// Date for a day and month without a year: this year, or the next year that
/// has that day once it has passed.
fn upcoming_date(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
        if date >= today {
            return Some(date);
        }
    }
    // 29.02 may be up to eight years away (2096 -> 2104)
    (today.year() + 1..=today.year() + 8)
        .find_map(|year| NaiveDate::from_ymd_opt(year, month, day))
}

/// Parse an event date typed by the user
pub fn parse_event_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = normalize_text(input);

    let relative = match text.as_str() {
        "сегодня" | "today" => Some(0),
        "завтра" | "tomorrow" => Some(1),
        "послезавтра" | "day after tomorrow" => Some(2),
        _ => None,
    };
    if let Some(days) = relative {
        return Some(today + Duration::days(days));
    }

    if let Some(caps) = NUMERIC_DATE.captures(&text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        return match caps.get(3) {
            Some(year) => NaiveDate::from_ymd_opt(expand_year(year.as_str())?, month, day),
            None => upcoming_date(day, month, today),
        };
    }

    if let Some(caps) = WORD_DATE.captures(&text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_from_word(&caps[2])?;
        return match caps.get(3) {
            Some(year) => NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, day),
            None => upcoming_date(day, month, today),
        };
    }

    debug!(input = %text, "Could not parse event date");
    None
}

/// Format a date the way users type it
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Red   Chair "), "red chair");
        assert_eq!(normalize_text("Красный\tСтул"), "красный стул");
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Big   tent ").unwrap(), "Big tent");
        assert_eq!(validate_name("   "), Err("name-empty"));
        assert_eq!(validate_name(&"я".repeat(101)), Err("name-too-long"));
        assert!(validate_name(&"я".repeat(100)).is_ok());
    }

    #[test]
    fn test_split_item_lines_dedupes() {
        let names = split_item_lines("Палатка\n\n  палатка \nКотелок");
        assert_eq!(names, vec!["Палатка".to_string(), "Котелок".to_string()]);
    }

    #[test]
    fn test_month_prefixes() {
        assert_eq!(month_from_word("марта"), Some(3));
        assert_eq!(month_from_word("мая"), Some(5));
        assert_eq!(month_from_word("май"), Some(5));
        assert_eq!(month_from_word("september"), Some(9));
        assert_eq!(month_from_word("foo"), None);
    }

    #[test]
    fn test_upcoming_date_rolls_over() {
        assert_eq!(
            upcoming_date(1, 3, today()),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(
            upcoming_date(15, 6, today()),
            NaiveDate::from_ymd_opt(2025, 6, 15)
        );
        assert_eq!(
            upcoming_date(29, 2, today()),
            NaiveDate::from_ymd_opt(2028, 2, 29)
        );
        assert_eq!(upcoming_date(30, 2, today()), None);
    }
}
