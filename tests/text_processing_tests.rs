//! # Text Processing Tests
//!
//! Event date parsing and item name handling as users actually type them.

use chrono::NaiveDate;
use inventory_bot::text_processing::{
    format_date, normalize_text, parse_event_date, split_item_lines, validate_name,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 6, 15)
}

#[test]
fn test_parse_full_numeric_dates() {
    assert_eq!(parse_event_date("20.06.2025", today()), Some(date(2025, 6, 20)));
    assert_eq!(parse_event_date("1/7/2025", today()), Some(date(2025, 7, 1)));
    assert_eq!(parse_event_date("05-09-26", today()), Some(date(2026, 9, 5)));
}

#[test]
fn test_parse_date_without_year() {
    // Still ahead this year
    assert_eq!(parse_event_date("20.06", today()), Some(date(2025, 6, 20)));
    // Already passed: next year
    assert_eq!(parse_event_date("10.06", today()), Some(date(2026, 6, 10)));
    // Leap day waits for the next leap year
    assert_eq!(parse_event_date("29.02", today()), Some(date(2028, 2, 29)));
    assert_eq!(parse_event_date("29 февраля", today()), Some(date(2028, 2, 29)));
}

#[test]
fn test_parse_month_names() {
    assert_eq!(parse_event_date("15 марта", today()), Some(date(2026, 3, 15)));
    assert_eq!(
        parse_event_date("1 сентября 2025", today()),
        Some(date(2025, 9, 1))
    );
    assert_eq!(parse_event_date("3 July", today()), Some(date(2025, 7, 3)));
    assert_eq!(parse_event_date("  7   Dec  ", today()), Some(date(2025, 12, 7)));
}

#[test]
fn test_parse_relative_words() {
    assert_eq!(parse_event_date("Сегодня", today()), Some(today()));
    assert_eq!(parse_event_date("завтра", today()), Some(date(2025, 6, 16)));
    assert_eq!(parse_event_date("послезавтра", today()), Some(date(2025, 6, 17)));
    assert_eq!(parse_event_date("tomorrow", today()), Some(date(2025, 6, 16)));
    assert_eq!(
        parse_event_date("Day after  tomorrow", today()),
        Some(date(2025, 6, 17))
    );
}

#[test]
fn test_parse_rejects_invalid_dates() {
    assert_eq!(parse_event_date("31.02.2025", today()), None);
    assert_eq!(parse_event_date("32.01", today()), None);
    assert_eq!(parse_event_date("15 foo", today()), None);
    assert_eq!(parse_event_date("next friday", today()), None);
    assert_eq!(parse_event_date("", today()), None);
}

#[test]
fn test_format_date() {
    assert_eq!(format_date(date(2025, 3, 5)), "05.03.2025");
}

#[test]
fn test_item_names() {
    assert_eq!(normalize_text("\tGas  STOVE\n"), "gas stove");
    assert_eq!(
        split_item_lines("Tent\r\nStove\n\n   \nTENT"),
        vec!["Tent".to_string(), "Stove".to_string()]
    );
    assert!(validate_name("Tent").is_ok());
    assert!(validate_name("").is_err());
}
