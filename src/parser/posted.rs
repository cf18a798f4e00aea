use std::sync::LazyLock;

use chrono::{Duration, Local, NaiveDate};
use regex::Regex;

static LEADING_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d+)").unwrap());

/// Older postings are left as the site phrased them.
const MAX_DAYS_AGO: i64 = 6;

/// Turn a relative "posted" phrase into a calendar date like "19 October".
/// Phrases that can't be resolved come back unchanged.
pub fn normalize(raw: &str) -> String {
    normalize_on(raw, Local::now().date_naive())
}

pub fn normalize_on(raw: &str, today: NaiveDate) -> String {
    let phrase = raw.to_lowercase();

    if phrase.contains("hour") || phrase.contains("minute") {
        return format_day(today);
    }

    if phrase.contains("day") {
        let days = LEADING_NUMBER_RE
            .captures(&phrase)
            .and_then(|caps| caps[1].parse::<i64>().ok());
        if let Some(n) = days.filter(|n| (1..=MAX_DAYS_AGO).contains(n)) {
            if let Some(date) = today.checked_sub_signed(Duration::days(n)) {
                return format_day(date);
            }
        }
    }

    raw.to_string()
}

fn format_day(date: NaiveDate) -> String {
    date.format("%-d %B").to_string()
}
