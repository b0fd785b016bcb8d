//! Clock-time helpers: minutes since midnight, display labels and day names.

use chrono::Weekday;
use regex::Regex;
use std::sync::LazyLock;

const DAY_ABBREVS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

static CLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*([AaPp][Mm])?\s*$").unwrap()
});

/// Formats minutes since midnight as a 12-hour label.
///
/// `600` becomes `"10:00 AM"`, `810` becomes `"1:30 PM"`.
pub fn format_minutes(minutes: i32) -> String {
    let h = (minutes / 60).rem_euclid(24);
    let m = minutes.rem_euclid(60);
    let ampm = if h >= 12 { "PM" } else { "AM" };
    let h12 = if h % 12 == 0 { 12 } else { h % 12 };
    format!("{}:{:02} {}", h12, m, ampm)
}

/// Parses `"9:00 AM"`, `"12:15 pm"` or 24-hour `"13:30"` into minutes since midnight.
pub fn parse_clock(text: &str) -> Option<i32> {
    let caps = CLOCK_REGEX.captures(text)?;
    let mut hours: i32 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: i32 = caps.get(2)?.as_str().parse().ok()?;
    if minutes >= 60 {
        return None;
    }

    match caps.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(modifier) => {
            if !(1..=12).contains(&hours) {
                return None;
            }
            if hours == 12 {
                hours = 0;
            }
            if modifier == "PM" {
                hours += 12;
            }
        }
        None if hours > 24 || (hours == 24 && minutes > 0) => return None,
        None => {}
    }

    Some(hours * 60 + minutes)
}

/// Parses Banner's four-digit `HHMM` times: `"1330"` becomes `810`.
pub fn parse_hhmm(text: &str) -> Option<i32> {
    if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hh: i32 = text[..2].parse().ok()?;
    let mm: i32 = text[2..].parse().ok()?;
    if hh > 24 || mm >= 60 {
        return None;
    }
    Some(hh * 60 + mm)
}

/// Three-letter day name for a 0 (Sunday) ..= 6 (Saturday) index.
pub fn day_abbrev(day: u8) -> &'static str {
    DAY_ABBREVS.get(day as usize).copied().unwrap_or("???")
}

pub fn weekday_from_index(day: u8) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Monday through Friday.
pub fn school_week() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(600), "10:00 AM");
        assert_eq!(format_minutes(0), "12:00 AM");
        assert_eq!(format_minutes(720), "12:00 PM");
        assert_eq!(format_minutes(810), "1:30 PM");
        assert_eq!(format_minutes(1439), "11:59 PM");
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("9:00 AM"), Some(540));
        assert_eq!(parse_clock("12:00 AM"), Some(0));
        assert_eq!(parse_clock("12:30 pm"), Some(750));
        assert_eq!(parse_clock("1:30PM"), Some(810));
        assert_eq!(parse_clock("13:30"), Some(810));
        assert_eq!(parse_clock("13:30 PM"), None);
        assert_eq!(parse_clock("9:75 AM"), None);
        assert_eq!(parse_clock("noon"), None);
    }

    #[test]
    fn test_parse_hhmm() {
        assert_eq!(parse_hhmm("1330"), Some(810));
        assert_eq!(parse_hhmm("0800"), Some(480));
        assert_eq!(parse_hhmm("800"), None);
        assert_eq!(parse_hhmm("12a0"), None);
    }

    #[test]
    fn test_day_names() {
        assert_eq!(day_abbrev(1), "Mon");
        assert_eq!(day_abbrev(6), "Sat");
        assert_eq!(weekday_from_index(0), Some(Weekday::Sun));
        assert_eq!(weekday_from_index(5), Some(Weekday::Fri));
        assert_eq!(weekday_from_index(9), None);
    }
}
