// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// Zone abbreviations seen in podcast feeds that chrono's RFC 2822 parser rejects
const ZONE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("UTC", "+0000"),
    ("Z", "+0000"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
];

/// Parse an RSS date (`EEE, dd MMM yyyy HH:mm:ss z`) into UTC
///
/// Returns `None` when no known format matches.
pub fn parse_rss_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| parse_relaxed_date(trimmed))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse an RSS date, falling back to the current time
pub fn parse_rss_date_or_now(date_str: Option<&str>) -> DateTime<Utc> {
    date_str.and_then(parse_rss_date).unwrap_or_else(Utc::now)
}

/// Try to parse dates that don't strictly conform to RFC 2822
fn parse_relaxed_date(date_str: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    let normalized = replace_zone_abbreviation(date_str);

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%a, %d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];

    let mut last_err = None;
    for format in formats {
        match DateTime::parse_from_str(&normalized, format) {
            Ok(dt) => return Ok(dt),
            Err(e) => last_err = Some(e),
        }
    }

    // No zone at all: assume UTC
    for format in ["%a, %d %b %Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => DateTime::parse_from_rfc2822(date_str),
    }
}

fn replace_zone_abbreviation(date_str: &str) -> String {
    if let Some((head, zone)) = date_str.rsplit_once(' ') {
        for (abbr, offset) in ZONE_ABBREVIATIONS {
            if zone.eq_ignore_ascii_case(abbr) {
                return format!("{head} {offset}");
            }
        }
    }
    date_str.to_string()
}
