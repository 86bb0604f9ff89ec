use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Weekday};
use thiserror::Error;

/// A date string that matched none of the known feed timestamp layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized timestamp: {raw:?}")]
pub struct TimeParseError {
    /// The string exactly as the feed supplied it
    pub raw: String,
}

/// How a layout opens with a day-of-week token.
#[derive(Debug, Clone, Copy)]
enum LeadingWeekday {
    None,
    /// `Mon Jan ...`
    Bare,
    /// `Mon, 02 ...` or `Monday, 02-...`
    Comma,
}

/// Where a layout carries its zone.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// No zone at all; the time is read as UTC.
    None,
    /// A numeric offset parsed by the chrono format itself (`%z`, `%#z`).
    Numeric,
    /// An alphabetic abbreviation in the n-th whitespace token from the end (0 = last).
    Named { from_end: usize },
}

struct Layout {
    name: &'static str,
    weekday: LeadingWeekday,
    zone: Zone,
    /// chrono format for what remains after the weekday and named zone are removed
    format: &'static str,
    /// Format reads the year as `%y`
    two_digit_year: bool,
}

/// First two-digit year read as 19xx rather than 20xx.
const TWO_DIGIT_YEAR_PIVOT: i32 = 69;

/// Known layouts, tried in order. The first one that parses wins.
const LAYOUT_TABLE: &[Layout] = &[
    Layout {
        name: "RFC822",
        weekday: LeadingWeekday::None,
        zone: Zone::Named { from_end: 0 },
        format: "%d %b %y %H:%M",
        two_digit_year: true,
    },
    Layout {
        name: "RFC822Z",
        weekday: LeadingWeekday::None,
        zone: Zone::Numeric,
        format: "%d %b %y %H:%M %z",
        two_digit_year: true,
    },
    Layout {
        name: "RFC850",
        weekday: LeadingWeekday::Comma,
        zone: Zone::Named { from_end: 0 },
        format: "%d-%b-%y %H:%M:%S",
        two_digit_year: true,
    },
    Layout {
        name: "RFC1123",
        weekday: LeadingWeekday::Comma,
        zone: Zone::Named { from_end: 0 },
        format: "%d %b %Y %H:%M:%S",
        two_digit_year: false,
    },
    Layout {
        name: "RFC1123Z",
        weekday: LeadingWeekday::Comma,
        zone: Zone::Numeric,
        format: "%d %b %Y %H:%M:%S %z",
        two_digit_year: false,
    },
    Layout {
        name: "RFC3339",
        weekday: LeadingWeekday::None,
        zone: Zone::Numeric,
        format: "%Y-%m-%dT%H:%M:%S%#z",
        two_digit_year: false,
    },
    Layout {
        name: "RFC3339Nano",
        weekday: LeadingWeekday::None,
        zone: Zone::Numeric,
        format: "%Y-%m-%dT%H:%M:%S%.f%#z",
        two_digit_year: false,
    },
    Layout {
        name: "ANSIC",
        weekday: LeadingWeekday::Bare,
        zone: Zone::None,
        format: "%b %e %H:%M:%S %Y",
        two_digit_year: false,
    },
    Layout {
        name: "UnixDate",
        weekday: LeadingWeekday::Bare,
        zone: Zone::Named { from_end: 1 },
        format: "%b %e %H:%M:%S %Y",
        two_digit_year: false,
    },
    Layout {
        name: "RubyDate",
        weekday: LeadingWeekday::Bare,
        zone: Zone::Numeric,
        format: "%b %d %H:%M:%S %z %Y",
        two_digit_year: false,
    },
    Layout {
        name: "Layout",
        weekday: LeadingWeekday::None,
        zone: Zone::Numeric,
        format: "%m/%d %I:%M:%S%p '%y %z",
        two_digit_year: true,
    },
];

/// Names of the recognized layouts in the order they are tried.
pub const LAYOUTS: [&str; 11] = [
    "RFC822",
    "RFC822Z",
    "RFC850",
    "RFC1123",
    "RFC1123Z",
    "RFC3339",
    "RFC3339Nano",
    "ANSIC",
    "UnixDate",
    "RubyDate",
    "Layout",
];

/// Parses a feed-supplied date string into a timestamp.
///
/// Layouts are tried in [`LAYOUTS`] order and the first successful parse is
/// returned, so a string compatible with two layouts resolves to the earlier
/// one. The declared offset is preserved on the returned value.
///
/// Runs of whitespace are collapsed before matching. Weekday names must be
/// real weekday names but are not checked against the date itself.
///
/// # Errors
///
/// Returns [`TimeParseError`] carrying the original string when no layout
/// matches. There is no fallback value.
///
/// # Examples
///
/// ```
/// use feedfold::util::parse_timestamp;
///
/// let ts = parse_timestamp("Mon, 02 Jan 2006 15:04:05 -0700").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2006-01-02T15:04:05-07:00");
///
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, TimeParseError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();

    for layout in LAYOUT_TABLE {
        if let Some(parsed) = try_layout(layout, &tokens) {
            tracing::trace!(raw = %raw, layout = layout.name, "Parsed timestamp");
            return Ok(parsed);
        }
    }

    Err(TimeParseError {
        raw: raw.to_string(),
    })
}

fn try_layout(layout: &Layout, tokens: &[&str]) -> Option<DateTime<FixedOffset>> {
    let mut tokens = tokens.to_vec();

    match layout.weekday {
        LeadingWeekday::None => {}
        LeadingWeekday::Bare => {
            let first = tokens.first()?;
            if first.ends_with(',') || first.parse::<Weekday>().is_err() {
                return None;
            }
            tokens.remove(0);
        }
        LeadingWeekday::Comma => {
            let name = tokens.first()?.strip_suffix(',')?;
            name.parse::<Weekday>().ok()?;
            tokens.remove(0);
        }
    }

    let named_offset = match layout.zone {
        Zone::Named { from_end } => {
            let idx = tokens.len().checked_sub(from_end + 1)?;
            let offset = zone_offset(tokens[idx])?;
            tokens.remove(idx);
            Some(offset)
        }
        _ => None,
    };

    let rest = tokens.join(" ");

    let parsed = match layout.zone {
        Zone::Numeric => DateTime::parse_from_str(&rest, layout.format).ok(),
        Zone::Named { .. } => {
            let naive = NaiveDateTime::parse_from_str(&rest, layout.format).ok()?;
            named_offset?.from_local_datetime(&naive).single()
        }
        Zone::None => {
            let naive = NaiveDateTime::parse_from_str(&rest, layout.format).ok()?;
            Some(FixedOffset::east_opt(0)?.from_utc_datetime(&naive))
        }
    }?;

    if layout.two_digit_year {
        return Some(into_twentieth_century(parsed));
    }
    Some(parsed)
}

/// chrono reads `%y` values below 70 as 20xx. Years from the pivot up are
/// moved back a century so `69` means 1969.
fn into_twentieth_century(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let year = ts.year();
    if year >= 2000 + TWO_DIGIT_YEAR_PIVOT {
        ts.with_year(year - 100).unwrap_or(ts)
    } else {
        ts
    }
}

/// Resolves a zone abbreviation to a fixed offset.
///
/// The RFC 822 zones map to their defined offsets. Any other purely alphabetic
/// abbreviation is accepted at zero offset. Anything else is not a zone name.
fn zone_offset(token: &str) -> Option<FixedOffset> {
    if token.is_empty() || token.len() > 5 || !token.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }

    let hours = match token {
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        // UT, UTC, GMT, Z and unknown abbreviations
        _ => 0,
    };

    FixedOffset::east_opt(hours * 3600)
}
