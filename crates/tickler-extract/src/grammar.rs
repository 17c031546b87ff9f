//! Natural-language date/time grammar.
//!
//! Recognizes a calendar part and a clock part independently and combines
//! them into a local wall-clock time:
//!
//! - dates: `tonight`, `day after tomorrow`, `[on|by] [this|next] friday`,
//!   `12/15[/2025]`, `Dec 15[, 2025]`, `15th of December`, `2025-12-15`,
//!   `in 3 days`, `in a week`, and `today`/`tomorrow` when a time is given
//! - times: `2pm`, `at 6:30 pm`, `at 18:30`, `noon`, `midnight`
//!
//! Ambiguous expressions are resolved forward from the reference time: a
//! weekday or clock time that has already passed moves to its next
//! occurrence, and a month/day without a year moves to next year.
//!
//! Bare `today`/`tomorrow` without a clock time are not claimed here so the
//! heuristic defaults apply to them.

use std::ops::Range;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TIME_MERIDIEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:at\s+)?(\d{1,2})(?::([0-5]\d))?\s*(am|pm)\b").expect("valid meridiem regex")
});
static TIME_24H_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bat\s+(\d{1,2}):([0-5]\d)\b").expect("valid 24h time regex"));
static TIME_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:at\s+)?(noon|midday|midnight)\b").expect("valid time word regex")
});

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:on|by|due)\s+)?(\d{4})-(\d{2})-(\d{2})\b").expect("valid iso date regex")
});
static DAY_AFTER_TOMORROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:by|due)\s+)?(?:the\s+)?day\s+after\s+tomorrow\b")
        .expect("valid day-after-tomorrow regex")
});
static RELATIVE_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:by|due)\s+)?(today|tomorrow|tonight)\b").expect("valid relative day regex")
});
static NUMERIC_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:on|by|due)\s+)?(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b")
        .expect("valid numeric date regex")
});
static MONTH_DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:on|by|due)\s+)?{MONTHS}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s+(\d{{4}}))?\b"
    ))
    .expect("valid month-day regex")
});
static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:on|by|due)\s+)?(?:the\s+)?(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTHS}\b(?:,?\s+(\d{{4}}))?"
    ))
    .expect("valid day-month regex")
});
static WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:on|by|due)\s+)?(?:(this|next|coming)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid weekday regex")
});
static OFFSET_DAYS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+(\d{1,3}|a|an|one|two|three|four|five|six|seven|eight|nine|ten)\s+(days?|weeks?)\b")
        .expect("valid day offset regex")
});

const MONTHS: &str =
    r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// Time of day used when a calendar date comes without a clock time.
const IMPLIED_TIME: (u32, u32) = (12, 0);
/// Time of day meant by "tonight".
const TONIGHT_TIME: (u32, u32) = (20, 0);
/// Years searched for a yearless month/day; covers the gap between leap years.
const YEARLESS_SEARCH: i32 = 8;

/// A successful grammar match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarMatch {
    /// Resolved local wall-clock time.
    pub local: NaiveDateTime,
    /// Byte ranges of the input that made up the expression.
    pub spans: Vec<Range<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateKind {
    /// `today`/`tomorrow`: only claimed together with a clock time.
    BareDay,
    /// `tonight`.
    Tonight,
    /// A date that is not re-resolved (explicit year, day after tomorrow).
    Exact,
    /// Month/day without a year.
    Yearless,
    /// Weekday name, optionally with `this`/`next`.
    Weekday,
    /// `in N days/weeks`; keeps the reference time of day.
    Offset,
}

#[derive(Debug)]
struct DateMatch {
    date: NaiveDate,
    kind: DateKind,
    span: Range<usize>,
}

#[derive(Debug)]
struct TimeMatch {
    time: NaiveTime,
    span: Range<usize>,
}

/// Parse the first date/time expression in `input`, relative to the local
/// wall-clock `reference`.
pub fn parse(input: &str, reference: NaiveDateTime) -> Option<GrammarMatch> {
    let date = find_date(input, reference.date());
    let time = find_time(input).filter(|t| match &date {
        Some(d) => !overlaps(&d.span, &t.span),
        None => true,
    });

    match (date, time) {
        (None, None) => None,
        (Some(d), None) if d.kind == DateKind::BareDay => None,
        (None, Some(t)) => {
            let mut local = reference.date().and_time(t.time);
            if local <= reference {
                local += Duration::days(1);
            }
            Some(GrammarMatch {
                local,
                spans: vec![t.span],
            })
        }
        (Some(d), t) => {
            let time = match &t {
                Some(t) => t.time,
                None => default_time(d.kind, reference.time()),
            };
            let mut local = d.date.and_time(time);

            match d.kind {
                DateKind::Weekday if local <= reference => local += Duration::days(7),
                DateKind::Yearless if local <= reference => {
                    local = (1..=YEARLESS_SEARCH).find_map(|n| local.with_year(local.year() + n))?;
                }
                _ => {}
            }

            let mut spans = vec![d.span];
            spans.extend(t.map(|t| t.span));
            Some(GrammarMatch { local, spans })
        }
    }
}

fn default_time(kind: DateKind, reference_time: NaiveTime) -> NaiveTime {
    match kind {
        DateKind::Offset => reference_time,
        DateKind::Tonight => hm(TONIGHT_TIME),
        _ => hm(IMPLIED_TIME),
    }
}

fn hm((h, m): (u32, u32)) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn find_date(input: &str, today: NaiveDate) -> Option<DateMatch> {
    iso_date(input)
        .or_else(|| day_after_tomorrow(input, today))
        .or_else(|| relative_day(input, today))
        .or_else(|| numeric_date(input, today))
        .or_else(|| month_day(input, today))
        .or_else(|| day_month(input, today))
        .or_else(|| weekday(input, today))
        .or_else(|| offset_days(input, today))
}

fn find_time(input: &str) -> Option<TimeMatch> {
    meridiem_time(input)
        .or_else(|| clock_time(input))
        .or_else(|| word_time(input))
}

fn span(caps: &Captures<'_>) -> Range<usize> {
    caps.get(0).map(|m| m.range()).unwrap_or(0..0)
}

fn num(caps: &Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn iso_date(input: &str) -> Option<DateMatch> {
    let caps = ISO_DATE_RE.captures(input)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, num(&caps, 2)?, num(&caps, 3)?)?;
    Some(DateMatch {
        date,
        kind: DateKind::Exact,
        span: span(&caps),
    })
}

fn day_after_tomorrow(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = DAY_AFTER_TOMORROW_RE.captures(input)?;
    Some(DateMatch {
        date: today.checked_add_days(Days::new(2))?,
        kind: DateKind::Exact,
        span: span(&caps),
    })
}

fn relative_day(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = RELATIVE_DAY_RE.captures(input)?;
    let word = caps.get(1)?.as_str().to_ascii_lowercase();
    let (date, kind) = match word.as_str() {
        "today" => (today, DateKind::BareDay),
        "tomorrow" => (today.succ_opt()?, DateKind::BareDay),
        _ => (today, DateKind::Tonight),
    };
    Some(DateMatch {
        date,
        kind,
        span: span(&caps),
    })
}

fn numeric_date(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = NUMERIC_DATE_RE.captures(input)?;
    let month = num(&caps, 1)?;
    let day = num(&caps, 2)?;

    let (date, kind) = match caps.get(3) {
        Some(y) => {
            let y: i32 = y.as_str().parse().ok()?;
            let year = if y < 100 { 2000 + y } else { y };
            (NaiveDate::from_ymd_opt(year, month, day)?, DateKind::Exact)
        }
        None => (yearless_date(today.year(), month, day)?, DateKind::Yearless),
    };

    Some(DateMatch {
        date,
        kind,
        span: span(&caps),
    })
}

fn month_day(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = MONTH_DAY_RE.captures(input)?;
    let month = month_number(caps.get(1)?.as_str())?;
    named_month_date(&caps, month, num(&caps, 2)?, caps.get(3).map(|m| m.as_str()), today)
}

fn day_month(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = DAY_MONTH_RE.captures(input)?;
    let month = month_number(caps.get(2)?.as_str())?;
    named_month_date(&caps, month, num(&caps, 1)?, caps.get(3).map(|m| m.as_str()), today)
}

fn named_month_date(
    caps: &Captures<'_>,
    month: u32,
    day: u32,
    year: Option<&str>,
    today: NaiveDate,
) -> Option<DateMatch> {
    let (date, kind) = match year {
        Some(y) => (NaiveDate::from_ymd_opt(y.parse().ok()?, month, day)?, DateKind::Exact),
        None => (yearless_date(today.year(), month, day)?, DateKind::Yearless),
    };
    Some(DateMatch {
        date,
        kind,
        span: span(caps),
    })
}

/// First occurrence of `month`/`day` from `year` on (Feb 29 skips to a leap year).
fn yearless_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (0..YEARLESS_SEARCH).find_map(|n| NaiveDate::from_ymd_opt(year + n, month, day))
}

fn weekday(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = WEEKDAY_RE.captures(input)?;
    let is_next = caps
        .get(1)
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("next"));
    let target = weekday_from_name(caps.get(2)?.as_str())?;

    let current = today.weekday().num_days_from_monday();
    let mut delta = (target.num_days_from_monday() + 7 - current) % 7;
    if delta == 0 && is_next {
        delta = 7;
    }

    Some(DateMatch {
        date: today.checked_add_days(Days::new(u64::from(delta)))?,
        kind: DateKind::Weekday,
        span: span(&caps),
    })
}

fn offset_days(input: &str, today: NaiveDate) -> Option<DateMatch> {
    let caps = OFFSET_DAYS_RE.captures(input)?;
    let count = count_word(caps.get(1)?.as_str())?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let days = if unit.starts_with("week") {
        count * 7
    } else {
        count
    };

    Some(DateMatch {
        date: today.checked_add_days(Days::new(days))?,
        kind: DateKind::Offset,
        span: span(&caps),
    })
}

fn meridiem_time(input: &str) -> Option<TimeMatch> {
    let caps = TIME_MERIDIEM_RE.captures(input)?;
    let hour = num(&caps, 1)?;
    let minute = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    if !(1..=12).contains(&hour) {
        return None;
    }

    let is_pm = caps.get(3)?.as_str().eq_ignore_ascii_case("pm");
    let hour = match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };

    Some(TimeMatch {
        time: NaiveTime::from_hms_opt(hour, minute, 0)?,
        span: span(&caps),
    })
}

fn clock_time(input: &str) -> Option<TimeMatch> {
    let caps = TIME_24H_RE.captures(input)?;
    Some(TimeMatch {
        time: NaiveTime::from_hms_opt(num(&caps, 1)?, num(&caps, 2)?, 0)?,
        span: span(&caps),
    })
}

fn word_time(input: &str) -> Option<TimeMatch> {
    let caps = TIME_WORD_RE.captures(input)?;
    let time = if caps.get(1)?.as_str().eq_ignore_ascii_case("midnight") {
        NaiveTime::MIN
    } else {
        hm((12, 0))
    };
    Some(TimeMatch {
        time,
        span: span(&caps),
    })
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    name.to_ascii_lowercase().parse().ok()
}

fn count_word(word: &str) -> Option<u64> {
    let count = match word.to_ascii_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => digits.parse().ok()?,
    };
    Some(count)
}
