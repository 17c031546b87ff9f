//! Local heuristic extractor: the cascade tier that cannot fail.

use std::ops::Range;

use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use tickler_core::ParseResult;

use crate::error::ExtractError;
use crate::grammar;
use crate::provider::{DueDateProvider, ExtractionRequest};
use crate::zone::{local_to_utc, utc_to_local};

static IN_HOURS_MINUTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bin\s+(\d{1,6})\s+(hours?|minutes?|mins?)\b").expect("valid relative offset regex")
});
static TOMORROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btomorrow\b").expect("valid tomorrow regex"));
static TODAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").expect("valid today regex"));
static NEXT_WEEK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bnext\s+week\b").expect("valid next week regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Times of day the fallback phrases resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicDefaults {
    /// Time for a bare "tomorrow".
    pub tomorrow: NaiveTime,
    /// Time for a bare "today".
    pub today: NaiveTime,
    /// Time for "next week".
    pub next_week: NaiveTime,
}

impl Default for HeuristicDefaults {
    fn default() -> Self {
        Self {
            tomorrow: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            today: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            next_week: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Best-effort natural-language extractor that runs in-process.
///
/// Tries the date/time grammar first, then a handful of fixed phrases, and
/// otherwise returns the trimmed input with no due instant.
#[derive(Debug, Clone, Default)]
pub struct LocalExtractor {
    defaults: HeuristicDefaults,
}

impl LocalExtractor {
    /// Create an extractor with the given default times.
    pub fn new(defaults: HeuristicDefaults) -> Self {
        Self { defaults }
    }

    /// Extract a title and due instant from `raw_input`.
    pub fn extract(&self, raw_input: &str, reference: DateTime<Utc>, zone: Tz) -> ParseResult {
        let reference_local = utc_to_local(zone, reference);

        if let Some(m) = grammar::parse(raw_input, reference_local) {
            let due = local_to_utc(zone, m.local);
            debug!(due = %due, "grammar matched");
            return ParseResult::new(strip_spans(raw_input, &m.spans), Some(due));
        }

        if let Some((due, span)) = self.fallback_phrase(raw_input, reference, zone) {
            debug!(due = %due, "heuristic phrase matched");
            return ParseResult::new(strip_spans(raw_input, &[span]), Some(due));
        }

        ParseResult::undated(raw_input)
    }

    fn fallback_phrase(
        &self,
        raw_input: &str,
        reference: DateTime<Utc>,
        zone: Tz,
    ) -> Option<(DateTime<Utc>, Range<usize>)> {
        if let Some(caps) = IN_HOURS_MINUTES_RE.captures(raw_input) {
            let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
            let unit = caps.get(2)?.as_str().to_ascii_lowercase();
            let offset = if unit.starts_with('h') {
                Duration::hours(amount)
            } else {
                Duration::minutes(amount)
            };
            let due = reference.checked_add_signed(offset)?;
            return Some((due, caps.get(0)?.range()));
        }

        let today = utc_to_local(zone, reference).date();

        if let Some(m) = TOMORROW_RE.find(raw_input) {
            let local = today.succ_opt()?.and_time(self.defaults.tomorrow);
            return Some((local_to_utc(zone, local), m.range()));
        }

        if let Some(m) = TODAY_RE.find(raw_input) {
            let local = today.and_time(self.defaults.today);
            return Some((local_to_utc(zone, local), m.range()));
        }

        if let Some(m) = NEXT_WEEK_RE.find(raw_input) {
            let local = today
                .checked_add_days(Days::new(7))?
                .and_time(self.defaults.next_week);
            return Some((local_to_utc(zone, local), m.range()));
        }

        None
    }
}

#[async_trait]
impl DueDateProvider for LocalExtractor {
    fn name(&self) -> &str {
        "local"
    }

    async fn extract(&self, request: &ExtractionRequest<'_>) -> Result<ParseResult, ExtractError> {
        Ok(LocalExtractor::extract(
            self,
            request.raw_input,
            request.reference,
            request.zone,
        ))
    }
}

/// Remove the given byte ranges from `input` and tidy the leftover text.
///
/// Falls back to the trimmed input when nothing but the date phrase was
/// written, so a title is never empty for non-empty input.
pub(crate) fn strip_spans(input: &str, spans: &[Range<usize>]) -> String {
    let mut sorted: Vec<&Range<usize>> = spans.iter().collect();
    sorted.sort_by_key(|r| std::cmp::Reverse(r.start));

    let mut text = input.to_string();
    for range in sorted {
        if range.end <= text.len() && text.is_char_boundary(range.start) && text.is_char_boundary(range.end) {
            text.replace_range(range.clone(), " ");
        }
    }

    let collapsed = WHITESPACE_RE.replace_all(&text, " ");
    let title = collapsed.trim_matches(|c: char| c.is_whitespace() || c == ',' || c == '-');

    if title.is_empty() {
        input.trim().to_string()
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_in_n_hours_and_minutes() {
        let extractor = LocalExtractor::default();

        let r = extractor.extract("Call mom in 2 hours", t0(), Tz::UTC);
        assert_eq!(r.title, "Call mom");
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()));

        let r = extractor.extract("stretch in 45 minutes please", t0(), Tz::UTC);
        assert_eq!(r.title, "stretch please");
        assert_eq!(r.due_instant, Some(t0() + Duration::minutes(45)));

        let r = extractor.extract("tea in 1 hour", t0(), Tz::UTC);
        assert_eq!(r.due_instant, Some(t0() + Duration::hours(1)));

        let r = extractor.extract("nap in 20 min", t0(), Tz::UTC);
        assert_eq!(r.title, "nap");
        assert_eq!(r.due_instant, Some(t0() + Duration::minutes(20)));
    }

    #[test]
    fn test_bare_tomorrow_is_nine_local() {
        let extractor = LocalExtractor::default();
        let zone = chrono_tz::America::New_York;

        let r = extractor.extract("pay rent tomorrow", t0(), zone);
        assert_eq!(r.title, "pay rent");
        // 09:00 EST on 2024-01-16 is 14:00 UTC.
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap()));
    }

    #[test]
    fn test_bare_today_is_five_pm_local() {
        let extractor = LocalExtractor::default();
        let zone = chrono_tz::Europe::Berlin;

        let r = extractor.extract("finish the report today", t0(), zone);
        assert_eq!(r.title, "finish the report");
        // 17:00 CET is 16:00 UTC.
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 15, 16, 0, 0).unwrap()));
    }

    #[test]
    fn test_today_uses_local_calendar_day() {
        let extractor = LocalExtractor::default();
        // 02:00 UTC on the 16th is still the 15th in Los Angeles.
        let reference = Utc.with_ymd_and_hms(2024, 1, 16, 2, 0, 0).unwrap();

        let r = extractor.extract("today", reference, chrono_tz::America::Los_Angeles);
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 16, 1, 0, 0).unwrap()));
    }

    #[test]
    fn test_next_week_pins_nine_local() {
        let extractor = LocalExtractor::default();

        let r = extractor.extract("plan offsite next week", t0(), Tz::UTC);
        assert_eq!(r.title, "plan offsite");
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 22, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_grammar_takes_precedence() {
        let extractor = LocalExtractor::default();
        let r = extractor.extract("Dentist tomorrow at 2pm", t0(), Tz::UTC);
        assert_eq!(r.title, "Dentist");
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap()));
    }

    #[test]
    fn test_custom_defaults() {
        let extractor = LocalExtractor::new(HeuristicDefaults {
            tomorrow: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            ..Default::default()
        });
        let r = extractor.extract("run tomorrow", t0(), Tz::UTC);
        assert_eq!(r.due_instant, Some(Utc.with_ymd_and_hms(2024, 1, 16, 7, 30, 0).unwrap()));
    }

    #[test]
    fn test_no_match_keeps_trimmed_input() {
        let extractor = LocalExtractor::default();

        let r = extractor.extract("   water the plants  ", t0(), Tz::UTC);
        assert_eq!(r.title, "water the plants");
        assert_eq!(r.due_instant, None);

        let r = extractor.extract("", t0(), Tz::UTC);
        assert_eq!(r.title, "");
        assert_eq!(r.due_instant, None);
    }

    #[test]
    fn test_phrase_only_input_keeps_raw_title() {
        let extractor = LocalExtractor::default();
        let r = extractor.extract("tomorrow", t0(), Tz::UTC);
        assert_eq!(r.title, "tomorrow");
        assert!(r.due_instant.is_some());
    }

    #[test]
    fn test_huge_offset_does_not_panic() {
        let extractor = LocalExtractor::default();
        let r = extractor.extract("wait in 999999 hours", t0(), Tz::UTC);
        assert!(r.due_instant.is_some());
    }

    #[test]
    fn test_strip_spans_collapses_whitespace() {
        let input = "Meet  Bob, on friday at 3pm";
        let stripped = strip_spans(input, &[11..20, 21..27]);
        assert_eq!(stripped, "Meet Bob");
    }
}
