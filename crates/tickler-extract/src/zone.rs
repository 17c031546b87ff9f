//! Wall-clock to instant conversion.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Convert a local wall-clock time in `zone` to a UTC instant.
///
/// Ambiguous times (DST fold) resolve to the earlier instant. Times that do
/// not exist (DST gap) are pushed forward by one hour, which lands past the
/// gap for every zone with a one-hour shift.
pub fn local_to_utc(zone: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = zone.from_local_datetime(&local).earliest() {
        return dt.with_timezone(&Utc);
    }

    let shifted = local + Duration::hours(1);
    match zone.from_local_datetime(&shifted).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local),
    }
}

/// Wall-clock time of `instant` in `zone`.
pub fn utc_to_local(zone: Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&zone).naive_local()
}
