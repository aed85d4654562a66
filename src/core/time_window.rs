// Fixed 3-hour time-of-day windows and boundary scheduling.
//
// Instants are absolute (UTC); the zone only decides which wall-clock hour,
// and so which window and calendar day, an instant falls in.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

pub const WINDOW_HOURS: u32 = 3;

/// Window index 0-7 for an instant, by its local wall-clock hour
pub fn window_index<Tz: TimeZone>(at: DateTime<Utc>, zone: &Tz) -> usize {
    (at.with_timezone(zone).hour() / WINDOW_HOURS) as usize
}

/// First window boundary strictly after `at`
pub fn next_boundary<Tz: TimeZone>(at: DateTime<Utc>, zone: &Tz) -> DateTime<Utc> {
    let local = at.with_timezone(zone).naive_local();
    let hour = local.hour() - local.hour() % WINDOW_HOURS;
    let boundary =
        local.date().and_time(NaiveTime::MIN) + Duration::hours((hour + WINDOW_HOURS) as i64);
    resolve_after(zone, boundary, at)
}

/// Map a local wall-clock time to the first matching instant after `after`.
/// A time repeated by a backward shift takes the occurrence after `after`;
/// a time skipped by a forward shift maps to the end of the gap.
fn resolve_after<Tz: TimeZone>(
    zone: &Tz,
    local: NaiveDateTime,
    after: DateTime<Utc>,
) -> DateTime<Utc> {
    match zone.from_local_datetime(&local) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, latest) => {
            let earliest = earliest.with_timezone(&Utc);
            if earliest > after {
                earliest
            } else {
                latest.with_timezone(&Utc)
            }
        }
        LocalResult::None => (1..=24 * 60)
            .find_map(|minutes| {
                zone.from_local_datetime(&(local + Duration::minutes(minutes)))
                    .earliest()
            })
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(|| after + Duration::hours(WINDOW_HOURS as i64)),
    }
}

/// Time left until the next boundary, recomputed from the clock each time the
/// timer is armed so a late wakeup never accumulates drift
pub fn until_next_boundary<Tz: TimeZone>(now: DateTime<Utc>, zone: &Tz) -> std::time::Duration {
    (next_boundary(now, zone) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

/// Calendar key used for daily rollover
pub fn date_key<Tz: TimeZone>(at: DateTime<Utc>, zone: &Tz) -> String {
    at.with_timezone(zone).date_naive().format("%Y-%m-%d").to_string()
}
