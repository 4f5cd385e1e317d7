//! Small calendar helpers for the usage/budget windows in §4.8.
//!
//! Deliberately implemented against raw Unix seconds rather than `jiff`'s
//! civil-calendar types: the only two calculations needed are "24 hours ago"
//! and "the first instant of the current UTC month", and both are simpler to
//! get right with Howard Hinnant's `civil_from_days`/`days_from_civil`
//! algorithm than to ship a calendar-library dependency for.

use jiff::Timestamp;

const SECONDS_PER_DAY: i64 = 86_400;

/// `now` minus 24 hours, as a `Timestamp`.
pub(crate) fn one_day_before(now: Timestamp) -> Timestamp {
    Timestamp::from_second(now.as_second() - SECONDS_PER_DAY).expect("valid timestamp")
}

/// `now` minus 30 days, used as the default window start for `/usage` when
/// the caller doesn't supply a `from` query parameter.
pub(crate) fn thirty_days_before(now: Timestamp) -> Timestamp {
    Timestamp::from_second(now.as_second() - 30 * SECONDS_PER_DAY).expect("valid timestamp")
}

/// The first instant (00:00:00Z) of the UTC calendar month containing `now`.
pub(crate) fn month_start_utc(now: Timestamp) -> Timestamp {
    let days = now.as_second().div_euclid(SECONDS_PER_DAY);
    let (year, month, _day) = civil_from_days(days);
    let start_days = days_from_civil(year, month, 1);

    Timestamp::from_second(start_days * SECONDS_PER_DAY).expect("valid timestamp")
}

/// Converts a day count since the Unix epoch into a proleptic-Gregorian
/// `(year, month, day)` triple. `http://howardhinnant.github.io/date_algorithms.html`.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 }.div_euclid(146_097);
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };

    (y, m, d)
}

/// Inverse of [`civil_from_days`]: days since the Unix epoch for a given
/// proleptic-Gregorian calendar date.
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 }.div_euclid(400);
    let yoe = (y - era * 400) as u64;
    let mp = if m > 2 { m - 3 } else { m + 9 } as u64;
    let doy = (153 * mp + 2) / 5 + d as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146_097 + doe as i64 - 719_468
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_start_truncates_to_first_of_month() {
        // 2024-03-17T12:34:56Z
        let now: Timestamp = "2024-03-17T12:34:56Z".parse().unwrap();
        let start = month_start_utc(now);

        assert_eq!(start.to_string(), "2024-03-01T00:00:00Z");
    }

    #[test]
    fn month_start_handles_january() {
        let now: Timestamp = "2024-01-05T00:00:01Z".parse().unwrap();
        let start = month_start_utc(now);

        assert_eq!(start.to_string(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn one_day_before_subtracts_exactly_24h() {
        let now: Timestamp = "2024-03-17T12:34:56Z".parse().unwrap();
        let before = one_day_before(now);

        assert_eq!(before.to_string(), "2024-03-16T12:34:56Z");
    }
}
