//! Conversions between UTC instants and calendar days in the site timezone.

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use time::{Date, Month, OffsetDateTime};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimezoneError {
    #[error("timestamp {0} is outside the supported range")]
    OutOfRange(i64),
    #[error("calendar date {0} has no representable start in {1}")]
    NoLocalMidnight(Date, Tz),
}

/// Calendar date of `time` as observed in `tz`.
pub fn localized_date(time: OffsetDateTime, tz: Tz) -> Result<Date, TimezoneError> {
    let seconds = time.unix_timestamp();
    let utc = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or(TimezoneError::OutOfRange(seconds))?;
    let local = utc.with_timezone(&tz);

    let month = u8::try_from(local.month())
        .ok()
        .and_then(|value| Month::try_from(value).ok())
        .ok_or(TimezoneError::OutOfRange(seconds))?;
    let day = u8::try_from(local.day()).map_err(|_| TimezoneError::OutOfRange(seconds))?;
    Date::from_calendar_date(local.year(), month, day)
        .map_err(|_| TimezoneError::OutOfRange(seconds))
}

/// UTC instants bounding the local calendar day `[start, end)` in `tz`.
pub fn day_bounds(
    date: Date,
    tz: Tz,
) -> Result<(OffsetDateTime, OffsetDateTime), TimezoneError> {
    let start = local_midnight(date, tz)?;
    let next = date
        .next_day()
        .ok_or(TimezoneError::NoLocalMidnight(date, tz))?;
    let end = local_midnight(next, tz)?;
    Ok((start, end))
}

fn local_midnight(date: Date, tz: Tz) -> Result<OffsetDateTime, TimezoneError> {
    let naive = NaiveDate::from_ymd_opt(date.year(), u8::from(date.month()).into(), date.day().into())
        .ok_or(TimezoneError::NoLocalMidnight(date, tz))?;

    // Some zones skip midnight on DST changes; the day then starts at the first valid hour.
    let start = (0..=3)
        .filter_map(|hour| naive.and_hms_opt(hour, 0, 0))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .ok_or(TimezoneError::NoLocalMidnight(date, tz))?;

    OffsetDateTime::from_unix_timestamp(start.timestamp())
        .map_err(|_| TimezoneError::OutOfRange(start.timestamp()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn localized_date_shifts_across_midnight() {
        let instant = datetime!(2024-01-05 23:30 UTC);
        assert_eq!(
            localized_date(instant, chrono_tz::UTC).unwrap(),
            date!(2024 - 01 - 05)
        );
        assert_eq!(
            localized_date(instant, chrono_tz::Europe::Madrid).unwrap(),
            date!(2024 - 01 - 06)
        );
        assert_eq!(
            localized_date(instant, chrono_tz::America::Mexico_City).unwrap(),
            date!(2024 - 01 - 05)
        );
    }

    #[test]
    fn day_bounds_cover_the_local_day() {
        let (start, end) = day_bounds(date!(2024 - 01 - 06), chrono_tz::Europe::Madrid).unwrap();
        assert_eq!(start, datetime!(2024-01-05 23:00 UTC));
        assert_eq!(end, datetime!(2024-01-06 23:00 UTC));
    }

    #[test]
    fn day_bounds_handle_dst_transition() {
        // Madrid moves to summer time on 2024-03-31, a 23 hour day.
        let (start, end) = day_bounds(date!(2024 - 03 - 31), chrono_tz::Europe::Madrid).unwrap();
        assert_eq!(end - start, time::Duration::hours(23));
    }
}
