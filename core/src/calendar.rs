//! Calendar arithmetic relative to an instant.
//!
//! RULE: "one month" is always a calendar month. Nothing here subtracts a
//! fixed number of days to approximate a month; `from - 31 days` lands in
//! the wrong month whenever the elapsed month is not 31 days long, or when
//! `from` falls early in its month.
//!
//! Month shifts keep the day-of-month when the target month has it and clamp
//! to the target month's last day otherwise (March 31 minus one month is
//! February 28/29). Boundaries are computed in UTC with nanosecond
//! granularity: a month starts at 00:00:00.000000000 on the 1st and ends at
//! 23:59:59.999999999 on its last day.

use crate::{
    error::{HarnessError, HarnessResult},
    types::Instant,
};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` pair of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarRange {
    start: Instant,
    end:   Instant,
}

impl CalendarRange {
    /// Build an arbitrary bounded range. Fails if `start > end`.
    pub fn new(start: Instant, end: Instant) -> HarnessResult<Self> {
        if start > end {
            return Err(HarnessError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: Instant) -> bool {
        self.start <= at && at <= self.end
    }
}

/// UTC midnight on the given date.
pub fn ymd(year: i32, month: u32, day: u32) -> HarnessResult<Instant> {
    ymd_hms(year, month, day, 0, 0, 0)
}

pub fn ymd_hms(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> HarnessResult<Instant> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(|| {
            HarnessError::Other(anyhow::anyhow!(
                "invalid calendar date {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            ))
        })
}

/// Subtract `n` calendar months from `from`, clamping the day-of-month.
/// The time of day is preserved.
pub fn months_ago(n: u32, from: Instant) -> HarnessResult<Instant> {
    from.checked_sub_months(Months::new(n))
        .ok_or(HarnessError::CalendarOverflow { from, months: n })
}

/// Add `n` calendar months to `from`, clamping the day-of-month.
pub fn months_after(n: u32, from: Instant) -> HarnessResult<Instant> {
    from.checked_add_months(Months::new(n))
        .ok_or(HarnessError::CalendarOverflow { from, months: n })
}

/// Number of days in `month` (1-based) of `year`. Returns 0 for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return 0;
    };
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match next {
        Some(next) => (next - first).num_days() as u32,
        // December of the last representable year.
        None => 31,
    }
}

pub fn start_of_day(i: Instant) -> Instant {
    Utc.from_utc_datetime(&i.date_naive().and_time(NaiveTime::MIN))
}

pub fn end_of_day(i: Instant) -> HarnessResult<Instant> {
    let start = start_of_day(i);
    start
        .checked_add_signed(Duration::days(1))
        .and_then(|next| next.checked_sub_signed(Duration::nanoseconds(1)))
        .ok_or(HarnessError::CalendarOverflow { from: i, months: 0 })
}

/// First instant of the month `i` falls in.
pub fn start_of_month(i: Instant) -> HarnessResult<Instant> {
    let first = i
        .date_naive()
        .with_day(1)
        .ok_or(HarnessError::CalendarOverflow { from: i, months: 0 })?;
    Ok(Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN)))
}

/// Last instant (final nanosecond of the last day) of the month `i` falls in.
pub fn end_of_month(i: Instant) -> HarnessResult<Instant> {
    let first = start_of_month(i)?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.checked_sub_signed(Duration::nanoseconds(1)))
        .ok_or(HarnessError::CalendarOverflow { from: i, months: 1 })
}

/// The whole calendar month `n` months before `from`.
pub fn month_range(n: u32, from: Instant) -> HarnessResult<CalendarRange> {
    let anchor = months_ago(n, from)?;
    CalendarRange::new(start_of_month(anchor)?, end_of_month(anchor)?)
}

/// From the start of the month `older` months ago through the end of the
/// month `newer` months ago. `month_span(n, n, from) == month_range(n, from)`.
pub fn month_span(older: u32, newer: u32, from: Instant) -> HarnessResult<CalendarRange> {
    let start = start_of_month(months_ago(older, from)?)?;
    let end = end_of_month(months_ago(newer, from)?)?;
    CalendarRange::new(start, end)
}

/// The calendar day `from` falls on.
pub fn day_range(from: Instant) -> HarnessResult<CalendarRange> {
    CalendarRange::new(start_of_day(from), end_of_day(from)?)
}
