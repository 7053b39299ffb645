//! Business-timezone window keys
//!
//! Pure functions turning an instant into the dedup keys used by the
//! notification ledger. All calendar math happens in the fixed business
//! timezone (UTC+5, no DST) so keys are stable across restarts and hosts.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc, Weekday};

/// Business timezone offset from UTC in seconds (UTC+5)
pub const BUSINESS_UTC_OFFSET_SECS: i32 = 5 * 3600;

/// Hours per reminder block (8 blocks per day)
pub const PENDING_BLOCK_HOURS: u32 = 3;

/// Local hour the weekly period opens on Monday
pub const WEEK_START_HOUR: u32 = 6;

/// Local hour the weekly period closes on Sunday (also the send hour)
pub const WEEK_END_HOUR: u32 = 22;

pub fn business_tz() -> FixedOffset {
    FixedOffset::east_opt(BUSINESS_UTC_OFFSET_SECS).unwrap_or(Utc.fix())
}

pub fn to_business_local(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&business_tz())
}

/// Calendar date of `instant` in the business timezone
pub fn business_date(instant: DateTime<Utc>) -> NaiveDate {
    to_business_local(instant).date_naive()
}

/// Calendar-day key, e.g. `2025-01-03`
pub fn day_key(instant: DateTime<Utc>) -> String {
    business_date(instant).format("%Y-%m-%d").to_string()
}

/// 3-hour block key, e.g. `2025-01-03#4` for 12:00-14:59 local
pub fn pending_window_key(instant: DateTime<Utc>) -> String {
    let local = to_business_local(instant);
    let block = local.hour() / PENDING_BLOCK_HOURS;
    format!("{}#{}", local.format("%Y-%m-%d"), block)
}

/// Whole business-local calendar days between two instants
///
/// 23:50 on one day to 00:10 on the next counts as one day.
pub fn elapsed_business_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (business_date(to) - business_date(from)).num_days()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyWindow {
    /// Monday 06:00 business-local, as an absolute instant
    pub start: DateTime<Utc>,
    /// Sunday 22:00 business-local, as an absolute instant
    pub end: DateTime<Utc>,
    /// ISO week key, e.g. `2025-W02`
    pub key: String,
    /// True during the Sunday 22:00 local hour
    pub is_weekly_send_moment: bool,
}

/// The Monday 06:00 - Sunday 22:00 business week containing `instant`
///
/// The week is anchored on the ISO week of the local date, so the quiet
/// hours outside the period (Sunday after 22:00, Monday before 06:00) still
/// map to exactly one key and windows never overlap.
pub fn weekly_window(instant: DateTime<Utc>) -> WeeklyWindow {
    let local = to_business_local(instant);
    let date = local.date_naive();
    let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
    let sunday = monday + Duration::days(6);

    let iso = monday.iso_week();

    WeeklyWindow {
        start: local_to_utc(monday, WEEK_START_HOUR),
        end: local_to_utc(sunday, WEEK_END_HOUR),
        key: format!("{}-W{:02}", iso.year(), iso.week()),
        is_weekly_send_moment: date.weekday() == Weekday::Sun && local.hour() == WEEK_END_HOUR,
    }
}

fn local_to_utc(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN) + Duration::hours(hour as i64)
        - Duration::seconds(BUSINESS_UTC_OFFSET_SECS as i64);
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}
