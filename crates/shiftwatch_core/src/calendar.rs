//! Business-day calendar primitives.
//!
//! # Responsibility
//! - Classify calendar dates into business and non-business days.
//! - Walk forward/backward to the nearest business day.
//! - Format local wall-clock time for alert matching and display.
//!
//! # Invariants
//! - A business day is Monday through Friday; no holidays are modeled.
//! - Day walks are capped at `MAX_DAY_WALK_STEPS` and fail with
//!   `CalendarError::InvalidCalendarState` instead of looping forever.
//! - `business_days_between` never returns a negative count.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Timelike, Weekday};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for one forward/backward business-day search.
///
/// A weekday-only calendar needs at most 3 steps.
pub const MAX_DAY_WALK_STEPS: u32 = 10;

pub type CalendarResult<T> = Result<T, CalendarError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Day walk from `start` exceeded the iteration cap.
    InvalidCalendarState { start: NaiveDate, steps: u32 },
}

impl Display for CalendarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCalendarState { start, steps } => write!(
                f,
                "invalid calendar state: no business day found within {steps} days of {start}"
            ),
        }
    }
}

impl Error for CalendarError {}

/// Source of truth for which dates count as business days.
///
/// Holiday-aware calendars implement this trait; callers go through the
/// `*_in` walkers and never special-case dates themselves.
pub trait BusinessCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool;
}

/// Monday-Friday calendar without holiday exclusions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayCalendar;

impl BusinessCalendar for WeekdayCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}

/// Returns whether `date` falls on Monday through Friday.
pub fn is_business_day(date: NaiveDate) -> bool {
    WeekdayCalendar.is_business_day(date)
}

/// Returns the earliest business day strictly after `date`.
///
/// # Errors
/// - `CalendarError::InvalidCalendarState` when no business day is reached
///   within `MAX_DAY_WALK_STEPS`.
pub fn next_business_day(date: NaiveDate) -> CalendarResult<NaiveDate> {
    next_business_day_in(&WeekdayCalendar, date)
}

/// Returns the latest business day strictly before `date`.
///
/// # Errors
/// - `CalendarError::InvalidCalendarState` when no business day is reached
///   within `MAX_DAY_WALK_STEPS`.
pub fn previous_business_day(date: NaiveDate) -> CalendarResult<NaiveDate> {
    previous_business_day_in(&WeekdayCalendar, date)
}

/// Forward walk against a caller-provided calendar.
pub fn next_business_day_in<C>(calendar: &C, date: NaiveDate) -> CalendarResult<NaiveDate>
where
    C: BusinessCalendar + ?Sized,
{
    walk(calendar, date, Duration::days(1))
}

/// Backward walk against a caller-provided calendar.
pub fn previous_business_day_in<C>(calendar: &C, date: NaiveDate) -> CalendarResult<NaiveDate>
where
    C: BusinessCalendar + ?Sized,
{
    walk(calendar, date, Duration::days(-1))
}

fn walk<C>(calendar: &C, start: NaiveDate, step: Duration) -> CalendarResult<NaiveDate>
where
    C: BusinessCalendar + ?Sized,
{
    let mut candidate = start;
    for _ in 0..MAX_DAY_WALK_STEPS {
        candidate = match candidate.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
        if calendar.is_business_day(candidate) {
            return Ok(candidate);
        }
    }

    Err(CalendarError::InvalidCalendarState {
        start,
        steps: MAX_DAY_WALK_STEPS,
    })
}

/// Counts business days in the inclusive range `[start, end]`.
///
/// Returns `0` for an empty range (`end < start`).
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    business_days_between_in(&WeekdayCalendar, start, end)
}

pub fn business_days_between_in<C>(calendar: &C, start: NaiveDate, end: NaiveDate) -> u32
where
    C: BusinessCalendar + ?Sized,
{
    if end < start {
        return 0;
    }

    let count = start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| calendar.is_business_day(*day))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Local wall-clock time as zero-padded 24-hour `"HH:MM"`.
pub fn current_clock_time() -> String {
    format_clock_time(Local::now().time())
}

/// Formats a time-of-day as `"HH:MM"`, dropping seconds.
pub fn format_clock_time(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}
