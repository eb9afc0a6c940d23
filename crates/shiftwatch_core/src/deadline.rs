//! Expected-return deadline resolution for obligations.
//!
//! # Invariants
//! - The resolved date is a business day strictly after the origination date.
//! - Resolution is pure; it runs exactly once when an obligation is recorded.

use crate::calendar::{business_days_between, next_business_day, CalendarResult};
use chrono::NaiveDate;

/// Resolves the date a return confirmation is expected for an action that
/// happened on `originated_on`.
pub fn resolve_expected_return(originated_on: NaiveDate) -> CalendarResult<NaiveDate> {
    next_business_day(originated_on)
}

/// Business days elapsed since a missed deadline, counting `today`.
///
/// Returns `0` when `today` is on or before `expected_return_on`.
pub fn business_days_overdue(expected_return_on: NaiveDate, today: NaiveDate) -> u32 {
    match expected_return_on.succ_opt() {
        Some(first_late_day) => business_days_between(first_late_day, today),
        None => 0,
    }
}
