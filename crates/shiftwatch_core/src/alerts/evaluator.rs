//! Pure evaluation of alert definitions and obligations against a clock.
//!
//! # Responsibility
//! - Decide which alert definitions fire in the current minute.
//! - Decide which alerts have already passed today.
//! - Partition one owner's pending obligations into due-today and overdue.
//!
//! # Invariants
//! - `due_now` and `active_alerts` are independent filters: exact-minute
//!   match vs. trigger-at-or-before-now.
//! - `active_alerts` is empty on weekends; `due_now` stays a pure trigger
//!   match and the poll loop applies the business-day gate itself.
//! - `due_today` keeps creation order (oldest first).
//! - `overdue` is ordered by expected return ascending, so the most overdue
//!   comes first; ties keep creation order.

use crate::calendar::is_business_day;
use crate::model::alert::{AlertDefinition, AlertFireEvent};
use crate::model::obligation::Obligation;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Obligations of one owner split by deadline relative to `today`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObligationPartition {
    pub due_today: Vec<Obligation>,
    pub overdue: Vec<Obligation>,
}

/// Published result of one evaluation pass.
///
/// Replaced wholesale by each completed pass; never merged field-by-field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSnapshot {
    pub daily_alerts_due: Vec<AlertDefinition>,
    pub obligations_due_today: Vec<Obligation>,
    pub obligations_overdue: Vec<Obligation>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    /// Local instant of the last completed pass.
    pub evaluated_at: Option<NaiveDateTime>,
}

/// Definitions whose trigger matches the hour and minute of `instant` and
/// whose weekday set (if any) contains its weekday.
///
/// Seconds are ignored, so repeated calls inside one minute return the same
/// definitions again.
pub fn due_now(definitions: &[AlertDefinition], instant: NaiveDateTime) -> Vec<AlertDefinition> {
    due_positions(definitions, instant)
        .into_iter()
        .map(|index| definitions[index].clone())
        .collect()
}

/// Positions in `definitions` that `due_now` would return.
pub(crate) fn due_positions(definitions: &[AlertDefinition], instant: NaiveDateTime) -> Vec<usize> {
    let time = instant.time();
    definitions
        .iter()
        .enumerate()
        .filter(|(_, definition)| {
            definition.trigger.matches(time) && definition.applies_on(instant)
        })
        .map(|(index, _)| index)
        .collect()
}

/// Wraps `due_now` results into fire events stamped with `instant`.
pub fn fire_events(definitions: &[AlertDefinition], instant: NaiveDateTime) -> Vec<AlertFireEvent> {
    due_now(definitions, instant)
        .into_iter()
        .map(|definition| AlertFireEvent::new(definition, instant))
        .collect()
}

/// Definitions scheduled for the weekday of `instant` whose trigger time is
/// at or before its time-of-day.
///
/// Always empty on non-business days, whatever the weekday sets say.
pub fn active_alerts(
    definitions: &[AlertDefinition],
    instant: NaiveDateTime,
) -> Vec<AlertDefinition> {
    if !is_business_day(instant.date()) {
        return Vec::new();
    }
    let time = instant.time();
    definitions
        .iter()
        .filter(|definition| definition.trigger.has_passed(time) && definition.applies_on(instant))
        .cloned()
        .collect()
}

/// Splits `user_id`'s unfulfilled obligations into due-today and overdue.
///
/// Obligations of other owners, fulfilled ones, and those due after `today`
/// are dropped.
pub fn partition_obligations(
    obligations: &[Obligation],
    user_id: &str,
    today: NaiveDate,
) -> ObligationPartition {
    let mut partition = ObligationPartition::default();

    for obligation in obligations
        .iter()
        .filter(|obligation| obligation.is_pending() && obligation.owner_id == user_id)
    {
        if obligation.expected_return_on == today {
            partition.due_today.push(obligation.clone());
        } else if obligation.expected_return_on < today {
            partition.overdue.push(obligation.clone());
        }
    }

    // Stable sorts: equal keys keep ledger order.
    partition.due_today.sort_by_key(|obligation| obligation.created_at);
    partition
        .overdue
        .sort_by_key(|obligation| (obligation.expected_return_on, obligation.created_at));
    partition
}

/// Due alerts plus due-today and overdue obligations, recomputed per call.
pub fn total_alert_count(snapshot: &AlertSnapshot) -> usize {
    snapshot.daily_alerts_due.len()
        + snapshot.obligations_due_today.len()
        + snapshot.obligations_overdue.len()
}
