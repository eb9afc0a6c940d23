//! Per-minute fire deduplication for a sub-minute poll cadence.
//!
//! # Invariants
//! - A catalog entry fires at most once per date and trigger minute.
//! - State is in-memory only and starts empty on every process start.
//! - Keys from earlier dates are dropped on the next call.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub(crate) struct FireDeduper {
    fired: HashSet<(usize, NaiveDate, u32, u32)>,
}

impl FireDeduper {
    /// Records a fire for catalog position `index` at `instant`.
    ///
    /// Returns `false` when the same entry already fired in that minute.
    pub(crate) fn first_fire(&mut self, index: usize, instant: NaiveDateTime) -> bool {
        let today = instant.date();
        self.fired.retain(|(_, date, _, _)| *date == today);
        self.fired
            .insert((index, today, instant.hour(), instant.minute()))
    }
}

#[cfg(test)]
mod tests {
    use super::FireDeduper;
    use chrono::NaiveDate;

    #[test]
    fn fires_once_per_minute_per_entry() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let mut deduper = FireDeduper::default();

        assert!(deduper.first_fire(0, day.and_hms_opt(9, 0, 5).unwrap()));
        assert!(!deduper.first_fire(0, day.and_hms_opt(9, 0, 35).unwrap()));
        assert!(deduper.first_fire(1, day.and_hms_opt(9, 0, 35).unwrap()));

        let next_day = day.succ_opt().unwrap();
        assert!(deduper.first_fire(0, next_day.and_hms_opt(9, 0, 5).unwrap()));
        assert_eq!(deduper.fired.len(), 1);
    }
}
