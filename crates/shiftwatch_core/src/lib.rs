//! Core alert & deadline engine for shiftwatch.
//! This crate is the single source of truth for calendar, deadline and
//! alert evaluation rules.

pub mod alerts;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod deadline;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod repo;

pub use alerts::catalog::{builtin_definitions, AlertCatalog};
pub use alerts::evaluator::{
    active_alerts, due_now, fire_events, partition_obligations, total_alert_count,
    AlertSnapshot, ObligationPartition,
};
pub use calendar::{
    business_days_between, current_clock_time, is_business_day, next_business_day,
    previous_business_day, BusinessCalendar, CalendarError, WeekdayCalendar,
};
pub use clock::{Clock, FixedClock, LocalClock};
pub use config::{ActiveWindow, ConfigError, ConfigManager, EngineSettings};
pub use deadline::{business_days_overdue, resolve_expected_return};
pub use identity::{Identity, UserId};
pub use ledger::{LedgerError, LedgerResult, ObligationLedger, SqliteLedger};
pub use logging::{default_log_level, init_console_logging, init_logging, logging_status};
pub use model::alert::{
    AlertDefinition, AlertDefinitionError, AlertDefinitionInput, AlertFireEvent, TriggerTime,
};
pub use model::obligation::{Obligation, ObligationId, ObligationValidationError};
pub use monitor::{
    AlertMonitor, ChannelSink, LogSink, MonitorConfig, MonitorDeps, MonitorHandle,
    NotificationSink, PassOutcome,
};
pub use repo::obligation_repo::{
    DueFilter, Fulfillment, ObligationRepository, RepoError, RepoResult,
    SqliteObligationRepository,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
