//! Registry of recurring alert definitions.
//!
//! # Responsibility
//! - Hold the built-in shift checklist alerts plus runtime registrations.
//! - Hand out isolated snapshots to evaluators.
//!
//! # Invariants
//! - Insertion order is preserved; duplicates are allowed.
//! - A rejected registration leaves the catalog unchanged.
//! - There is no removal or edit operation.

use crate::model::alert::{
    AlertDefinition, AlertDefinitionError, AlertDefinitionInput, TriggerTime, WORKWEEK,
};
use log::{info, warn};
use std::sync::{PoisonError, RwLock};

/// Ordered, append-only set of alert definitions.
///
/// Constructed once per process and shared by `Arc` between the poll loop
/// and administrative callers.
#[derive(Debug, Default)]
pub struct AlertCatalog {
    definitions: RwLock<Vec<AlertDefinition>>,
}

impl AlertCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog pre-populated with `builtin_definitions()`.
    pub fn with_builtin() -> Self {
        Self {
            definitions: RwLock::new(builtin_definitions()),
        }
    }

    /// Appends one definition after validating it.
    ///
    /// # Errors
    /// - `AlertDefinitionError` when the definition breaks trigger or weekday
    ///   invariants.
    pub fn register(&self, definition: AlertDefinition) -> Result<(), AlertDefinitionError> {
        if let Err(err) = definition.validate() {
            warn!(
                "event=alert_register module=alerts status=error title={:?} error={err}",
                definition.title
            );
            return Err(err);
        }

        info!(
            "event=alert_register module=alerts status=ok title={:?} trigger={} category={}",
            definition.title, definition.trigger, definition.category_key
        );
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(definition);
        Ok(())
    }

    /// Parses and registers an unvalidated definition from settings or CLI.
    pub fn register_input(&self, input: AlertDefinitionInput) -> Result<(), AlertDefinitionError> {
        let title = input.title.clone();
        match AlertDefinition::try_from(input) {
            Ok(definition) => self.register(definition),
            Err(err) => {
                warn!("event=alert_register module=alerts status=error title={title:?} error={err}");
                Err(err)
            }
        }
    }

    /// Returns an owned copy of every definition in insertion order.
    pub fn list_all(&self) -> Vec<AlertDefinition> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct BuiltinAlert {
    title: &'static str,
    message: &'static str,
    hour: u32,
    minute: u32,
    days: Option<&'static [u8]>,
    category_key: &'static str,
    checkable: bool,
    display_duration_ms: u64,
}

const BUILTIN_ALERTS: &[BuiltinAlert] = &[
    BuiltinAlert {
        title: "Shift opening",
        message: "Open the shift checklist and confirm overnight queues are empty.",
        hour: 8,
        minute: 5,
        days: Some(WORKWEEK),
        category_key: "shift_opening",
        checkable: true,
        display_duration_ms: 15_000,
    },
    BuiltinAlert {
        title: "Bank return files",
        message: "Download and confirm yesterday's bank return files.",
        hour: 9,
        minute: 0,
        days: Some(WORKWEEK),
        category_key: "return_files",
        checkable: true,
        display_duration_ms: 20_000,
    },
    BuiltinAlert {
        title: "Weekly exceptions report",
        message: "Send the weekly exceptions report to the team lead.",
        hour: 9,
        minute: 30,
        days: Some(&[1]),
        category_key: "weekly_report",
        checkable: true,
        display_duration_ms: 15_000,
    },
    BuiltinAlert {
        title: "Morning reconciliation",
        message: "Reconcile settlement totals against the ledger.",
        hour: 10,
        minute: 30,
        days: Some(WORKWEEK),
        category_key: "reconciliation",
        checkable: true,
        display_duration_ms: 15_000,
    },
    BuiltinAlert {
        title: "Coverage handoff",
        message: "Hand off the inbox before the lunch break.",
        hour: 12,
        minute: 0,
        days: None,
        category_key: "handoff",
        checkable: false,
        display_duration_ms: 10_000,
    },
    BuiltinAlert {
        title: "Payment batch cut-off",
        message: "Last call for today's payment batch submission.",
        hour: 14,
        minute: 30,
        days: Some(WORKWEEK),
        category_key: "payment_cutoff",
        checkable: true,
        display_duration_ms: 30_000,
    },
    BuiltinAlert {
        title: "Pending returns review",
        message: "Review file returns still waiting for confirmation.",
        hour: 16,
        minute: 0,
        days: Some(WORKWEEK),
        category_key: "pending_returns",
        checkable: true,
        display_duration_ms: 20_000,
    },
    BuiltinAlert {
        title: "Shift wrap-up",
        message: "Close the checklist and record open items for the next shift.",
        hour: 17,
        minute: 45,
        days: Some(WORKWEEK),
        category_key: "shift_closing",
        checkable: true,
        display_duration_ms: 15_000,
    },
];

/// Returns the fixed list of shift alerts installed at process start.
pub fn builtin_definitions() -> Vec<AlertDefinition> {
    BUILTIN_ALERTS
        .iter()
        .filter_map(|builtin| match TriggerTime::new(builtin.hour, builtin.minute) {
            Ok(trigger) => {
                let mut definition = AlertDefinition::new(
                    builtin.title,
                    builtin.message,
                    trigger,
                    builtin.category_key,
                )
                .displayed_for_ms(builtin.display_duration_ms);
                definition.days = builtin.days.map(<[u8]>::to_vec);
                definition.checkable = builtin.checkable;
                Some(definition)
            }
            Err(err) => {
                warn!(
                    "event=alert_builtin module=alerts status=skip title={:?} error={err}",
                    builtin.title
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(time: &str) -> AlertDefinition {
        AlertDefinition::new("Check", "Check things", time.parse().unwrap(), "check")
    }

    #[test]
    fn builtin_list_is_complete_and_valid() {
        let builtin = builtin_definitions();
        assert_eq!(builtin.len(), BUILTIN_ALERTS.len());
        for definition in &builtin {
            definition.validate().unwrap();
        }
        assert_eq!(AlertCatalog::with_builtin().len(), builtin.len());
    }

    #[test]
    fn register_appends_in_order_and_allows_duplicates() {
        let catalog = AlertCatalog::new();
        catalog.register(definition("09:00")).unwrap();
        catalog.register(definition("08:00")).unwrap();
        catalog.register(definition("09:00")).unwrap();

        let times: Vec<String> = catalog
            .list_all()
            .iter()
            .map(|definition| definition.trigger.to_string())
            .collect();
        assert_eq!(times, vec!["09:00", "08:00", "09:00"]);
    }

    #[test]
    fn rejected_registration_leaves_catalog_unchanged() {
        let catalog = AlertCatalog::new();
        catalog.register(definition("09:00")).unwrap();

        let err = catalog
            .register(definition("10:00").on_days(&[9]))
            .unwrap_err();
        assert_eq!(err, AlertDefinitionError::WeekdayOutOfRange(9));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn register_input_rejects_malformed_time() {
        let catalog = AlertCatalog::new();
        let input = AlertDefinitionInput {
            title: "Late check".to_string(),
            message: "Check late files".to_string(),
            time: "7pm".to_string(),
            days: None,
            category_key: "late".to_string(),
            checkable: false,
            display_duration_ms: 5_000,
        };
        assert!(matches!(
            catalog.register_input(input.clone()),
            Err(AlertDefinitionError::MalformedTriggerTime(_))
        ));
        assert!(catalog.is_empty());

        catalog
            .register_input(AlertDefinitionInput {
                time: "19:00".to_string(),
                ..input
            })
            .unwrap();
        assert_eq!(catalog.list_all()[0].trigger.to_string(), "19:00");
    }

    #[test]
    fn list_all_returns_isolated_copy() {
        let catalog = AlertCatalog::new();
        catalog.register(definition("09:00")).unwrap();

        let mut snapshot = catalog.list_all();
        snapshot.clear();
        snapshot.push(definition("23:59"));

        let current = catalog.list_all();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].trigger.to_string(), "09:00");
    }
}
