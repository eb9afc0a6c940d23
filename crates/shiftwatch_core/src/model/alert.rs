//! Alert definition model.
//!
//! # Responsibility
//! - Define recurring daily time-of-day triggers and their derived fire events.
//! - Parse and print the `HH:MM` trigger notation.
//!
//! # Invariants
//! - `TriggerTime` always holds a valid 24-hour clock value (no seconds).
//! - Weekday sets only contain `0..=6` where `0` is Sunday.
//! - `AlertFireEvent` is ephemeral and never persisted.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static TRIGGER_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid trigger time regex"));

/// Rejection reasons for malformed alert definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDefinitionError {
    /// Trigger text is not `HH:MM`.
    MalformedTriggerTime(String),
    TriggerOutOfRange { hour: u32, minute: u32 },
    WeekdayOutOfRange(u8),
    BlankTitle,
}

impl Display for AlertDefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedTriggerTime(value) => {
                write!(f, "invalid alert definition: trigger `{value}` is not HH:MM")
            }
            Self::TriggerOutOfRange { hour, minute } => write!(
                f,
                "invalid alert definition: {hour:02}:{minute:02} is not a 24-hour time"
            ),
            Self::WeekdayOutOfRange(day) => {
                write!(f, "invalid alert definition: weekday {day} not in 0..=6")
            }
            Self::BlankTitle => write!(f, "invalid alert definition: title must not be blank"),
        }
    }
}

impl Error for AlertDefinitionError {}

/// Daily trigger time with minute granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TriggerTime {
    hour: u32,
    minute: u32,
}

impl TriggerTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, AlertDefinitionError> {
        if hour > 23 || minute > 59 {
            return Err(AlertDefinitionError::TriggerOutOfRange { hour, minute });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Returns whether `time` falls inside this trigger's minute.
    pub fn matches(&self, time: NaiveTime) -> bool {
        self.hour == time.hour() && self.minute == time.minute()
    }

    /// Returns whether this trigger is at or before `time` on the same day.
    pub fn has_passed(&self, time: NaiveTime) -> bool {
        (self.hour, self.minute) <= (time.hour(), time.minute())
    }
}

impl FromStr for TriggerTime {
    type Err = AlertDefinitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = TRIGGER_TIME_RE
            .captures(trimmed)
            .ok_or_else(|| AlertDefinitionError::MalformedTriggerTime(trimmed.to_string()))?;
        let hour = captures[1]
            .parse::<u32>()
            .map_err(|_| AlertDefinitionError::MalformedTriggerTime(trimmed.to_string()))?;
        let minute = captures[2]
            .parse::<u32>()
            .map_err(|_| AlertDefinitionError::MalformedTriggerTime(trimmed.to_string()))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TriggerTime {
    type Error = AlertDefinitionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TriggerTime> for String {
    fn from(value: TriggerTime) -> Self {
        value.to_string()
    }
}

impl Display for TriggerTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Monday through Friday in `0 = Sunday` numbering.
pub const WORKWEEK: &[u8] = &[1, 2, 3, 4, 5];

/// Recurring daily alert tied to a shift checklist item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDefinition {
    pub title: String,
    pub message: String,
    pub trigger: TriggerTime,
    /// Applicable weekdays, `0 = Sunday`. `None` means every day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<Vec<u8>>,
    /// Opaque key cross-referencing a checklist item.
    pub category_key: String,
    /// Whether the alert corresponds to a checkable task.
    pub checkable: bool,
    /// How long the derived notification stays visible.
    pub display_duration_ms: u64,
}

impl AlertDefinition {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        trigger: TriggerTime,
        category_key: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            trigger,
            days: None,
            category_key: category_key.into(),
            checkable: false,
            display_duration_ms: default_display_duration_ms(),
        }
    }

    pub fn on_days(mut self, days: &[u8]) -> Self {
        self.days = Some(days.to_vec());
        self
    }

    pub fn checkable(mut self) -> Self {
        self.checkable = true;
        self
    }

    pub fn displayed_for_ms(mut self, duration_ms: u64) -> Self {
        self.display_duration_ms = duration_ms;
        self
    }

    /// Validates title and weekday invariants.
    ///
    /// Trigger range is already enforced by `TriggerTime` construction.
    pub fn validate(&self) -> Result<(), AlertDefinitionError> {
        if self.title.trim().is_empty() {
            return Err(AlertDefinitionError::BlankTitle);
        }
        if let Some(days) = &self.days {
            if let Some(day) = days.iter().find(|day| **day > 6) {
                return Err(AlertDefinitionError::WeekdayOutOfRange(*day));
            }
        }
        Ok(())
    }

    /// Returns whether this definition applies on the weekday of `instant`.
    pub fn applies_on(&self, instant: NaiveDateTime) -> bool {
        match &self.days {
            None => true,
            Some(days) => {
                let weekday = instant.weekday().num_days_from_sunday();
                days.iter().any(|day| u32::from(*day) == weekday)
            }
        }
    }
}

/// Unvalidated alert definition as supplied by settings files or the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDefinitionInput {
    pub title: String,
    pub message: String,
    /// `HH:MM`, 24-hour.
    pub time: String,
    #[serde(default)]
    pub days: Option<Vec<u8>>,
    pub category_key: String,
    #[serde(default)]
    pub checkable: bool,
    #[serde(default = "default_display_duration_ms")]
    pub display_duration_ms: u64,
}

fn default_display_duration_ms() -> u64 {
    10_000
}

impl TryFrom<AlertDefinitionInput> for AlertDefinition {
    type Error = AlertDefinitionError;

    fn try_from(input: AlertDefinitionInput) -> Result<Self, Self::Error> {
        let definition = Self {
            title: input.title,
            message: input.message,
            trigger: input.time.parse()?,
            days: input.days,
            category_key: input.category_key,
            checkable: input.checkable,
            display_duration_ms: input.display_duration_ms,
        };
        definition.validate()?;
        Ok(definition)
    }
}

/// Evaluation result for one definition at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertFireEvent {
    pub definition: AlertDefinition,
    pub fired_at: NaiveDateTime,
    pub visible_until: NaiveDateTime,
}

impl AlertFireEvent {
    pub fn new(definition: AlertDefinition, fired_at: NaiveDateTime) -> Self {
        let visible_for = i64::try_from(definition.display_duration_ms)
            .map(Duration::milliseconds)
            .unwrap_or_else(|_| Duration::zero());
        let visible_until = fired_at
            .checked_add_signed(visible_for)
            .unwrap_or(fired_at);
        Self {
            definition,
            fired_at,
            visible_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn trigger_time_parses_and_prints() {
        let trigger: TriggerTime = "9:05".parse().unwrap();
        assert_eq!(trigger.hour(), 9);
        assert_eq!(trigger.minute(), 5);
        assert_eq!(trigger.to_string(), "09:05");
    }

    #[test]
    fn trigger_time_rejects_invalid_values() {
        assert_eq!(
            "24:00".parse::<TriggerTime>().unwrap_err(),
            AlertDefinitionError::TriggerOutOfRange { hour: 24, minute: 0 }
        );
        assert!(matches!(
            "09:00:30".parse::<TriggerTime>(),
            Err(AlertDefinitionError::MalformedTriggerTime(_))
        ));
        assert!("12:60".parse::<TriggerTime>().is_err());
    }

    #[test]
    fn validate_rejects_weekday_seven() {
        let definition = AlertDefinition::new("t", "m", TriggerTime::new(9, 0).unwrap(), "k")
            .on_days(&[1, 7]);
        assert_eq!(
            definition.validate().unwrap_err(),
            AlertDefinitionError::WeekdayOutOfRange(7)
        );
    }

    #[test]
    fn applies_on_uses_sunday_zero_numbering() {
        let definition = AlertDefinition::new("t", "m", TriggerTime::new(9, 0).unwrap(), "k")
            .on_days(&[0]);
        // 2026-10-11 is a Sunday, the 12th a Monday.
        assert!(definition.applies_on(at(11, 9, 0)));
        assert!(!definition.applies_on(at(12, 9, 0)));
    }

    #[test]
    fn serialization_uses_clock_notation() {
        let definition = AlertDefinition::new("t", "m", TriggerTime::new(14, 30).unwrap(), "k");
        let json = serde_json::to_value(&definition).unwrap();
        assert_eq!(json["trigger"], "14:30");
        assert!(json.get("days").is_none());

        let decoded: AlertDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, definition);
    }

    #[test]
    fn input_conversion_applies_defaults_and_rejects_bad_time() {
        let json = serde_json::json!({
            "title": "Return file check",
            "message": "Confirm bank return files",
            "time": "10:15",
            "category_key": "return_files"
        });
        let input: AlertDefinitionInput = serde_json::from_value(json).unwrap();
        let definition = AlertDefinition::try_from(input.clone()).unwrap();
        assert_eq!(definition.trigger, TriggerTime::new(10, 15).unwrap());
        assert_eq!(definition.display_duration_ms, 10_000);
        assert!(!definition.checkable);

        let bad = AlertDefinitionInput {
            time: "25:00".to_string(),
            ..input
        };
        assert!(AlertDefinition::try_from(bad).is_err());
    }

    #[test]
    fn fire_event_visibility_window() {
        let definition = AlertDefinition::new("t", "m", TriggerTime::new(9, 0).unwrap(), "k")
            .displayed_for_ms(90_000);
        let event = AlertFireEvent::new(definition, at(14, 9, 0));
        assert_eq!(event.visible_until, at(14, 9, 1) + Duration::seconds(30));
    }
}
