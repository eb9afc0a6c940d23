//! Obligation domain model.
//!
//! # Responsibility
//! - Define the record tracked for a deferred return confirmation.
//! - Provide the single unfulfilled -> fulfilled transition.
//!
//! # Invariants
//! - `id` is stable and never reused for another obligation.
//! - `fulfilled == fulfilled_on.is_some()`.
//! - `expected_return_on` is a business day strictly after `originated_on`.
//! - Fulfillment is monotonic; there is no way back to unfulfilled.

use crate::calendar::is_business_day;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for one tracked obligation.
pub type ObligationId = Uuid;

/// Validation failures for obligation invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObligationValidationError {
    NilId,
    BlankOwner,
    BlankLabel,
    /// Expected return is not strictly after the origination date.
    DeadlineNotAfterOrigin {
        originated_on: NaiveDate,
        expected_return_on: NaiveDate,
    },
    /// Expected return falls on a weekend.
    DeadlineNotBusinessDay(NaiveDate),
    /// `fulfilled` flag and `fulfilled_on` disagree.
    FulfillmentMismatch { fulfilled: bool },
    FulfilledBeforeOrigin {
        originated_on: NaiveDate,
        fulfilled_on: NaiveDate,
    },
}

impl Display for ObligationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "obligation id must not be nil"),
            Self::BlankOwner => write!(f, "obligation owner must not be blank"),
            Self::BlankLabel => write!(f, "obligation label must not be blank"),
            Self::DeadlineNotAfterOrigin {
                originated_on,
                expected_return_on,
            } => write!(
                f,
                "expected return {expected_return_on} must be after origination {originated_on}"
            ),
            Self::DeadlineNotBusinessDay(date) => {
                write!(f, "expected return {date} is not a business day")
            }
            Self::FulfillmentMismatch { fulfilled } => write!(
                f,
                "fulfilled={fulfilled} disagrees with presence of a fulfillment date"
            ),
            Self::FulfilledBeforeOrigin {
                originated_on,
                fulfilled_on,
            } => write!(
                f,
                "fulfillment {fulfilled_on} precedes origination {originated_on}"
            ),
        }
    }
}

impl Error for ObligationValidationError {}

/// A deferred return confirmation owed by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    pub id: ObligationId,
    pub owner_id: String,
    /// Date the originating action (file/batch submission) happened.
    pub originated_on: NaiveDate,
    /// Source file or batch name.
    pub label: String,
    pub expected_return_on: NaiveDate,
    pub fulfilled: bool,
    pub fulfilled_on: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Obligation {
    /// Creates an unfulfilled obligation with a generated id.
    ///
    /// The caller supplies an already-resolved `expected_return_on`; see
    /// `deadline::resolve_expected_return`.
    pub fn new(
        owner_id: impl Into<String>,
        originated_on: NaiveDate,
        label: impl Into<String>,
        expected_return_on: NaiveDate,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            originated_on,
            label: label.into(),
            expected_return_on,
            fulfilled: false,
            fulfilled_on: None,
            notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Validates obligation invariants before persistence or after read-back.
    pub fn validate(&self) -> Result<(), ObligationValidationError> {
        if self.id.is_nil() {
            return Err(ObligationValidationError::NilId);
        }
        if self.owner_id.trim().is_empty() {
            return Err(ObligationValidationError::BlankOwner);
        }
        if self.label.trim().is_empty() {
            return Err(ObligationValidationError::BlankLabel);
        }
        if self.expected_return_on <= self.originated_on {
            return Err(ObligationValidationError::DeadlineNotAfterOrigin {
                originated_on: self.originated_on,
                expected_return_on: self.expected_return_on,
            });
        }
        if !is_business_day(self.expected_return_on) {
            return Err(ObligationValidationError::DeadlineNotBusinessDay(
                self.expected_return_on,
            ));
        }
        if self.fulfilled != self.fulfilled_on.is_some() {
            return Err(ObligationValidationError::FulfillmentMismatch {
                fulfilled: self.fulfilled,
            });
        }
        if let Some(fulfilled_on) = self.fulfilled_on {
            if fulfilled_on < self.originated_on {
                return Err(ObligationValidationError::FulfilledBeforeOrigin {
                    originated_on: self.originated_on,
                    fulfilled_on,
                });
            }
        }
        Ok(())
    }

    /// Returns whether the return confirmation is still outstanding.
    pub fn is_pending(&self) -> bool {
        !self.fulfilled
    }
}
