//! Obligation ledger boundary consumed by the alert engine.
//!
//! # Responsibility
//! - Define the async use-case contract the poll loop and CLI depend on.
//! - Resolve expected-return deadlines before anything is persisted.
//!
//! # Invariants
//! - The ledger is the sole authority for obligation state; callers never
//!   cache results across evaluation passes.
//! - `insert_obligation` always stores a resolved business-day deadline.

mod sqlite;

pub use sqlite::SqliteLedger;

use crate::calendar::CalendarError;
use crate::model::obligation::{Obligation, ObligationId};
use crate::repo::obligation_repo::RepoError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger failures surfaced to the engine.
#[derive(Debug)]
pub enum LedgerError {
    /// Storage could not be reached or the backing task failed.
    FetchFailed(String),
    Repo(RepoError),
    Calendar(CalendarError),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FetchFailed(message) => write!(f, "ledger fetch failed: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Calendar(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::FetchFailed(_) => None,
            Self::Repo(err) => Some(err),
            Self::Calendar(err) => Some(err),
        }
    }
}

impl From<RepoError> for LedgerError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CalendarError> for LedgerError {
    fn from(value: CalendarError) -> Self {
        Self::Calendar(value)
    }
}

/// Async obligation store used by the poll loop and administrative callers.
#[async_trait]
pub trait ObligationLedger: Send + Sync {
    /// Records a new obligation, resolving its expected-return date first.
    async fn insert_obligation(
        &self,
        owner_id: &str,
        originated_on: NaiveDate,
        label: &str,
    ) -> LedgerResult<Obligation>;

    async fn get_obligation(&self, id: ObligationId) -> LedgerResult<Option<Obligation>>;

    /// All unfulfilled obligations of `owner_id`, oldest first.
    async fn query_unfulfilled(&self, owner_id: &str) -> LedgerResult<Vec<Obligation>>;

    async fn query_unfulfilled_due_on(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>>;

    async fn query_unfulfilled_before(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>>;

    /// Flips an obligation to fulfilled. Fails if it already is.
    async fn mark_fulfilled(
        &self,
        id: ObligationId,
        fulfilled_on: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<Obligation>;
}
