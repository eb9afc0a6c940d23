//! SQLite binding for `ObligationLedger`.
//!
//! # Invariants
//! - Every SQL call runs on tokio's blocking pool, never on the scheduling
//!   thread.
//! - One connection is shared behind a mutex; the mutex is private to this
//!   binding and never held across an await point.

use super::{LedgerError, LedgerResult, ObligationLedger};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::deadline::resolve_expected_return;
use crate::model::obligation::{Obligation, ObligationId};
use crate::repo::obligation_repo::{
    DueFilter, Fulfillment, ObligationRepository, RepoResult, SqliteObligationRepository,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Ledger backed by a single SQLite connection.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Wraps an already-migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens (and migrates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    async fn with_repo<T, F>(&self, op: &'static str, f: F) -> LedgerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteObligationRepository<'_>) -> RepoResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let started_at = Instant::now();

        let joined = tokio::task::spawn_blocking(move || -> LedgerResult<T> {
            let guard = conn
                .lock()
                .map_err(|_| LedgerError::FetchFailed("ledger connection poisoned".to_string()))?;
            let repo = SqliteObligationRepository::new(&guard);
            f(&repo).map_err(LedgerError::from)
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(err) => Err(LedgerError::FetchFailed(format!("ledger task failed: {err}"))),
        };

        match &result {
            Ok(_) => info!(
                "event={op} module=ledger status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event={op} module=ledger status=error duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }
}

#[async_trait]
impl ObligationLedger for SqliteLedger {
    async fn insert_obligation(
        &self,
        owner_id: &str,
        originated_on: NaiveDate,
        label: &str,
    ) -> LedgerResult<Obligation> {
        let expected_return_on = resolve_expected_return(originated_on)?;
        let obligation = Obligation::new(
            owner_id.trim(),
            originated_on,
            label.trim(),
            expected_return_on,
            Utc::now().timestamp_millis(),
        );

        self.with_repo("ledger_insert", move |repo| {
            repo.create_obligation(&obligation)?;
            Ok(obligation)
        })
        .await
    }

    async fn get_obligation(&self, id: ObligationId) -> LedgerResult<Option<Obligation>> {
        self.with_repo("ledger_get", move |repo| repo.get_obligation(id))
            .await
    }

    async fn query_unfulfilled(&self, owner_id: &str) -> LedgerResult<Vec<Obligation>> {
        let owner_id = owner_id.to_string();
        self.with_repo("ledger_fetch", move |repo| {
            repo.list_unfulfilled(&owner_id, DueFilter::Any)
        })
        .await
    }

    async fn query_unfulfilled_due_on(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>> {
        let owner_id = owner_id.to_string();
        self.with_repo("ledger_fetch", move |repo| {
            repo.list_unfulfilled(&owner_id, DueFilter::On(date))
        })
        .await
    }

    async fn query_unfulfilled_before(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<Obligation>> {
        let owner_id = owner_id.to_string();
        self.with_repo("ledger_fetch", move |repo| {
            repo.list_unfulfilled(&owner_id, DueFilter::Before(date))
        })
        .await
    }

    async fn mark_fulfilled(
        &self,
        id: ObligationId,
        fulfilled_on: NaiveDate,
        notes: Option<String>,
    ) -> LedgerResult<Obligation> {
        let fulfillment = Fulfillment {
            fulfilled_on,
            notes: notes
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            recorded_at: Utc::now().timestamp_millis(),
        };
        self.with_repo("ledger_fulfill", move |repo| {
            repo.mark_fulfilled(id, &fulfillment)
        })
        .await
    }
}
