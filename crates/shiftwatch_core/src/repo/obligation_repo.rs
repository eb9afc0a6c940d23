//! Obligation repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/read/fulfill APIs over canonical `obligations` storage.
//! - Keep SQL details inside the ledger persistence boundary.
//!
//! # Invariants
//! - Write paths call `Obligation::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Fulfillment is a one-way transition; repeating it is an error.
//! - List results are ordered by `created_at ASC` (insertion order on ties).

use crate::db::DbError;
use crate::model::obligation::{Obligation, ObligationId, ObligationValidationError};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const OBLIGATION_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    originated_on,
    label,
    expected_return_on,
    fulfilled,
    fulfilled_on,
    notes,
    created_at,
    updated_at
FROM obligations";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for obligation persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ObligationValidationError),
    Db(DbError),
    NotFound(ObligationId),
    AlreadyFulfilled(ObligationId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "obligation not found: {id}"),
            Self::AlreadyFulfilled(id) => write!(f, "obligation already fulfilled: {id}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted obligation data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::AlreadyFulfilled(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ObligationValidationError> for RepoError {
    fn from(value: ObligationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Expected-return filter applied to unfulfilled obligation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DueFilter {
    #[default]
    Any,
    /// Expected return equals the date.
    On(NaiveDate),
    /// Expected return strictly before the date.
    Before(NaiveDate),
}

/// Fulfillment request applied by `mark_fulfilled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub fulfilled_on: NaiveDate,
    pub notes: Option<String>,
    /// Unix epoch milliseconds written to `updated_at`.
    pub recorded_at: i64,
}

/// Repository interface for obligation storage.
pub trait ObligationRepository {
    fn create_obligation(&self, obligation: &Obligation) -> RepoResult<ObligationId>;
    fn get_obligation(&self, id: ObligationId) -> RepoResult<Option<Obligation>>;
    fn list_unfulfilled(&self, owner_id: &str, filter: DueFilter) -> RepoResult<Vec<Obligation>>;
    fn mark_fulfilled(&self, id: ObligationId, fulfillment: &Fulfillment)
        -> RepoResult<Obligation>;
}

/// SQLite-backed obligation repository.
pub struct SqliteObligationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObligationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ObligationRepository for SqliteObligationRepository<'_> {
    fn create_obligation(&self, obligation: &Obligation) -> RepoResult<ObligationId> {
        obligation.validate()?;

        self.conn.execute(
            "INSERT INTO obligations (
                id,
                owner_id,
                originated_on,
                label,
                expected_return_on,
                fulfilled,
                fulfilled_on,
                notes,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                obligation.id.to_string(),
                obligation.owner_id.as_str(),
                date_to_db(obligation.originated_on),
                obligation.label.as_str(),
                date_to_db(obligation.expected_return_on),
                bool_to_int(obligation.fulfilled),
                obligation.fulfilled_on.map(date_to_db),
                obligation.notes.as_deref(),
                obligation.created_at,
                obligation.updated_at,
            ],
        )?;

        Ok(obligation.id)
    }

    fn get_obligation(&self, id: ObligationId) -> RepoResult<Option<Obligation>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{OBLIGATION_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_obligation_row(row)?));
        }

        Ok(None)
    }

    fn list_unfulfilled(&self, owner_id: &str, filter: DueFilter) -> RepoResult<Vec<Obligation>> {
        let mut sql = format!("{OBLIGATION_SELECT_SQL} WHERE owner_id = ? AND fulfilled = 0");
        let mut bind_values: Vec<Value> = vec![Value::Text(owner_id.to_string())];

        match filter {
            DueFilter::Any => {}
            DueFilter::On(date) => {
                sql.push_str(" AND expected_return_on = ?");
                bind_values.push(Value::Text(date_to_db(date)));
            }
            DueFilter::Before(date) => {
                sql.push_str(" AND expected_return_on < ?");
                bind_values.push(Value::Text(date_to_db(date)));
            }
        }

        sql.push_str(" ORDER BY created_at ASC, rowid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut obligations = Vec::new();

        while let Some(row) = rows.next()? {
            obligations.push(parse_obligation_row(row)?);
        }

        Ok(obligations)
    }

    fn mark_fulfilled(
        &self,
        id: ObligationId,
        fulfillment: &Fulfillment,
    ) -> RepoResult<Obligation> {
        let mut obligation = self.get_obligation(id)?.ok_or(RepoError::NotFound(id))?;
        if obligation.fulfilled {
            return Err(RepoError::AlreadyFulfilled(id));
        }

        obligation.fulfilled = true;
        obligation.fulfilled_on = Some(fulfillment.fulfilled_on);
        obligation.notes = fulfillment.notes.clone().or(obligation.notes);
        obligation.updated_at = fulfillment.recorded_at;
        obligation.validate()?;

        // `fulfilled = 0` guard keeps the transition one-way under races.
        let changed = self.conn.execute(
            "UPDATE obligations
             SET
                fulfilled = 1,
                fulfilled_on = ?1,
                notes = ?2,
                updated_at = ?3
             WHERE id = ?4 AND fulfilled = 0;",
            params![
                obligation.fulfilled_on.map(date_to_db),
                obligation.notes.as_deref(),
                obligation.updated_at,
                id.to_string(),
            ],
        )?;

        if changed == 0 {
            let exists = self
                .conn
                .query_row(
                    "SELECT 1 FROM obligations WHERE id = ?1;",
                    [id.to_string()],
                    |_| Ok(()),
                )
                .optional()?;
            return Err(match exists {
                Some(()) => RepoError::AlreadyFulfilled(id),
                None => RepoError::NotFound(id),
            });
        }

        Ok(obligation)
    }
}

fn parse_obligation_row(row: &Row<'_>) -> RepoResult<Obligation> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{id_text}` in obligations.id"))
    })?;

    let fulfilled = match row.get::<_, i64>("fulfilled")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid fulfilled value `{other}` in obligations.fulfilled"
            )));
        }
    };

    let fulfilled_on = match row.get::<_, Option<String>>("fulfilled_on")? {
        Some(value) => Some(parse_db_date(&value, "fulfilled_on")?),
        None => None,
    };

    let obligation = Obligation {
        id,
        owner_id: row.get("owner_id")?,
        originated_on: parse_db_date(&row.get::<_, String>("originated_on")?, "originated_on")?,
        label: row.get("label")?,
        expected_return_on: parse_db_date(
            &row.get::<_, String>("expected_return_on")?,
            "expected_return_on",
        )?,
        fulfilled,
        fulfilled_on,
        notes: row.get("notes")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    obligation.validate()?;
    Ok(obligation)
}

fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_db_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{value}` in obligations.{column}"))
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
