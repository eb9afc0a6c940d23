//! Time-of-day alert catalog and evaluation.
//!
//! # Responsibility
//! - `catalog`: process-lifetime registry of alert definitions.
//! - `evaluator`: pure filters deciding which alerts and obligations are due.
//!
//! # Invariants
//! - Evaluation never mutates the catalog or the ledger.

pub mod catalog;
pub mod evaluator;
