//! Domain model for obligations and time-triggered alerts.
//!
//! # Responsibility
//! - Define canonical data structures shared by storage, evaluation and
//!   presentation layers.
//!
//! # Invariants
//! - Every obligation is identified by a stable `ObligationId`.
//! - Obligations are never hard-deleted by the engine.
//! - Alert definitions carry a valid 24-hour trigger time.

pub mod alert;
pub mod obligation;
