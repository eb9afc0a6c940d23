//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define synchronous data access contracts for obligations.
//! - Isolate SQLite query details from ledger and evaluation code.
//!
//! # Invariants
//! - Repository writes enforce `Obligation::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyFulfilled`)
//!   in addition to DB transport errors.

pub mod obligation_repo;
