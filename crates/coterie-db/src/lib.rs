//! Postgres models for the coterie collaboration engine.
//!
//! Every model is a `FromRow` struct with inherent async methods that take
//! a [`sqlx::PgExecutor`] (or a pool where no transactional composition is
//! needed), so callers can run several model operations inside one
//! transaction. The expected schema is documented in `schema.sql` at the
//! crate root; migrations tooling is out of scope.

pub mod error;
pub mod models;

pub use error::is_max_locks_exceeded;
