//! Action log and undo/redo engine.
//!
//! Every mutating handler in the engine appends an immutable [`Action`]
//! row describing how to invert itself. This crate supplies the generic
//! machinery: the [`ActionType`] trait concrete actions implement, the
//! startup-time [`ActionTypeRegistry`], the per-tenant scope strings, and
//! the [`ActionHandler`] that replays inverses (undo) or originals (redo).
//!
//! [`Action`]: coterie_db::models::Action

pub mod handler;
pub mod registry;
pub mod scopes;

pub use handler::ActionHandler;
pub use registry::{ActionType, ActionTypeRegistry};
pub use scopes::group_scope;
