//! Coterie core library.
//!
//! Shared types for the coterie collaboration engine.
//!
//! # Modules
//!
//! - [`error`] - The shared error taxonomy (`CoterieError`)
//! - [`email`] - Email normalization and super-admin detection
//! - [`config`] - Environment-driven runtime configuration

pub mod config;
pub mod email;
pub mod error;

pub use config::{CoterieConfig, DEFAULT_INVITATION_TTL_DAYS};
pub use email::{normalize_email_address, SuperAdmins};
pub use error::{CoterieError, Result};
