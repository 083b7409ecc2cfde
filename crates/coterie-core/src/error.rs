//! Error types.
//!
//! One shared taxonomy for the whole engine. Every error is raised at the
//! point of detection and propagates unhandled to the API boundary, which
//! owns the translation from kind to user-facing status and payload. The
//! core never swallows one of these; mail dispatch is the single
//! best-effort exception and is handled where it occurs.
//!
//! # Example
//!
//! ```
//! use coterie_core::{CoterieError, Result};
//!
//! fn find_group(id: &str) -> Result<String> {
//!     if id.is_empty() {
//!         return Err(CoterieError::NotFound {
//!             resource: "Group".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("Group {}", id))
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

/// Standardized error type for the coterie engine.
///
/// Serializes tagged by `type` in `snake_case` so the API layer can map
/// each kind to a wire error without string matching.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoterieError {
    /// Requested resource was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g. "Group",
        /// "GroupInvitation").
        resource: String,
        /// Optional identifier of the resource.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The actor is a member of the group but lacks the required
    /// permission for the operation.
    #[error("Actor doesn't have the required permissions{}", operation.as_ref().map(|o| format!(" for operation '{o}'")).unwrap_or_default())]
    PermissionDenied {
        /// The operation that was denied, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
    },

    /// The actor has no relation to the group at all. Distinguished from
    /// [`CoterieError::PermissionDenied`] so the caller can show the right
    /// message.
    #[error("Actor doesn't belong to the group")]
    NotAMember,

    /// The resource already exists in the requested state, e.g. an
    /// invitation targets an email that already belongs to a member.
    #[error("{0}")]
    Conflict(String),

    /// Input validation failure, including a disallowed redirect hostname.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// The offending field, when known.
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Attempt to modify or delete something controlled by the protected
    /// super-admin account.
    #[error("The user {email} is a super admin and cannot be modified")]
    ImmutableSubject {
        /// The protected email address.
        email: String,
    },

    /// Token signature verification failed, or the token is stale or
    /// expired. Never conflated with [`CoterieError::NotFound`].
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// An invitation was accepted or rejected by a principal whose email
    /// does not match the invitation's target email.
    #[error("The invitation email does not match the actor's email")]
    EmailMismatch,

    /// The underlying transaction exceeded the database lock budget
    /// (`max_locks_per_transaction`).
    #[error("Exceeded the maximum number of database locks per transaction")]
    ResourceExhausted,

    /// A scope, subject, operation or action type tag is not registered.
    #[error("The instance type '{type_name}' is not registered")]
    InstanceTypeDoesNotExist {
        /// The unregistered tag.
        type_name: String,
    },

    /// Database fault. Carries the message only; the source error is logged
    /// at the point of conversion.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal invariant failure (e.g. params that fail to serialize).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoterieError {
    /// Shorthand for a [`CoterieError::NotFound`] without an id.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Shorthand for a [`CoterieError::NotFound`] with an id.
    pub fn not_found_id(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.to_string()),
        }
    }

    /// Shorthand for a [`CoterieError::PermissionDenied`] naming the
    /// operation.
    pub fn permission_denied(operation: impl Into<String>) -> Self {
        Self::PermissionDenied {
            operation: Some(operation.into()),
        }
    }

    /// Shorthand for a [`CoterieError::Validation`] without a field.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Shorthand for a [`CoterieError::Validation`] naming the field.
    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

/// Type alias for Results using [`CoterieError`].
pub type Result<T> = std::result::Result<T, CoterieError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let error = CoterieError::not_found("Group");
        assert_eq!(error.to_string(), "Group not found");

        let error = CoterieError::not_found_id("GroupInvitation", "abc-123");
        assert_eq!(error.to_string(), "GroupInvitation not found: abc-123");
    }

    #[test]
    fn test_permission_denied_display() {
        let error = CoterieError::PermissionDenied { operation: None };
        assert_eq!(
            error.to_string(),
            "Actor doesn't have the required permissions"
        );

        let error = CoterieError::permission_denied("group.create_invitation");
        assert!(error.to_string().contains("group.create_invitation"));
    }

    #[test]
    fn test_not_a_member_is_distinct_from_permission_denied() {
        let not_a_member = CoterieError::NotAMember;
        let denied = CoterieError::PermissionDenied { operation: None };
        let a = serde_json::to_value(&not_a_member).unwrap();
        let b = serde_json::to_value(&denied).unwrap();
        assert_eq!(a["type"], "not_a_member");
        assert_eq!(b["type"], "permission_denied");
    }

    #[test]
    fn test_token_invalid_is_distinct_from_not_found() {
        let invalid = CoterieError::TokenInvalid("bad signature".to_string());
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(json["type"], "token_invalid");
        assert!(invalid.to_string().contains("bad signature"));
    }

    #[test]
    fn test_immutable_subject_display() {
        let error = CoterieError::ImmutableSubject {
            email: "root@coterie.dev".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "The user root@coterie.dev is a super admin and cannot be modified"
        );
    }

    #[test]
    fn test_validation_serialization_skips_none_field() {
        let error = CoterieError::validation("Hostname is not allowed");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"validation\""));
        assert!(!json.contains("field"));

        let error = CoterieError::validation_field("Invalid email", "email");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"field\":\"email\""));
    }

    #[test]
    fn test_instance_type_does_not_exist_display() {
        let error = CoterieError::InstanceTypeDoesNotExist {
            type_name: "table".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "The instance type 'table' is not registered"
        );
    }

    #[test]
    fn test_question_mark_propagation() {
        fn inner() -> Result<()> {
            Err(CoterieError::EmailMismatch)
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        assert!(matches!(outer(), Err(CoterieError::EmailMismatch)));
    }

    #[test]
    fn test_is_std_error() {
        let error = CoterieError::ResourceExhausted;
        let _: &dyn std::error::Error = &error;
    }
}
