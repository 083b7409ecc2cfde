//! Database error classification.

use coterie_core::CoterieError;
use sqlx::error::ErrorKind;

/// Postgres message emitted when `max_locks_per_transaction` is exceeded.
/// The server reports SQLSTATE 53200 (out of shared memory) with a hint
/// naming the setting, so the hint text is the reliable discriminator.
const MAX_LOCKS_HINT: &str = "You might need to increase max_locks_per_transaction";

/// Returns whether the given sqlx error is due to the transaction lock
/// budget being exceeded.
#[must_use]
pub fn is_max_locks_exceeded(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.message().contains(MAX_LOCKS_HINT),
        _ => false,
    }
}

/// Converts a sqlx error into the shared taxonomy: lock-budget exhaustion
/// becomes `ResourceExhausted`, a unique-constraint violation becomes
/// `Conflict` (e.g. updating an invitation's email onto one that already
/// has an invitation in the group), everything else is `Database`.
#[must_use]
pub fn map_sqlx_error(error: sqlx::Error) -> CoterieError {
    if is_max_locks_exceeded(&error) {
        return CoterieError::ResourceExhausted;
    }
    if let sqlx::Error::Database(db) = &error {
        if matches!(db.kind(), ErrorKind::UniqueViolation) {
            return CoterieError::Conflict(db.message().to_string());
        }
    }
    tracing::error!(error = %error, "database error");
    CoterieError::Database(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;

    #[derive(Debug)]
    struct StubDbError {
        message: String,
        kind: ErrorKind,
    }

    impl StubDbError {
        fn new(message: &str, kind: ErrorKind) -> sqlx::Error {
            sqlx::Error::Database(Box::new(Self {
                message: message.to_string(),
                kind,
            }))
        }
    }

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.message)
        }
    }

    impl StdError for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            &self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            None
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.kind {
                ErrorKind::UniqueViolation => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let err = StubDbError::new(
            "duplicate key value violates unique constraint \"group_invitations_group_id_email_key\"",
            ErrorKind::UniqueViolation,
        );
        let mapped = map_sqlx_error(err);
        assert!(matches!(mapped, CoterieError::Conflict(msg) if msg.contains("duplicate key")));
    }

    #[test]
    fn test_max_locks_hint_maps_to_resource_exhausted() {
        let err = StubDbError::new(
            "out of shared memory. You might need to increase max_locks_per_transaction.",
            ErrorKind::Other,
        );
        assert!(is_max_locks_exceeded(&err));
        assert!(matches!(
            map_sqlx_error(err),
            CoterieError::ResourceExhausted
        ));
    }

    #[test]
    fn test_non_database_error_is_not_lock_exhaustion() {
        let err = sqlx::Error::RowNotFound;
        assert!(!is_max_locks_exceeded(&err));
    }

    #[test]
    fn test_other_errors_map_to_database() {
        let mapped = map_sqlx_error(sqlx::Error::RowNotFound);
        match mapped {
            CoterieError::Database(msg) => assert!(!msg.is_empty()),
            other => panic!("expected Database, got {other:?}"),
        }
    }
}
