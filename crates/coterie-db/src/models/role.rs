//! Role model.
//!
//! Roles are immutable, globally defined permission bundles identified by a
//! stable `uid`. They are seeded elsewhere; this engine only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A named, immutable bundle of operation permissions.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier.
    pub id: Uuid,
    /// Stable unique identifier, e.g. `"VIEWER"` or `"BUILDER"`. Actions
    /// reference roles by uid so undo/redo params survive reseeding.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Operation names this role grants.
    pub operations: Vec<String>,
    /// When the role was seeded.
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Find a role by its stable uid.
    pub async fn find_by_uid<'e, E>(executor: E, uid: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, uid, name, operations, created_at
            FROM roles
            WHERE uid = $1
            ",
        )
        .bind(uid)
        .fetch_optional(executor)
        .await
    }

    /// Find a role by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, uid, name, operations, created_at
            FROM roles
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// List all seeded roles.
    pub async fn list<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, uid, name, operations, created_at
            FROM roles
            ORDER BY uid
            ",
        )
        .fetch_all(executor)
        .await
    }

    /// Whether this role grants the given operation.
    #[must_use]
    pub fn grants(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op == operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(operations: &[&str]) -> Role {
        Role {
            id: Uuid::new_v4(),
            uid: "VIEWER".to_string(),
            name: "Viewer".to_string(),
            operations: operations.iter().map(ToString::to_string).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_grants_listed_operation() {
        let role = role(&["group.read", "group.list_invitations"]);
        assert!(role.grants("group.read"));
        assert!(role.grants("group.list_invitations"));
    }

    #[test]
    fn test_does_not_grant_unlisted_operation() {
        let role = role(&["group.read"]);
        assert!(!role.grants("group.assign_role"));
    }

    #[test]
    fn test_empty_role_grants_nothing() {
        let role = role(&[]);
        assert!(!role.grants("group.read"));
    }
}
