//! Role assignment model.
//!
//! The authoritative mapping of (subject, group, scope) to a role. Subject
//! and scope are polymorphic (string tag + id) so the rows stay portable
//! across process restarts and schema evolution. At most one active row
//! exists per (subject, group, scope) tuple; the unique index backs the
//! upsert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A polymorphic reference to a role-assignment subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubjectRef {
    /// The subject's ID.
    pub id: Uuid,
    /// The subject's registered type tag (`"user"` or `"team"`).
    pub subject_type: &'static str,
}

impl SubjectRef {
    /// A user subject.
    #[must_use]
    pub fn user(id: Uuid) -> Self {
        Self {
            id,
            subject_type: "user",
        }
    }

    /// A team subject.
    #[must_use]
    pub fn team(id: Uuid) -> Self {
        Self {
            id,
            subject_type: "team",
        }
    }
}

/// One (subject, group, scope) → role row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Unique identifier.
    pub id: Uuid,
    /// The subject's ID.
    pub subject_id: Uuid,
    /// The subject's registered type tag.
    pub subject_type: String,
    /// The group the assignment lives in.
    pub group_id: Uuid,
    /// The scope's ID. For a group-level assignment this equals `group_id`.
    pub scope_id: Uuid,
    /// The scope's registered type tag.
    pub scope_type: String,
    /// The assigned role.
    pub role_id: Uuid,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last overwritten.
    pub updated_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// Upsert the role for a (subject, group, scope) tuple. Assigning a new
    /// role overwrites the previous one; applying identical arguments twice
    /// leaves a single row.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert<'e, E>(
        executor: E,
        subject_id: Uuid,
        subject_type: &str,
        group_id: Uuid,
        scope_id: Uuid,
        scope_type: &str,
        role_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO role_assignments
                (subject_id, subject_type, group_id, scope_id, scope_type, role_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subject_id, subject_type, group_id, scope_id, scope_type)
            DO UPDATE SET role_id = EXCLUDED.role_id, updated_at = NOW()
            RETURNING id, subject_id, subject_type, group_id, scope_id, scope_type,
                      role_id, created_at, updated_at
            ",
        )
        .bind(subject_id)
        .bind(subject_type)
        .bind(group_id)
        .bind(scope_id)
        .bind(scope_type)
        .bind(role_id)
        .fetch_one(executor)
        .await
    }

    /// Find the row for an exact (subject, group, scope) tuple.
    pub async fn find<'e, E>(
        executor: E,
        subject_id: Uuid,
        subject_type: &str,
        group_id: Uuid,
        scope_id: Uuid,
        scope_type: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, subject_id, subject_type, group_id, scope_id, scope_type,
                   role_id, created_at, updated_at
            FROM role_assignments
            WHERE subject_id = $1 AND subject_type = $2 AND group_id = $3
              AND scope_id = $4 AND scope_type = $5
            ",
        )
        .bind(subject_id)
        .bind(subject_type)
        .bind(group_id)
        .bind(scope_id)
        .bind(scope_type)
        .fetch_optional(executor)
        .await
    }

    /// Delete the row for an exact (subject, group, scope) tuple. Removing
    /// a non-existent assignment is a no-op; the caller treats a zero row
    /// count as success.
    pub async fn delete<'e, E>(
        executor: E,
        subject_id: Uuid,
        subject_type: &str,
        group_id: Uuid,
        scope_id: Uuid,
        scope_type: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            DELETE FROM role_assignments
            WHERE subject_id = $1 AND subject_type = $2 AND group_id = $3
              AND scope_id = $4 AND scope_type = $5
            ",
        )
        .bind(subject_id)
        .bind(subject_type)
        .bind(group_id)
        .bind(scope_id)
        .bind(scope_type)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List every assignment in a group.
    pub async fn list_by_group<'e, E>(
        executor: E,
        group_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, subject_id, subject_type, group_id, scope_id, scope_type,
                   role_id, created_at, updated_at
            FROM role_assignments
            WHERE group_id = $1
            ORDER BY created_at
            ",
        )
        .bind(group_id)
        .fetch_all(executor)
        .await
    }

    /// Delete every assignment held by a subject, across all groups. Used
    /// by the account-deletion cascade.
    pub async fn delete_for_subject<'e, E>(
        executor: E,
        subject_id: Uuid,
        subject_type: &str,
    ) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "DELETE FROM role_assignments WHERE subject_id = $1 AND subject_type = $2",
        )
        .bind(subject_id)
        .bind(subject_type)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_ref_constructors() {
        let id = Uuid::new_v4();
        assert_eq!(SubjectRef::user(id).subject_type, "user");
        assert_eq!(SubjectRef::team(id).subject_type, "team");
        assert_eq!(SubjectRef::user(id).id, id);
    }

    #[test]
    fn test_subject_ref_equality() {
        let id = Uuid::new_v4();
        assert_eq!(SubjectRef::user(id), SubjectRef::user(id));
        assert_ne!(SubjectRef::user(id), SubjectRef::team(id));
    }
}
