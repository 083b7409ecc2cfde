//! Group invitation model.
//!
//! An outstanding offer to join a group, addressed to a normalized email.
//! The `key` column is a monotonically increasing counter bumped on every
//! update; it is embedded in the signed token so tokens issued before an
//! edit stop verifying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use super::group_user::GroupPermission;

/// A pending, email-addressed offer of group membership.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GroupInvitation {
    /// Unique identifier.
    pub id: Uuid,
    /// The group the invitation grants access to.
    pub group_id: Uuid,
    /// The admin who created the invitation. NULL once that account is
    /// deleted; the invitation stays valid.
    pub invited_by: Option<Uuid>,
    /// Target email, normalized.
    pub email: String,
    /// Permission level granted on acceptance.
    pub permissions: GroupPermission,
    /// Optional personal message shown to the invitee.
    pub message: String,
    /// Monotonic counter bumped on every update; embedded in signed tokens
    /// to invalidate tokens issued before an edit.
    pub key: i64,
    /// When the invitation was created.
    pub created_at: DateTime<Utc>,
    /// When the invitation was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an invitation.
#[derive(Debug, Clone)]
pub struct CreateGroupInvitation {
    pub group_id: Uuid,
    pub invited_by: Uuid,
    /// Normalized email.
    pub email: String,
    pub permissions: GroupPermission,
    pub message: String,
}

/// Fields updatable on an invitation. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateGroupInvitation {
    /// New normalized email.
    pub email: Option<String>,
    pub permissions: Option<GroupPermission>,
    pub message: Option<String>,
}

impl GroupInvitation {
    /// Insert an invitation, or refresh the permissions/message of an
    /// existing one for the same (group, email). Refreshing bumps `key`.
    pub async fn create_or_refresh<'e, E>(
        executor: E,
        input: &CreateGroupInvitation,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO group_invitations
                (group_id, invited_by, email, permissions, message)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (group_id, email)
            DO UPDATE SET invited_by = EXCLUDED.invited_by,
                          permissions = EXCLUDED.permissions,
                          message = EXCLUDED.message,
                          key = group_invitations.key + 1,
                          updated_at = NOW()
            RETURNING id, group_id, invited_by, email, permissions, message, key,
                      created_at, updated_at
            ",
        )
        .bind(input.group_id)
        .bind(input.invited_by)
        .bind(&input.email)
        .bind(input.permissions)
        .bind(&input.message)
        .fetch_one(executor)
        .await
    }

    /// Find an invitation by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, invited_by, email, permissions, message, key,
                   created_at, updated_at
            FROM group_invitations
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Find an invitation by ID with a row-level exclusive lock.
    ///
    /// Uses `FOR UPDATE` so two admins editing or deleting the same
    /// invitation serialize; the lock is taken before the super-admin guard
    /// runs.
    pub async fn find_by_id_for_update<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, invited_by, email, permissions, message, key,
                   created_at, updated_at
            FROM group_invitations
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Find an invitation by its natural key. Undo/redo replays resolve
    /// invitations this way because the surrogate id changes when a row is
    /// recreated.
    pub async fn find_by_group_and_email<'e, E>(
        executor: E,
        group_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, invited_by, email, permissions, message, key,
                   created_at, updated_at
            FROM group_invitations
            WHERE group_id = $1 AND email = $2
            ",
        )
        .bind(group_id)
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// List the invitations of a group.
    pub async fn list_by_group<'e, E>(
        executor: E,
        group_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, invited_by, email, permissions, message, key,
                   created_at, updated_at
            FROM group_invitations
            WHERE group_id = $1
            ORDER BY created_at
            ",
        )
        .bind(group_id)
        .fetch_all(executor)
        .await
    }

    /// Apply the given field changes and bump `key`.
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        fields: &UpdateGroupInvitation,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            UPDATE group_invitations
            SET email = COALESCE($2, email),
                permissions = COALESCE($3, permissions),
                message = COALESCE($4, message),
                key = key + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, group_id, invited_by, email, permissions, message, key,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(fields.email.as_deref())
        .bind(fields.permissions)
        .bind(fields.message.as_deref())
        .fetch_optional(executor)
        .await
    }

    /// Delete an invitation.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM group_invitations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
