//! Group model.
//!
//! A group is the tenant/workspace boundary. It owns memberships,
//! invitations and scoped role assignments; the schema cascades those on
//! group deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A tenant/workspace boundary.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
    /// When the group was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Insert a new group.
    pub async fn create<'e, E>(executor: E, name: &str) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO groups (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            ",
        )
        .bind(name)
        .fetch_one(executor)
        .await
    }

    /// Insert a group with a caller-chosen ID, or rename it if the row
    /// already exists. Used by redo to restore a group under its original
    /// ID so existing scope strings keep pointing at it.
    pub async fn create_with_id<'e, E>(
        executor: E,
        id: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO groups (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id)
            DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            RETURNING id, name, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    /// Find a group by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, name, created_at, updated_at
            FROM groups
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Whether a group with the given ID exists.
    pub async fn exists<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM groups WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    /// Rename a group.
    pub async fn rename<'e, E>(
        executor: E,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            UPDATE groups
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Delete a group. Memberships, invitations and group-scoped role
    /// assignments cascade via the schema.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
