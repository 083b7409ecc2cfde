//! User model.
//!
//! Accounts are provisioned elsewhere; this model carries the fields the
//! engine needs: identity, normalized email and active flag. Account
//! deletion cascades to memberships, role assignments and team links, but
//! actions recorded by the user are retained for audit (`user_id` is set
//! to NULL by the schema).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A user account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Normalized email address.
    pub email: String,
    /// Whether the account is active.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Find a user by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, email, is_active, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Find a user by normalized email.
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, email, is_active, created_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(executor)
        .await
    }

    /// Whether a user with the given ID exists.
    pub async fn exists<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    /// Delete a user account. Memberships and team links cascade via the
    /// schema; polymorphic role-assignment rows are removed explicitly by
    /// the caller inside the same transaction.
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
