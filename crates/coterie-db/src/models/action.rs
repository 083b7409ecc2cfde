//! Action audit-log model.
//!
//! Every mutating operation appends one immutable row: a type tag, the
//! serialized parameter snapshot needed to invert it, and a scope string
//! partitioning undo history per tenant. `undone_at` drives the undo/redo
//! toggle: set on undo, cleared on redo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// An audited, invertible record of one mutating operation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier.
    pub id: Uuid,
    /// The actor who performed the operation. NULL once that account is
    /// deleted; the audit record is retained.
    pub user_id: Option<Uuid>,
    /// Registered action type tag, e.g. `"assign_role"`.
    pub action_type: String,
    /// Serialized parameter snapshot sufficient to invert the operation.
    pub params: JsonValue,
    /// Scope string partitioning undo history, e.g. `group_<uuid>`.
    pub scope: String,
    /// When the operation was performed.
    pub created_at: DateTime<Utc>,
    /// Set while the action is in the undone state.
    pub undone_at: Option<DateTime<Utc>>,
}

/// Input for appending an action.
#[derive(Debug, Clone)]
pub struct CreateAction {
    pub user_id: Uuid,
    pub action_type: String,
    pub params: JsonValue,
    pub scope: String,
}

impl Action {
    /// Whether the action currently sits in the undone state.
    #[must_use]
    pub fn is_undone(&self) -> bool {
        self.undone_at.is_some()
    }

    /// Append an action row. Runs on the caller's executor so the entry
    /// commits atomically with the mutation it records.
    pub async fn create<'e, E>(executor: E, input: CreateAction) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO actions (user_id, action_type, params, scope)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, action_type, params, scope, created_at, undone_at
            ",
        )
        .bind(input.user_id)
        .bind(&input.action_type)
        .bind(&input.params)
        .bind(&input.scope)
        .fetch_one(executor)
        .await
    }

    /// The most recent action in the scope that has not been undone.
    pub async fn find_latest_undoable<'e, E>(
        executor: E,
        scope: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, user_id, action_type, params, scope, created_at, undone_at
            FROM actions
            WHERE scope = $1 AND undone_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            ",
        )
        .bind(scope)
        .fetch_optional(executor)
        .await
    }

    /// The most recently undone action in the scope.
    pub async fn find_latest_redoable<'e, E>(
        executor: E,
        scope: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, user_id, action_type, params, scope, created_at, undone_at
            FROM actions
            WHERE scope = $1 AND undone_at IS NOT NULL
            ORDER BY undone_at DESC, created_at DESC
            LIMIT 1
            ",
        )
        .bind(scope)
        .fetch_optional(executor)
        .await
    }

    /// Stamp the action as undone.
    pub async fn mark_undone<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE actions SET undone_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Clear the undone stamp after a redo.
    pub async fn mark_redone<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query("UPDATE actions SET undone_at = NULL WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// List the audit trail of a scope, newest first.
    pub async fn list_by_scope<'e, E>(
        executor: E,
        scope: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, user_id, action_type, params, scope, created_at, undone_at
            FROM actions
            WHERE scope = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(scope)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_undone() {
        let mut action = Action {
            id: Uuid::new_v4(),
            user_id: Some(Uuid::new_v4()),
            action_type: "assign_role".to_string(),
            params: serde_json::json!({}),
            scope: "group_x".to_string(),
            created_at: Utc::now(),
            undone_at: None,
        };
        assert!(!action.is_undone());
        action.undone_at = Some(Utc::now());
        assert!(action.is_undone());
    }
}
