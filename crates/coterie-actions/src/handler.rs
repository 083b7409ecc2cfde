//! Undo/redo dispatch.
//!
//! Each action toggles between performed and undone without bound:
//! Performed -> Undone -> Redone -> Undone -> ... A failed replay (most
//! commonly a permission denial, since both undo and redo re-check
//! permissions as of now) propagates the error and leaves the log row in
//! its prior state; the engine blocks rather than report-and-skip.
//!
//! A replay runs inside one transaction: the inverse mutation and the
//! `undone_at` stamp commit together, so the log can never claim a state
//! the data does not have.

use std::sync::Arc;

use sqlx::PgPool;

use coterie_core::Result;
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{Action, User};

use crate::registry::ActionTypeRegistry;

/// Replays the most recent action of a scope in either direction.
#[derive(Clone)]
pub struct ActionHandler {
    pool: PgPool,
    registry: Arc<ActionTypeRegistry>,
}

impl ActionHandler {
    /// Creates a handler over the given pool and registry.
    #[must_use]
    pub fn new(pool: PgPool, registry: Arc<ActionTypeRegistry>) -> Self {
        Self { pool, registry }
    }

    /// Undoes the most recent non-undone action in the scope.
    ///
    /// Returns `Ok(None)` when the scope has no undoable history. The
    /// `undone_at` stamp is only written after the inverse mutation
    /// succeeded.
    pub async fn undo(&self, actor: &User, scope: &str) -> Result<Option<Action>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let Some(action) = Action::find_latest_undoable(&mut *tx, scope)
            .await
            .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let action_type = self.registry.get(&action.action_type)?;
        action_type
            .undo(&mut tx, actor, action.params.clone(), &action)
            .await?;

        Action::mark_undone(&mut *tx, action.id)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            action_id = %action.id,
            action_type = %action.action_type,
            scope = %scope,
            actor_id = %actor.id,
            "action undone"
        );

        Ok(Some(action))
    }

    /// Redoes the most recently undone action in the scope.
    ///
    /// Returns `Ok(None)` when nothing in the scope is undone.
    pub async fn redo(&self, actor: &User, scope: &str) -> Result<Option<Action>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let Some(action) = Action::find_latest_redoable(&mut *tx, scope)
            .await
            .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let action_type = self.registry.get(&action.action_type)?;
        action_type
            .redo(&mut tx, actor, action.params.clone(), &action)
            .await?;

        Action::mark_redone(&mut *tx, action.id)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            action_id = %action.id,
            action_type = %action.action_type,
            scope = %scope,
            actor_id = %actor.id,
            "action redone"
        );

        Ok(Some(action))
    }

    /// The audit trail of a scope, newest first.
    pub async fn list(&self, scope: &str, limit: i64) -> Result<Vec<Action>> {
        Action::list_by_scope(&self.pool, scope, limit)
            .await
            .map_err(map_sqlx_error)
    }
}
