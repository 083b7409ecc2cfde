//! The reversible role-assignment action.
//!
//! `perform` captures the previous role uid alongside the new one so undo
//! can re-apply the previous value and redo the new one, with both
//! replays re-checking permissions as of replay time.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use coterie_actions::{group_scope, ActionType};
use coterie_core::{CoterieError, Result};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{Action, CreateAction, Role, RoleAssignment, SubjectRef, User};

use crate::operations::ops;
use crate::permissions::PermissionChecker;
use crate::resolver::ScopeRef;
use crate::roles::RoleAssignmentHandler;

/// Everything needed to invert one role assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRoleParams {
    pub subject_id: Uuid,
    pub subject_type: String,
    pub group_id: Uuid,
    /// The newly assigned role uid, `None` for a removal.
    pub role_uid: Option<String>,
    /// The role uid before this action, `None` when there was none.
    pub original_role_uid: Option<String>,
    pub scope_id: Uuid,
    pub scope_type: String,
}

/// Assigns a role to a subject in a group over a scope, reversibly.
pub struct AssignRoleActionType {
    pool: PgPool,
    checker: Arc<PermissionChecker>,
    handler: RoleAssignmentHandler,
}

impl AssignRoleActionType {
    /// Stable action type tag.
    pub const TYPE: &'static str = "assign_role";

    /// Creates the action type with its collaborators.
    #[must_use]
    pub fn new(pool: PgPool, checker: Arc<PermissionChecker>, handler: RoleAssignmentHandler) -> Self {
        Self {
            pool,
            checker,
            handler,
        }
    }

    /// Assigns `role` to `subject` in the group over `scope` (`None` role
    /// removes the assignment; `None` scope means the group itself), and
    /// appends the reversible log entry in the same transaction.
    pub async fn perform(
        &self,
        actor: &User,
        subject: SubjectRef,
        group_id: Uuid,
        role: Option<&Role>,
        scope: Option<ScopeRef>,
    ) -> Result<Option<RoleAssignment>> {
        self.checker
            .check_permissions(actor, ops::ASSIGN_ROLE, group_id)
            .await?;

        let scope = RoleAssignmentHandler::effective_scope(group_id, scope);

        let previous = self
            .handler
            .get_current_role_assignment(subject, group_id, Some(scope.clone()))
            .await?;
        let original_role_uid = match previous {
            Some(ref assignment) => self.role_uid_by_id(assignment.role_id).await?,
            None => None,
        };

        let params = AssignRoleParams {
            subject_id: subject.id,
            subject_type: subject.subject_type.to_string(),
            group_id,
            role_uid: role.map(|r| r.uid.clone()),
            original_role_uid,
            scope_id: scope.scope_id,
            scope_type: scope.scope_type.clone(),
        };

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let assignment = self
            .handler
            .assign_role(&mut *tx, subject, group_id, role, Some(scope))
            .await?;

        Action::create(
            &mut *tx,
            CreateAction {
                user_id: actor.id,
                action_type: Self::TYPE.to_string(),
                params: encode_params(&params)?,
                scope: group_scope(group_id),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(assignment)
    }

    async fn role_uid_by_id(&self, role_id: Uuid) -> Result<Option<String>> {
        Ok(Role::find_by_id(&self.pool, role_id)
            .await
            .map_err(map_sqlx_error)?
            .map(|r| r.uid))
    }

    async fn role_by_uid(&self, uid: &str) -> Result<Role> {
        Role::find_by_uid(&self.pool, uid)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("Role", uid))
    }

    /// Re-applies the role named by `uid` (or removes the assignment for
    /// `None`) after re-checking permissions as of now. The mutation runs
    /// on the replay transaction; lookups are plain reads on the pool.
    async fn reapply(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: &AssignRoleParams,
        uid: Option<&str>,
    ) -> Result<()> {
        self.checker
            .check_permissions(actor, ops::ASSIGN_ROLE, params.group_id)
            .await?;

        let subject = self
            .handler
            .get_subject(params.subject_id, &params.subject_type)
            .await?
            .subject_ref();
        let scope = self
            .handler
            .get_scope(params.scope_id, &params.scope_type)
            .await?;

        let role = match uid {
            Some(uid) => Some(self.role_by_uid(uid).await?),
            None => None,
        };

        self.handler
            .assign_role(&mut *conn, subject, params.group_id, role.as_ref(), Some(scope))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ActionType for AssignRoleActionType {
    fn action_type(&self) -> &'static str {
        Self::TYPE
    }

    async fn undo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params = decode_params(params)?;
        self.reapply(conn, actor, &params, params.original_role_uid.as_deref())
            .await
    }

    async fn redo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params = decode_params(params)?;
        self.reapply(conn, actor, &params, params.role_uid.as_deref())
            .await
    }
}

fn encode_params(params: &AssignRoleParams) -> Result<JsonValue> {
    serde_json::to_value(params)
        .map_err(|e| CoterieError::Internal(format!("failed to serialize action params: {e}")))
}

fn decode_params(params: JsonValue) -> Result<AssignRoleParams> {
    serde_json::from_value(params)
        .map_err(|e| CoterieError::Internal(format!("failed to deserialize action params: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AssignRoleParams {
        AssignRoleParams {
            subject_id: Uuid::new_v4(),
            subject_type: "user".to_string(),
            group_id: Uuid::new_v4(),
            role_uid: Some("VIEWER".to_string()),
            original_role_uid: None,
            scope_id: Uuid::new_v4(),
            scope_type: "table".to_string(),
        }
    }

    #[test]
    fn test_params_roundtrip() {
        let original = params();
        let encoded = encode_params(&original).unwrap();
        let decoded = decode_params(encoded).unwrap();
        assert_eq!(decoded.subject_id, original.subject_id);
        assert_eq!(decoded.role_uid, original.role_uid);
        assert_eq!(decoded.original_role_uid, None);
        assert_eq!(decoded.scope_type, "table");
    }

    #[test]
    fn test_decode_rejects_malformed_params() {
        let err = decode_params(serde_json::json!({"subject_id": 7})).unwrap_err();
        assert!(matches!(err, CoterieError::Internal(_)));
    }

    #[test]
    fn test_undo_targets_original_role_and_redo_targets_new_role() {
        // The undo/redo law: undo re-applies original_role_uid, redo
        // re-applies role_uid, so N repetitions alternate between exactly
        // these two states.
        let p = params();
        let undo_target = p.original_role_uid.as_deref();
        let redo_target = p.role_uid.as_deref();
        assert_eq!(undo_target, None);
        assert_eq!(redo_target, Some("VIEWER"));
        assert_ne!(undo_target, redo_target);
    }
}
