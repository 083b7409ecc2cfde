//! Reversible invitation and group action types.
//!
//! Replays resolve invitations by their natural key `(group_id, email)`
//! because a row recreated by undo carries a fresh surrogate id. Every
//! replay re-checks permissions as of now and runs its mutation on the
//! handler's transaction, committing together with the log stamp.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

use coterie_actions::ActionType;
use coterie_authz::operations::ops;
use coterie_authz::PermissionChecker;
use coterie_core::{CoterieError, Result};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{
    Action, CreateGroupInvitation, Group, GroupInvitation, GroupPermission, GroupUser,
    UpdateGroupInvitation, User,
};

/// One revision of an invitation's editable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationSnapshot {
    pub email: String,
    pub permissions: GroupPermission,
    pub message: String,
}

impl InvitationSnapshot {
    /// Captures the editable fields of an invitation row.
    #[must_use]
    pub fn of(invitation: &GroupInvitation) -> Self {
        Self {
            email: invitation.email.clone(),
            permissions: invitation.permissions,
            message: invitation.message.clone(),
        }
    }
}

/// Params for inverting an invitation create or delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationParams {
    pub invitation_id: Uuid,
    pub group_id: Uuid,
    #[serde(flatten)]
    pub snapshot: InvitationSnapshot,
}

/// Params for inverting an invitation update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInvitationParams {
    pub invitation_id: Uuid,
    pub group_id: Uuid,
    pub original: InvitationSnapshot,
    pub updated: InvitationSnapshot,
}

/// Params for inverting a group creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupParams {
    pub group_id: Uuid,
    pub name: String,
    pub creator_id: Uuid,
}

/// Creating an invitation, reversibly. Undo deletes the invitation, redo
/// recreates it with the captured fields.
pub struct CreateInvitationActionType {
    checker: Arc<PermissionChecker>,
}

impl CreateInvitationActionType {
    pub const TYPE: &'static str = "create_invitation";

    #[must_use]
    pub fn new(checker: Arc<PermissionChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl ActionType for CreateInvitationActionType {
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
        let params: InvitationParams = decode(params)?;
        self.checker
            .check_permissions(actor, ops::DELETE_INVITATION, params.group_id)
            .await?;
        delete_by_natural_key(conn, params.group_id, &params.snapshot.email).await
    }

    async fn redo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params: InvitationParams = decode(params)?;
        self.checker
            .check_permissions(actor, ops::CREATE_INVITATION, params.group_id)
            .await?;
        recreate(conn, actor, params.group_id, &params.snapshot).await
    }
}

/// Updating an invitation, reversibly. Undo re-applies the original field
/// values, redo the updated ones.
pub struct UpdateInvitationActionType {
    checker: Arc<PermissionChecker>,
}

impl UpdateInvitationActionType {
    pub const TYPE: &'static str = "update_invitation";

    #[must_use]
    pub fn new(checker: Arc<PermissionChecker>) -> Self {
        Self { checker }
    }

    /// Finds the row at `current.email` and overwrites its editable fields
    /// with `target`. The row may have been recreated since the original
    /// action, so lookup goes through the natural key.
    async fn apply(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        group_id: Uuid,
        current: &InvitationSnapshot,
        target: &InvitationSnapshot,
    ) -> Result<()> {
        self.checker
            .check_permissions(actor, ops::UPDATE_INVITATION, group_id)
            .await?;

        let invitation =
            GroupInvitation::find_by_group_and_email(&mut *conn, group_id, &current.email)
                .await
                .map_err(map_sqlx_error)?
                .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", &current.email))?;

        GroupInvitation::update(
            &mut *conn,
            invitation.id,
            &UpdateGroupInvitation {
                email: Some(target.email.clone()),
                permissions: Some(target.permissions),
                message: Some(target.message.clone()),
            },
        )
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl ActionType for UpdateInvitationActionType {
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
        let params: UpdateInvitationParams = decode(params)?;
        self.apply(conn, actor, params.group_id, &params.updated, &params.original)
            .await
    }

    async fn redo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params: UpdateInvitationParams = decode(params)?;
        self.apply(conn, actor, params.group_id, &params.original, &params.updated)
            .await
    }
}

/// Deleting an invitation, reversibly. Undo recreates it, redo deletes it
/// again.
pub struct DeleteInvitationActionType {
    checker: Arc<PermissionChecker>,
}

impl DeleteInvitationActionType {
    pub const TYPE: &'static str = "delete_invitation";

    #[must_use]
    pub fn new(checker: Arc<PermissionChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl ActionType for DeleteInvitationActionType {
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
        let params: InvitationParams = decode(params)?;
        self.checker
            .check_permissions(actor, ops::CREATE_INVITATION, params.group_id)
            .await?;
        recreate(conn, actor, params.group_id, &params.snapshot).await
    }

    async fn redo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params: InvitationParams = decode(params)?;
        self.checker
            .check_permissions(actor, ops::DELETE_INVITATION, params.group_id)
            .await?;
        delete_by_natural_key(conn, params.group_id, &params.snapshot.email).await
    }
}

/// Creating a group, reversibly. Undo deletes the group (memberships,
/// invitations and group-scoped assignments cascade); redo restores the
/// group row under its original id and re-adds the creator as admin.
pub struct CreateGroupActionType {
    checker: Arc<PermissionChecker>,
}

impl CreateGroupActionType {
    pub const TYPE: &'static str = "create_group";

    #[must_use]
    pub fn new(checker: Arc<PermissionChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl ActionType for CreateGroupActionType {
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
        let params: CreateGroupParams = decode(params)?;
        self.checker
            .check_permissions(actor, ops::DELETE_GROUP, params.group_id)
            .await?;
        Group::delete(&mut *conn, params.group_id)
            .await
            .map_err(map_sqlx_error)?;
        tracing::info!(group_id = %params.group_id, "group deleted by undo");
        Ok(())
    }

    // No permission check here: the group does not exist while undone, so
    // there is no membership to check against. Group creation itself is
    // ungated.
    async fn redo(
        &self,
        conn: &mut PgConnection,
        _actor: &User,
        params: JsonValue,
        _action: &Action,
    ) -> Result<()> {
        let params: CreateGroupParams = decode(params)?;

        Group::create_with_id(&mut *conn, params.group_id, &params.name)
            .await
            .map_err(map_sqlx_error)?;
        GroupUser::create_or_update(
            &mut *conn,
            params.group_id,
            params.creator_id,
            GroupPermission::Admin,
        )
        .await
        .map_err(map_sqlx_error)?;

        tracing::info!(group_id = %params.group_id, "group restored by redo");
        Ok(())
    }
}

async fn recreate(
    conn: &mut PgConnection,
    actor: &User,
    group_id: Uuid,
    snapshot: &InvitationSnapshot,
) -> Result<()> {
    GroupInvitation::create_or_refresh(
        conn,
        &CreateGroupInvitation {
            group_id,
            invited_by: actor.id,
            email: snapshot.email.clone(),
            permissions: snapshot.permissions,
            message: snapshot.message.clone(),
        },
    )
    .await
    .map_err(map_sqlx_error)?;
    Ok(())
}

// Already-gone rows are a no-op success: the invitation may have reached a
// terminal state through accept or reject since the original action.
async fn delete_by_natural_key(
    conn: &mut PgConnection,
    group_id: Uuid,
    email: &str,
) -> Result<()> {
    let invitation = GroupInvitation::find_by_group_and_email(&mut *conn, group_id, email)
        .await
        .map_err(map_sqlx_error)?;
    if let Some(invitation) = invitation {
        GroupInvitation::delete(&mut *conn, invitation.id)
            .await
            .map_err(map_sqlx_error)?;
    }
    Ok(())
}

pub(crate) fn encode<T: Serialize>(params: &T) -> Result<JsonValue> {
    serde_json::to_value(params)
        .map_err(|e| CoterieError::Internal(format!("failed to serialize action params: {e}")))
}

fn decode<T: DeserializeOwned>(params: JsonValue) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| CoterieError::Internal(format!("failed to deserialize action params: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_params_roundtrip() {
        let params = InvitationParams {
            invitation_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            snapshot: InvitationSnapshot {
                email: "invitee@example.com".to_string(),
                permissions: GroupPermission::Member,
                message: "welcome".to_string(),
            },
        };
        let value = encode(&params).unwrap();
        // Flattened snapshot keeps the stored shape flat.
        assert_eq!(value["email"], "invitee@example.com");
        let back: InvitationParams = decode(value).unwrap();
        assert_eq!(back.snapshot.email, params.snapshot.email);
        assert_eq!(back.snapshot.permissions, GroupPermission::Member);
    }

    #[test]
    fn test_update_params_keep_both_revisions() {
        let params = UpdateInvitationParams {
            invitation_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            original: InvitationSnapshot {
                email: "old@example.com".to_string(),
                permissions: GroupPermission::Member,
                message: String::new(),
            },
            updated: InvitationSnapshot {
                email: "new@example.com".to_string(),
                permissions: GroupPermission::Admin,
                message: "promoted".to_string(),
            },
        };
        let back: UpdateInvitationParams = decode(encode(&params).unwrap()).unwrap();
        assert_eq!(back.original.email, "old@example.com");
        assert_eq!(back.updated.email, "new@example.com");
        assert_eq!(back.updated.permissions, GroupPermission::Admin);
    }

    #[test]
    fn test_decode_rejects_malformed_params() {
        let err = decode::<CreateGroupParams>(serde_json::json!({"name": 1})).unwrap_err();
        assert!(matches!(err, CoterieError::Internal(_)));
    }
}
