//! Group and membership service.
//!
//! The minimum lifecycle the data model needs: create (creator becomes
//! admin), rename, delete, and member removal with its guards.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use coterie_actions::group_scope;
use coterie_authz::operations::ops;
use coterie_authz::PermissionChecker;
use coterie_core::{CoterieError, Result, SuperAdmins};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{
    Action, CreateAction, Group, GroupPermission, GroupUser, User,
};

use crate::actions::{encode, CreateGroupActionType, CreateGroupParams};

/// Creates, renames and deletes groups, and removes members.
pub struct GroupService {
    pool: PgPool,
    checker: Arc<PermissionChecker>,
    super_admins: SuperAdmins,
}

impl GroupService {
    /// Creates the service with its collaborators.
    #[must_use]
    pub fn new(pool: PgPool, checker: Arc<PermissionChecker>, super_admins: SuperAdmins) -> Self {
        Self {
            pool,
            checker,
            super_admins,
        }
    }

    /// Creates a group with the actor as its first admin. Ungated: any
    /// user may create a group.
    pub async fn create_group(&self, actor: &User, name: &str) -> Result<Group> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let group = Group::create(&mut *tx, name).await.map_err(map_sqlx_error)?;

        GroupUser::create_or_update(&mut *tx, group.id, actor.id, GroupPermission::Admin)
            .await
            .map_err(map_sqlx_error)?;

        Action::create(
            &mut *tx,
            CreateAction {
                user_id: actor.id,
                action_type: CreateGroupActionType::TYPE.to_string(),
                params: encode(&CreateGroupParams {
                    group_id: group.id,
                    name: group.name.clone(),
                    creator_id: actor.id,
                })?,
                scope: group_scope(group.id),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(group_id = %group.id, name = %group.name, "group created");

        Ok(group)
    }

    /// Renames a group.
    pub async fn rename_group(&self, actor: &User, group_id: Uuid, name: &str) -> Result<Group> {
        self.checker
            .check_permissions(actor, ops::UPDATE_GROUP, group_id)
            .await?;

        let group = Group::rename(&self.pool, group_id, name)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("Group", group_id))?;

        tracing::info!(group_id = %group_id, name = %name, "group renamed");

        Ok(group)
    }

    /// Deletes a group. Memberships, invitations and group-scoped role
    /// assignments cascade.
    pub async fn delete_group(&self, actor: &User, group_id: Uuid) -> Result<()> {
        self.checker
            .check_permissions(actor, ops::DELETE_GROUP, group_id)
            .await?;

        let deleted = Group::delete(&self.pool, group_id)
            .await
            .map_err(map_sqlx_error)?;
        if !deleted {
            return Err(CoterieError::not_found_id("Group", group_id));
        }

        tracing::info!(group_id = %group_id, "group deleted");

        Ok(())
    }

    /// Removes a member from a group.
    ///
    /// The actor may not remove themselves, a protected super-admin
    /// account may not be removed, and the last admin of a group may not
    /// be removed.
    pub async fn remove_member(&self, actor: &User, group_id: Uuid, user_id: Uuid) -> Result<()> {
        if actor.id == user_id {
            return Err(CoterieError::validation(
                "An actor cannot remove their own membership",
            ));
        }

        self.checker
            .check_permissions(actor, ops::REMOVE_MEMBER, group_id)
            .await?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let target = User::find_by_id(&mut *tx, user_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("User", user_id))?;
        if self.super_admins.is_super_admin(&target.email) {
            return Err(CoterieError::ImmutableSubject {
                email: target.email,
            });
        }

        let membership = GroupUser::find_by_group_and_user(&mut *tx, group_id, user_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found("GroupUser"))?;

        if membership.permissions == GroupPermission::Admin {
            let admins = GroupUser::count_admins(&mut *tx, group_id)
                .await
                .map_err(map_sqlx_error)?;
            if admins <= 1 {
                return Err(CoterieError::Conflict(
                    "Cannot remove the last admin of the group".to_string(),
                ));
            }
        }

        GroupUser::delete(&mut *tx, group_id, user_id)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(group_id = %group_id, user_id = %user_id, "member removed");

        Ok(())
    }

    /// Lists the memberships of a group. Any member may look.
    pub async fn list_members(&self, actor: &User, group_id: Uuid) -> Result<Vec<GroupUser>> {
        self.checker
            .check_permissions(actor, ops::LIST_MEMBERS, group_id)
            .await?;
        GroupUser::list_by_group(&self.pool, group_id)
            .await
            .map_err(map_sqlx_error)
    }
}
