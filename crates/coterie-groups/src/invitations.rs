//! The invitation lifecycle service.
//!
//! An invitation moves Created, through any number of Updates, to exactly
//! one of Accepted, Rejected or Deleted. Admin mutations take a `FOR
//! UPDATE` row lock and run the super-admin guard before anything else;
//! every mutation commits atomically with its action-log entry. Mail is
//! dispatched after commit and never rolls anything back.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use coterie_actions::group_scope;
use coterie_authz::operations::ops;
use coterie_authz::PermissionChecker;
use coterie_core::{
    normalize_email_address, CoterieConfig, CoterieError, Result, SuperAdmins,
};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{
    Action, CreateAction, CreateGroupInvitation, Group, GroupInvitation, GroupPermission,
    GroupUser, UpdateGroupInvitation, User,
};

use crate::actions::{
    encode, CreateInvitationActionType, DeleteInvitationActionType, InvitationParams,
    InvitationSnapshot, UpdateInvitationActionType, UpdateInvitationParams,
};
use crate::mailer::{InvitationMail, InvitationMailer};
use crate::token::TokenSigner;

/// Creates, edits, resolves and verifies group invitations.
pub struct GroupInvitationService {
    pool: PgPool,
    config: CoterieConfig,
    checker: Arc<PermissionChecker>,
    signer: TokenSigner,
    mailer: Arc<dyn InvitationMailer>,
}

impl GroupInvitationService {
    /// Creates the service with its collaborators.
    #[must_use]
    pub fn new(
        pool: PgPool,
        config: CoterieConfig,
        checker: Arc<PermissionChecker>,
        mailer: Arc<dyn InvitationMailer>,
    ) -> Self {
        let signer = TokenSigner::new(
            config.token_secret.clone(),
            config.invitation_ttl_days,
        );
        Self {
            pool,
            config,
            checker,
            signer,
            mailer,
        }
    }

    /// Creates an invitation and mails the invitee a signed accept link.
    ///
    /// `base_url`'s hostname must be on the configured allow-list. The
    /// email is normalized before storage. Inviting an existing member is
    /// a conflict. Re-inviting the same email refreshes the existing
    /// invitation and invalidates previously issued tokens.
    pub async fn create(
        &self,
        actor: &User,
        group_id: Uuid,
        email: &str,
        permissions: GroupPermission,
        base_url: &str,
        message: &str,
    ) -> Result<GroupInvitation> {
        self.checker
            .check_permissions(actor, ops::CREATE_INVITATION, group_id)
            .await?;
        self.config.check_base_url(base_url)?;

        let email = normalize_email_address(email);

        // Checked inside the insert transaction so a concurrent accept
        // cannot admit the member between check and insert.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let group = Group::find_by_id(&mut *tx, group_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("Group", group_id))?;

        if GroupUser::member_exists_by_email(&mut *tx, group_id, &email)
            .await
            .map_err(map_sqlx_error)?
        {
            return Err(CoterieError::Conflict(format!(
                "The user {email} is already a member of the group"
            )));
        }

        let invitation = GroupInvitation::create_or_refresh(
            &mut *tx,
            &CreateGroupInvitation {
                group_id,
                invited_by: actor.id,
                email,
                permissions,
                message: message.to_string(),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        Action::create(
            &mut *tx,
            CreateAction {
                user_id: actor.id,
                action_type: CreateInvitationActionType::TYPE.to_string(),
                params: encode(&InvitationParams {
                    invitation_id: invitation.id,
                    group_id,
                    snapshot: InvitationSnapshot::of(&invitation),
                })?,
                scope: group_scope(group_id),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            invitation_id = %invitation.id,
            group_id = %group_id,
            email = %invitation.email,
            "invitation created"
        );

        self.dispatch_mail(actor, &group, &invitation, base_url).await;

        Ok(invitation)
    }

    /// Applies field changes to an invitation.
    ///
    /// Bumps the invitation's `key`, so every previously issued token
    /// stops verifying.
    pub async fn update(
        &self,
        actor: &User,
        invitation_id: Uuid,
        fields: UpdateGroupInvitation,
    ) -> Result<GroupInvitation> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let invitation = GroupInvitation::find_by_id_for_update(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;

        ensure_not_super_admin(&self.config.super_admins, &invitation.email)?;
        self.checker
            .check_permissions(actor, ops::UPDATE_INVITATION, invitation.group_id)
            .await?;

        let fields = UpdateGroupInvitation {
            email: fields.email.map(|e| normalize_email_address(&e)),
            permissions: fields.permissions,
            message: fields.message,
        };
        if let Some(new_email) = &fields.email {
            ensure_not_super_admin(&self.config.super_admins, new_email)?;
        }

        let updated = GroupInvitation::update(&mut *tx, invitation_id, &fields)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;

        Action::create(
            &mut *tx,
            CreateAction {
                user_id: actor.id,
                action_type: UpdateInvitationActionType::TYPE.to_string(),
                params: encode(&UpdateInvitationParams {
                    invitation_id,
                    group_id: invitation.group_id,
                    original: InvitationSnapshot::of(&invitation),
                    updated: InvitationSnapshot::of(&updated),
                })?,
                scope: group_scope(invitation.group_id),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            invitation_id = %invitation_id,
            group_id = %invitation.group_id,
            "invitation updated"
        );

        Ok(updated)
    }

    /// Deletes an invitation.
    pub async fn delete(&self, actor: &User, invitation_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let invitation = GroupInvitation::find_by_id_for_update(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;

        ensure_not_super_admin(&self.config.super_admins, &invitation.email)?;
        self.checker
            .check_permissions(actor, ops::DELETE_INVITATION, invitation.group_id)
            .await?;

        GroupInvitation::delete(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?;

        Action::create(
            &mut *tx,
            CreateAction {
                user_id: actor.id,
                action_type: DeleteInvitationActionType::TYPE.to_string(),
                params: encode(&InvitationParams {
                    invitation_id,
                    group_id: invitation.group_id,
                    snapshot: InvitationSnapshot::of(&invitation),
                })?,
                scope: group_scope(invitation.group_id),
            },
        )
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            invitation_id = %invitation_id,
            group_id = %invitation.group_id,
            "invitation deleted"
        );

        Ok(())
    }

    /// Accepts an invitation, converting it to a membership.
    ///
    /// The actor's normalized email must match the invitation's. An
    /// existing membership row is reactivated at the invited permission
    /// level.
    pub async fn accept(&self, actor: &User, invitation_id: Uuid) -> Result<GroupUser> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let invitation = GroupInvitation::find_by_id_for_update(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;

        ensure_email_matches(&invitation.email, &actor.email)?;

        let membership = GroupUser::create_or_update(
            &mut *tx,
            invitation.group_id,
            actor.id,
            invitation.permissions,
        )
        .await
        .map_err(map_sqlx_error)?;

        GroupInvitation::delete(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            invitation_id = %invitation_id,
            group_id = %invitation.group_id,
            user_id = %actor.id,
            "invitation accepted"
        );

        Ok(membership)
    }

    /// Rejects an invitation. Same email guard as accept; no membership is
    /// created.
    pub async fn reject(&self, actor: &User, invitation_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let invitation = GroupInvitation::find_by_id_for_update(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;

        ensure_email_matches(&invitation.email, &actor.email)?;

        GroupInvitation::delete(&mut *tx, invitation_id)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::info!(
            invitation_id = %invitation_id,
            group_id = %invitation.group_id,
            user_id = %actor.id,
            "invitation rejected"
        );

        Ok(())
    }

    /// Resolves a signed token to its invitation.
    ///
    /// A bad signature, an expired token or a `key` older than the stored
    /// row is `TokenInvalid`; a verified token whose invitation row is
    /// gone is `NotFound`. The two are never conflated.
    pub async fn get_by_token(&self, token: &str) -> Result<GroupInvitation> {
        let claims = self.signer.unsign(token)?;

        let invitation = GroupInvitation::find_by_id(&self.pool, claims.invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| {
                CoterieError::not_found_id("GroupInvitation", claims.invitation_id)
            })?;

        if claims.key != invitation.key {
            return Err(CoterieError::TokenInvalid(
                "token issued before the invitation was updated".to_string(),
            ));
        }

        Ok(invitation)
    }

    /// Lists the invitations of a group.
    pub async fn list(&self, actor: &User, group_id: Uuid) -> Result<Vec<GroupInvitation>> {
        self.checker
            .check_permissions(actor, ops::LIST_INVITATIONS, group_id)
            .await?;
        GroupInvitation::list_by_group(&self.pool, group_id)
            .await
            .map_err(map_sqlx_error)
    }

    /// Fetches one invitation by id.
    pub async fn get(&self, actor: &User, invitation_id: Uuid) -> Result<GroupInvitation> {
        let invitation = GroupInvitation::find_by_id(&self.pool, invitation_id)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| CoterieError::not_found_id("GroupInvitation", invitation_id))?;
        self.checker
            .check_permissions(actor, ops::READ_INVITATION, invitation.group_id)
            .await?;
        Ok(invitation)
    }

    async fn dispatch_mail(
        &self,
        actor: &User,
        group: &Group,
        invitation: &GroupInvitation,
        base_url: &str,
    ) {
        let token = match self.signer.sign(invitation) {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(
                    invitation_id = %invitation.id,
                    %error,
                    "invitation token signing failed, mail skipped"
                );
                return;
            }
        };

        let mail = InvitationMail {
            to: invitation.email.clone(),
            group_name: group.name.clone(),
            invited_by: actor.email.clone(),
            message: invitation.message.clone(),
            url: invite_url(base_url, &token),
        };

        if let Err(error) = self.mailer.send(&mail).await {
            tracing::warn!(
                invitation_id = %invitation.id,
                %error,
                "invitation mail dispatch failed"
            );
        }
    }
}

/// The accept URL mailed to the invitee.
fn invite_url(base_url: &str, token: &str) -> String {
    format!("{}/{token}", base_url.trim_end_matches('/'))
}

/// Rejects any mutation touching an invitation addressed to a protected
/// super-admin account.
fn ensure_not_super_admin(super_admins: &SuperAdmins, email: &str) -> Result<()> {
    if super_admins.is_super_admin(email) {
        return Err(CoterieError::ImmutableSubject {
            email: email.to_string(),
        });
    }
    Ok(())
}

/// Accept and reject require the resolving principal to be the invited
/// one. The invitation email is stored normalized; the actor's is
/// normalized here before comparison.
fn ensure_email_matches(invitation_email: &str, actor_email: &str) -> Result<()> {
    if normalize_email_address(actor_email) != invitation_email {
        return Err(CoterieError::EmailMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_match_is_case_and_width_insensitive() {
        assert!(ensure_email_matches("alice@example.com", "Alice@Example.COM").is_ok());
        assert!(ensure_email_matches("alice@example.com", " alice@example.com ").is_ok());
        // Fullwidth characters normalize to ASCII under NFKC.
        assert!(ensure_email_matches("alice@example.com", "ａｌｉｃｅ@example.com").is_ok());
    }

    #[test]
    fn test_email_mismatch_is_rejected() {
        let err = ensure_email_matches("alice@example.com", "bob@example.com").unwrap_err();
        assert!(matches!(err, CoterieError::EmailMismatch));
    }

    #[test]
    fn test_super_admin_guard() {
        let super_admins = SuperAdmins::new(["root@coterie.dev"]);
        let err = ensure_not_super_admin(&super_admins, "root@coterie.dev").unwrap_err();
        assert!(matches!(err, CoterieError::ImmutableSubject { .. }));
        assert!(ensure_not_super_admin(&super_admins, "alice@example.com").is_ok());
    }

    #[test]
    fn test_invite_url_joins_without_double_slash() {
        assert_eq!(
            invite_url("https://app.coterie.dev/invite/", "abc.def"),
            "https://app.coterie.dev/invite/abc.def"
        );
        assert_eq!(
            invite_url("https://app.coterie.dev/invite", "abc.def"),
            "https://app.coterie.dev/invite/abc.def"
        );
    }
}
