//! Permission checking.
//!
//! `check_permissions` resolves the operation through the operation
//! registry, then walks the registered permission-manager strategies in
//! priority order until one affirmatively grants or denies. A manager may
//! abstain; when every manager abstains the checker denies. The read path
//! has no side effects.
//!
//! A denial distinguishes `NotAMember` (no relation to the group at all)
//! from `PermissionDenied` (member, but insufficient) so the caller can
//! pick the right user-facing error.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use coterie_core::{CoterieError, Result};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{GroupUser, Role, RoleAssignment, Team, User};

use crate::operations::Operation;
use crate::registry::{Registry, GROUP_SCOPE_TYPE, TEAM_SUBJECT_TYPE, USER_SUBJECT_TYPE};

/// Outcome of one permission-manager strategy.
#[derive(Debug)]
pub enum Decision {
    /// The strategy affirmatively grants the operation.
    Grant,
    /// The strategy denies with the given error; later strategies are not
    /// consulted.
    Deny(CoterieError),
    /// The strategy has no opinion; the next strategy decides.
    Abstain,
}

/// One pluggable permission strategy.
#[async_trait]
pub trait PermissionManager: Send + Sync {
    /// Strategy name, for log output.
    fn name(&self) -> &'static str;

    /// Evaluates the operation for the actor on the group.
    async fn check(&self, actor: &User, operation: &Operation, group_id: Uuid)
        -> Result<Decision>;
}

/// Answers whether a feature is active for a group. Licensing lives
/// outside the engine; the default implementation grants everything.
#[async_trait]
pub trait FeatureGate: Send + Sync {
    async fn has_feature(&self, group_id: Uuid, feature: &str) -> Result<bool>;
}

/// Feature gate that activates every feature for every group.
pub struct AllowAllFeatures;

#[async_trait]
impl FeatureGate for AllowAllFeatures {
    async fn has_feature(&self, _group_id: Uuid, _feature: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Denies feature-gated operations when the group's license lacks the
/// feature. Abstains for ungated operations.
pub struct FeatureGatePermissionManager {
    gate: Arc<dyn FeatureGate>,
}

impl FeatureGatePermissionManager {
    #[must_use]
    pub fn new(gate: Arc<dyn FeatureGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl PermissionManager for FeatureGatePermissionManager {
    fn name(&self) -> &'static str {
        "feature_gate"
    }

    async fn check(
        &self,
        _actor: &User,
        operation: &Operation,
        group_id: Uuid,
    ) -> Result<Decision> {
        let Some(feature) = operation.feature else {
            return Ok(Decision::Abstain);
        };
        if self.gate.has_feature(group_id, feature).await? {
            Ok(Decision::Abstain)
        } else {
            Ok(Decision::Deny(CoterieError::permission_denied(
                operation.name,
            )))
        }
    }
}

/// Grants when the actor holds a group-level role assignment (directly or
/// through a team) whose role lists the operation. Abstains otherwise so
/// the coarse membership fallback still applies.
pub struct RolePermissionManager {
    pool: PgPool,
}

impl RolePermissionManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn role_grants(&self, role_id: Uuid, operation: &Operation) -> Result<bool> {
        let role = Role::find_by_id(&self.pool, role_id)
            .await
            .map_err(map_sqlx_error)?;
        Ok(role.is_some_and(|r| r.grants(operation.name)))
    }
}

#[async_trait]
impl PermissionManager for RolePermissionManager {
    fn name(&self) -> &'static str {
        "role"
    }

    async fn check(&self, actor: &User, operation: &Operation, group_id: Uuid) -> Result<Decision> {
        let direct = RoleAssignment::find(
            &self.pool,
            actor.id,
            USER_SUBJECT_TYPE,
            group_id,
            group_id,
            GROUP_SCOPE_TYPE,
        )
        .await
        .map_err(map_sqlx_error)?;

        if let Some(assignment) = direct {
            if self.role_grants(assignment.role_id, operation).await? {
                return Ok(Decision::Grant);
            }
        }

        for team_id in Team::ids_for_user(&self.pool, group_id, actor.id)
            .await
            .map_err(map_sqlx_error)?
        {
            let via_team = RoleAssignment::find(
                &self.pool,
                team_id,
                TEAM_SUBJECT_TYPE,
                group_id,
                group_id,
                GROUP_SCOPE_TYPE,
            )
            .await
            .map_err(map_sqlx_error)?;

            if let Some(assignment) = via_team {
                if self.role_grants(assignment.role_id, operation).await? {
                    return Ok(Decision::Grant);
                }
            }
        }

        Ok(Decision::Abstain)
    }
}

/// The coarse membership fallback. Denies `NotAMember` when the actor has
/// no membership row at all, grants when the membership level satisfies
/// the operation's requirement, denies `PermissionDenied` otherwise.
pub struct MembershipPermissionManager {
    pool: PgPool,
}

impl MembershipPermissionManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionManager for MembershipPermissionManager {
    fn name(&self) -> &'static str {
        "membership"
    }

    async fn check(&self, actor: &User, operation: &Operation, group_id: Uuid) -> Result<Decision> {
        let membership = GroupUser::find_by_group_and_user(&self.pool, group_id, actor.id)
            .await
            .map_err(map_sqlx_error)?;

        match membership {
            None => Ok(Decision::Deny(CoterieError::NotAMember)),
            Some(member) if member.permissions.satisfies(operation.required) => {
                Ok(Decision::Grant)
            }
            Some(_) => Ok(Decision::Deny(CoterieError::permission_denied(
                operation.name,
            ))),
        }
    }
}

/// Walks the manager chain for one operation.
pub struct PermissionChecker {
    operations: Arc<Registry<Operation>>,
    managers: Vec<Arc<dyn PermissionManager>>,
}

impl PermissionChecker {
    /// Creates a checker with the given strategies, consulted in order.
    #[must_use]
    pub fn new(
        operations: Arc<Registry<Operation>>,
        managers: Vec<Arc<dyn PermissionManager>>,
    ) -> Self {
        Self {
            operations,
            managers,
        }
    }

    /// The default chain: feature gate, then role grants, then the coarse
    /// membership fallback.
    #[must_use]
    pub fn with_default_managers(
        operations: Arc<Registry<Operation>>,
        pool: PgPool,
        gate: Arc<dyn FeatureGate>,
    ) -> Self {
        Self::new(
            operations,
            vec![
                Arc::new(FeatureGatePermissionManager::new(gate)),
                Arc::new(RolePermissionManager::new(pool.clone())),
                Arc::new(MembershipPermissionManager::new(pool)),
            ],
        )
    }

    /// Checks whether the actor may perform the named operation on the
    /// group. Returns `Ok(())` on grant, the denial error otherwise.
    pub async fn check_permissions(
        &self,
        actor: &User,
        operation_name: &str,
        group_id: Uuid,
    ) -> Result<()> {
        let operation = self.operations.get(operation_name)?;

        for manager in &self.managers {
            match manager.check(actor, &operation, group_id).await? {
                Decision::Grant => {
                    tracing::debug!(
                        actor_id = %actor.id,
                        operation = operation_name,
                        group_id = %group_id,
                        manager = manager.name(),
                        "permission granted"
                    );
                    return Ok(());
                }
                Decision::Deny(error) => {
                    tracing::debug!(
                        actor_id = %actor.id,
                        operation = operation_name,
                        group_id = %group_id,
                        manager = manager.name(),
                        "permission denied"
                    );
                    return Err(error);
                }
                Decision::Abstain => {}
            }
        }

        Err(CoterieError::permission_denied(operation_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{builtin_operations, ops};
    use chrono::Utc;
    use coterie_db::models::GroupPermission;

    fn actor() -> User {
        User {
            id: Uuid::new_v4(),
            email: "actor@example.com".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    struct FixedManager(fn() -> Decision);

    #[async_trait]
    impl PermissionManager for FixedManager {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn check(
            &self,
            _actor: &User,
            _operation: &Operation,
            _group_id: Uuid,
        ) -> Result<Decision> {
            Ok((self.0)())
        }
    }

    fn checker(managers: Vec<Arc<dyn PermissionManager>>) -> PermissionChecker {
        PermissionChecker::new(Arc::new(builtin_operations()), managers)
    }

    #[tokio::test]
    async fn test_grant_short_circuits() {
        let checker = checker(vec![
            Arc::new(FixedManager(|| Decision::Grant)),
            Arc::new(FixedManager(|| {
                Decision::Deny(CoterieError::NotAMember)
            })),
        ]);
        let result = checker
            .check_permissions(&actor(), ops::CREATE_INVITATION, Uuid::new_v4())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_deny_short_circuits_with_its_error() {
        let checker = checker(vec![
            Arc::new(FixedManager(|| Decision::Abstain)),
            Arc::new(FixedManager(|| {
                Decision::Deny(CoterieError::NotAMember)
            })),
            Arc::new(FixedManager(|| Decision::Grant)),
        ]);
        let err = checker
            .check_permissions(&actor(), ops::CREATE_INVITATION, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoterieError::NotAMember));
    }

    #[tokio::test]
    async fn test_all_abstain_denies() {
        let checker = checker(vec![
            Arc::new(FixedManager(|| Decision::Abstain)),
            Arc::new(FixedManager(|| Decision::Abstain)),
        ]);
        let err = checker
            .check_permissions(&actor(), ops::CREATE_INVITATION, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoterieError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_unknown_operation_fails_before_managers() {
        let checker = checker(vec![Arc::new(FixedManager(|| Decision::Grant))]);
        let err = checker
            .check_permissions(&actor(), "group.frobnicate", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoterieError::InstanceTypeDoesNotExist { .. }));
    }

    #[tokio::test]
    async fn test_feature_gate_abstains_for_ungated_operation() {
        let manager = FeatureGatePermissionManager::new(Arc::new(AllowAllFeatures));
        let registry = builtin_operations();
        let op = registry.get(ops::CREATE_INVITATION).unwrap();
        let decision = manager.check(&actor(), &op, Uuid::new_v4()).await.unwrap();
        assert!(matches!(decision, Decision::Abstain));
    }

    #[tokio::test]
    async fn test_feature_gate_denies_missing_feature() {
        struct DenyAll;

        #[async_trait]
        impl FeatureGate for DenyAll {
            async fn has_feature(&self, _group_id: Uuid, _feature: &str) -> Result<bool> {
                Ok(false)
            }
        }

        let manager = FeatureGatePermissionManager::new(Arc::new(DenyAll));
        let registry = builtin_operations();
        let op = registry.get(ops::ASSIGN_ROLE).unwrap();
        let decision = manager.check(&actor(), &op, Uuid::new_v4()).await.unwrap();
        assert!(matches!(
            decision,
            Decision::Deny(CoterieError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_membership_satisfaction_matrix() {
        assert!(GroupPermission::Admin.satisfies(GroupPermission::Admin));
        assert!(!GroupPermission::Member.satisfies(GroupPermission::Admin));
    }
}
