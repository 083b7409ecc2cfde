//! The role assignment store.
//!
//! The authoritative mapping of (subject, group, scope) to a role. All
//! mutations go through [`RoleAssignmentHandler::assign_role`], which runs
//! on a caller-supplied executor so the write shares one transaction with
//! the action-log entry.
//!
//! Precedence: the most specific row wins. A lookup with an explicit
//! scope returns the scope-level row when one exists and falls back to
//! the group-level row otherwise; a group-level lookup never returns a
//! scope-level row.

use std::sync::Arc;

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use coterie_core::Result;
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{Role, RoleAssignment, SubjectRef};

use crate::resolver::{ScopeRef, ScopeResolver, Subject};

/// Reads and mutates scoped role assignments.
#[derive(Clone)]
pub struct RoleAssignmentHandler {
    pool: PgPool,
    resolver: Arc<ScopeResolver>,
}

impl RoleAssignmentHandler {
    /// Creates a handler over the given pool and resolver.
    #[must_use]
    pub fn new(pool: PgPool, resolver: Arc<ScopeResolver>) -> Self {
        Self { pool, resolver }
    }

    /// The effective scope of a lookup or assignment: the given scope, or
    /// the group itself when omitted.
    #[must_use]
    pub fn effective_scope(group_id: Uuid, scope: Option<ScopeRef>) -> ScopeRef {
        scope.unwrap_or_else(|| ScopeRef::group(group_id))
    }

    /// The precedence decision: a scope-specific row wins outright, and
    /// only a scoped lookup that found nothing falls back to the
    /// group-level row. A group-level lookup never falls through to a
    /// scope row.
    #[must_use]
    fn needs_group_fallback(
        specific: Option<&RoleAssignment>,
        scope: &ScopeRef,
        group_id: Uuid,
    ) -> bool {
        specific.is_none() && !scope.is_group_level(group_id)
    }

    /// The current role assignment of a subject in a group for a scope.
    ///
    /// `scope = None` means the group itself. A scope-specific lookup
    /// falls back to the group-level row when no scope-specific row
    /// exists.
    pub async fn get_current_role_assignment(
        &self,
        subject: SubjectRef,
        group_id: Uuid,
        scope: Option<ScopeRef>,
    ) -> Result<Option<RoleAssignment>> {
        let scope = Self::effective_scope(group_id, scope);

        let specific = RoleAssignment::find(
            &self.pool,
            subject.id,
            subject.subject_type,
            group_id,
            scope.scope_id,
            &scope.scope_type,
        )
        .await
        .map_err(map_sqlx_error)?;

        if !Self::needs_group_fallback(specific.as_ref(), &scope, group_id) {
            return Ok(specific);
        }

        RoleAssignment::find(
            &self.pool,
            subject.id,
            subject.subject_type,
            group_id,
            group_id,
            crate::registry::GROUP_SCOPE_TYPE,
        )
        .await
        .map_err(map_sqlx_error)
    }

    /// Assigns a role to a subject in a group over a scope, or removes the
    /// assignment when `role` is `None`.
    ///
    /// Runs on the caller's executor so it can share the transaction that
    /// writes the action-log entry. Removing a non-existent assignment is
    /// a no-op success.
    pub async fn assign_role<'e, E>(
        &self,
        executor: E,
        subject: SubjectRef,
        group_id: Uuid,
        role: Option<&Role>,
        scope: Option<ScopeRef>,
    ) -> Result<Option<RoleAssignment>>
    where
        E: PgExecutor<'e>,
    {
        let scope = Self::effective_scope(group_id, scope);

        match role {
            Some(role) => {
                let assignment = RoleAssignment::upsert(
                    executor,
                    subject.id,
                    subject.subject_type,
                    group_id,
                    scope.scope_id,
                    &scope.scope_type,
                    role.id,
                )
                .await
                .map_err(map_sqlx_error)?;

                tracing::info!(
                    subject_id = %subject.id,
                    subject_type = subject.subject_type,
                    group_id = %group_id,
                    scope_id = %scope.scope_id,
                    scope_type = %scope.scope_type,
                    role_uid = %role.uid,
                    "role assigned"
                );

                Ok(Some(assignment))
            }
            None => {
                RoleAssignment::delete(
                    executor,
                    subject.id,
                    subject.subject_type,
                    group_id,
                    scope.scope_id,
                    &scope.scope_type,
                )
                .await
                .map_err(map_sqlx_error)?;

                tracing::info!(
                    subject_id = %subject.id,
                    subject_type = subject.subject_type,
                    group_id = %group_id,
                    scope_id = %scope.scope_id,
                    scope_type = %scope.scope_type,
                    "role assignment removed"
                );

                Ok(None)
            }
        }
    }

    /// Rehydrates a subject from a stored (tag, id) pair.
    pub async fn get_subject(&self, id: Uuid, type_name: &str) -> Result<Subject> {
        self.resolver.resolve_subject(type_name, id).await
    }

    /// Rehydrates a scope from a stored (tag, id) pair.
    pub async fn get_scope(&self, id: Uuid, type_name: &str) -> Result<ScopeRef> {
        self.resolver.resolve_scope(type_name, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn assignment(group_id: Uuid, scope: &ScopeRef) -> RoleAssignment {
        RoleAssignment {
            id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            subject_type: "user".to_string(),
            group_id,
            scope_id: scope.scope_id,
            scope_type: scope.scope_type.clone(),
            role_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn table_scope() -> ScopeRef {
        ScopeRef {
            scope_type: "table".to_string(),
            scope_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_scope_specific_row_wins_over_group_fallback() {
        let group_id = Uuid::new_v4();
        let scope = table_scope();
        let row = assignment(group_id, &scope);
        assert!(!RoleAssignmentHandler::needs_group_fallback(
            Some(&row),
            &scope,
            group_id
        ));
    }

    #[test]
    fn test_scoped_lookup_without_row_falls_back_to_group_level() {
        let group_id = Uuid::new_v4();
        assert!(RoleAssignmentHandler::needs_group_fallback(
            None,
            &table_scope(),
            group_id
        ));
    }

    #[test]
    fn test_group_level_lookup_never_falls_through() {
        let group_id = Uuid::new_v4();
        let scope = ScopeRef::group(group_id);
        // Found or not, a group-level lookup stops at the group row.
        let row = assignment(group_id, &scope);
        assert!(!RoleAssignmentHandler::needs_group_fallback(
            Some(&row),
            &scope,
            group_id
        ));
        assert!(!RoleAssignmentHandler::needs_group_fallback(
            None,
            &scope,
            group_id
        ));
    }

    #[test]
    fn test_effective_scope_defaults_to_group() {
        let group_id = Uuid::new_v4();
        let scope = RoleAssignmentHandler::effective_scope(group_id, None);
        assert!(scope.is_group_level(group_id));
    }

    #[test]
    fn test_effective_scope_keeps_explicit_scope() {
        let group_id = Uuid::new_v4();
        let table = ScopeRef {
            scope_type: "table".to_string(),
            scope_id: Uuid::new_v4(),
        };
        let scope = RoleAssignmentHandler::effective_scope(group_id, Some(table.clone()));
        assert_eq!(scope, table);
        assert!(!scope.is_group_level(group_id));
    }
}
