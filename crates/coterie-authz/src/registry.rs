//! Generic type registries.
//!
//! Scope types, subject types and operations are registered once at
//! startup into read-mostly lookup tables keyed by stable string tags.
//! Nothing mutates a registry once serving begins; services hold them
//! behind `Arc`. Storing (tag, id) pairs instead of concrete references
//! keeps logged actions valid across process restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use coterie_core::{CoterieError, Result};
use coterie_db::error::map_sqlx_error;
use coterie_db::models::{Group, Team, User};

use crate::resolver::Subject;

/// Type tag of the group scope (the default when no finer scope is given).
pub const GROUP_SCOPE_TYPE: &str = "group";
/// Type tag of an individual-user subject.
pub const USER_SUBJECT_TYPE: &str = "user";
/// Type tag of a team subject.
pub const TEAM_SUBJECT_TYPE: &str = "team";

/// Anything registrable under a stable string tag.
pub trait RegistryInstance {
    /// The stable tag this instance is registered under.
    fn type_name(&self) -> &'static str;
}

/// A startup-time lookup table from tag to instance.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<&'static str, Arc<T>>,
}

impl<T: RegistryInstance + ?Sized> Registry<T> {
    /// Creates an empty registry. `kind` names the registry in log output.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Registers an instance under its own tag.
    pub fn register(&mut self, instance: Arc<T>) {
        self.entries.insert(instance.type_name(), instance);
    }

    /// Looks up an instance by tag.
    pub fn get(&self, type_name: &str) -> Result<Arc<T>> {
        self.entries
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoterieError::InstanceTypeDoesNotExist {
                type_name: type_name.to_string(),
            })
    }

    /// Registered tags, for diagnostics.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("len", &self.entries.len())
            .finish()
    }
}

/// A resource kind role assignments can be scoped to.
#[async_trait]
pub trait ScopeType: RegistryInstance + Send + Sync {
    /// Whether an instance of this scope kind exists with the given id.
    async fn exists(&self, pool: &PgPool, id: Uuid) -> Result<bool>;
}

impl std::fmt::Debug for dyn ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeType")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// An entity kind that can receive role assignments.
#[async_trait]
pub trait SubjectType: RegistryInstance + Send + Sync {
    /// Loads the subject with the given id, or `None` when absent.
    async fn load(&self, pool: &PgPool, id: Uuid) -> Result<Option<Subject>>;
}

/// The group itself as a role-assignment scope.
pub struct GroupScopeType;

impl RegistryInstance for GroupScopeType {
    fn type_name(&self) -> &'static str {
        GROUP_SCOPE_TYPE
    }
}

#[async_trait]
impl ScopeType for GroupScopeType {
    async fn exists(&self, pool: &PgPool, id: Uuid) -> Result<bool> {
        Group::exists(pool, id).await.map_err(map_sqlx_error)
    }
}

/// Individual users as role-assignment subjects.
pub struct UserSubjectType;

impl RegistryInstance for UserSubjectType {
    fn type_name(&self) -> &'static str {
        USER_SUBJECT_TYPE
    }
}

#[async_trait]
impl SubjectType for UserSubjectType {
    async fn load(&self, pool: &PgPool, id: Uuid) -> Result<Option<Subject>> {
        Ok(User::find_by_id(pool, id)
            .await
            .map_err(map_sqlx_error)?
            .map(Subject::User))
    }
}

/// Teams as role-assignment subjects.
pub struct TeamSubjectType;

impl RegistryInstance for TeamSubjectType {
    fn type_name(&self) -> &'static str {
        TEAM_SUBJECT_TYPE
    }
}

#[async_trait]
impl SubjectType for TeamSubjectType {
    async fn load(&self, pool: &PgPool, id: Uuid) -> Result<Option<Subject>> {
        Ok(Team::find_by_id(pool, id)
            .await
            .map_err(map_sqlx_error)?
            .map(Subject::Team))
    }
}

/// The scope type registry with the built-in `group` scope registered.
#[must_use]
pub fn builtin_scope_types() -> Registry<dyn ScopeType> {
    let mut registry = Registry::new("scope_type");
    registry.register(Arc::new(GroupScopeType) as Arc<dyn ScopeType>);
    registry
}

/// The subject type registry with `user` and `team` registered.
#[must_use]
pub fn builtin_subject_types() -> Registry<dyn SubjectType> {
    let mut registry = Registry::new("subject_type");
    registry.register(Arc::new(UserSubjectType) as Arc<dyn SubjectType>);
    registry.register(Arc::new(TeamSubjectType) as Arc<dyn SubjectType>);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scope_types_contains_group() {
        let registry = builtin_scope_types();
        assert!(registry.get(GROUP_SCOPE_TYPE).is_ok());
    }

    #[test]
    fn test_builtin_subject_types_contains_user_and_team() {
        let registry = builtin_subject_types();
        assert!(registry.get(USER_SUBJECT_TYPE).is_ok());
        assert!(registry.get(TEAM_SUBJECT_TYPE).is_ok());
    }

    #[test]
    fn test_unregistered_tag_fails_with_instance_type_error() {
        let registry = builtin_scope_types();
        let err = registry.get("table").unwrap_err();
        assert!(matches!(
            err,
            CoterieError::InstanceTypeDoesNotExist { type_name } if type_name == "table"
        ));
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = builtin_scope_types();
        registry.register(Arc::new(GroupScopeType) as Arc<dyn ScopeType>);
        assert_eq!(registry.registered_types().len(), 1);
    }
}
