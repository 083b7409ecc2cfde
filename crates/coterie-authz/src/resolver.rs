//! Scope and subject resolution.
//!
//! Maps opaque (type tag, id) pairs to concrete entities and back. The
//! indirection lets the action log store scope and subject references as
//! portable (string, id) pairs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use coterie_core::{CoterieError, Result};
use coterie_db::models::{SubjectRef, Team, User};

use crate::registry::{
    Registry, ScopeType, SubjectType, GROUP_SCOPE_TYPE, TEAM_SUBJECT_TYPE, USER_SUBJECT_TYPE,
};

/// A resolved, validated reference to a role-assignment scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRef {
    /// The scope's registered type tag.
    pub scope_type: String,
    /// The scope's id.
    pub scope_id: Uuid,
}

impl ScopeRef {
    /// The group-level scope of a group.
    #[must_use]
    pub fn group(group_id: Uuid) -> Self {
        Self {
            scope_type: GROUP_SCOPE_TYPE.to_string(),
            scope_id: group_id,
        }
    }

    /// Whether this is the group-level scope of the given group.
    #[must_use]
    pub fn is_group_level(&self, group_id: Uuid) -> bool {
        self.scope_type == GROUP_SCOPE_TYPE && self.scope_id == group_id
    }
}

/// A resolved role-assignment subject.
#[derive(Debug, Clone)]
pub enum Subject {
    /// An individual user.
    User(User),
    /// A team.
    Team(Team),
}

impl Subject {
    /// The subject's id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            Subject::User(user) => user.id,
            Subject::Team(team) => team.id,
        }
    }

    /// The subject's registered type tag.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Subject::User(_) => USER_SUBJECT_TYPE,
            Subject::Team(_) => TEAM_SUBJECT_TYPE,
        }
    }

    /// The portable (tag, id) reference for this subject.
    #[must_use]
    pub fn subject_ref(&self) -> SubjectRef {
        match self {
            Subject::User(user) => SubjectRef::user(user.id),
            Subject::Team(team) => SubjectRef::team(team.id),
        }
    }
}

/// Resolves (type tag, id) pairs through the startup-time registries.
#[derive(Clone)]
pub struct ScopeResolver {
    pool: PgPool,
    scope_types: Arc<Registry<dyn ScopeType>>,
    subject_types: Arc<Registry<dyn SubjectType>>,
}

impl ScopeResolver {
    /// Creates a resolver over the given registries.
    #[must_use]
    pub fn new(
        pool: PgPool,
        scope_types: Arc<Registry<dyn ScopeType>>,
        subject_types: Arc<Registry<dyn SubjectType>>,
    ) -> Self {
        Self {
            pool,
            scope_types,
            subject_types,
        }
    }

    /// Resolves a scope reference, verifying the tag is registered and the
    /// instance exists.
    pub async fn resolve_scope(&self, type_name: &str, id: Uuid) -> Result<ScopeRef> {
        let scope_type = self.scope_types.get(type_name)?;
        if !scope_type.exists(&self.pool, id).await? {
            return Err(CoterieError::not_found_id("Scope", id));
        }
        Ok(ScopeRef {
            scope_type: scope_type.type_name().to_string(),
            scope_id: id,
        })
    }

    /// Resolves a subject, verifying the tag is registered and loading the
    /// concrete entity.
    pub async fn resolve_subject(&self, type_name: &str, id: Uuid) -> Result<Subject> {
        let subject_type = self.subject_types.get(type_name)?;
        subject_type
            .load(&self.pool, id)
            .await?
            .ok_or_else(|| CoterieError::not_found_id("Subject", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_scope_ref() {
        let group_id = Uuid::new_v4();
        let scope = ScopeRef::group(group_id);
        assert_eq!(scope.scope_type, GROUP_SCOPE_TYPE);
        assert!(scope.is_group_level(group_id));
        assert!(!scope.is_group_level(Uuid::new_v4()));
    }

    #[test]
    fn test_non_group_scope_is_not_group_level() {
        let group_id = Uuid::new_v4();
        let scope = ScopeRef {
            scope_type: "table".to_string(),
            scope_id: group_id,
        };
        assert!(!scope.is_group_level(group_id));
    }

    #[test]
    fn test_scope_ref_serde_roundtrip() {
        let scope = ScopeRef::group(Uuid::new_v4());
        let json = serde_json::to_string(&scope).unwrap();
        let back: ScopeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(scope, back);
    }
}
