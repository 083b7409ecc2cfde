//! Permission checking, type registries and scoped role assignment.
//!
//! # Modules
//!
//! - [`registry`] - generic startup-time registries plus the scope and
//!   subject type traits
//! - [`operations`] - operation definitions and the built-in operation set
//! - [`resolver`] - maps (type tag, id) pairs to concrete entities
//! - [`permissions`] - the permission-manager chain and checker
//! - [`roles`] - the role assignment store
//! - [`actions`] - the reversible role-assignment action

pub mod actions;
pub mod operations;
pub mod permissions;
pub mod registry;
pub mod resolver;
pub mod roles;

pub use actions::AssignRoleActionType;
pub use operations::{builtin_operations, Operation};
pub use permissions::{
    Decision, FeatureGate, FeatureGatePermissionManager, MembershipPermissionManager,
    PermissionChecker, PermissionManager, RolePermissionManager,
};
pub use registry::{
    Registry, RegistryInstance, ScopeType, SubjectType, GROUP_SCOPE_TYPE, TEAM_SUBJECT_TYPE,
    USER_SUBJECT_TYPE,
};
pub use resolver::{ScopeRef, ScopeResolver, Subject};
pub use roles::RoleAssignmentHandler;
