//! Operation definitions.
//!
//! An operation names one permission-gated capability. The registry maps
//! the operation name to the coarse membership level it requires and, for
//! feature-gated operations, the feature tag a group must have active.

use std::sync::Arc;

use coterie_db::models::GroupPermission;

use crate::registry::{Registry, RegistryInstance};

/// Role assignment is gated behind this feature tag.
pub const RBAC_FEATURE: &str = "rbac";

/// One permission-gated capability.
#[derive(Debug, Clone)]
pub struct Operation {
    /// Stable operation name, e.g. `"group.create_invitation"`.
    pub name: &'static str,
    /// Coarse membership level required when no finer grant applies.
    pub required: GroupPermission,
    /// Feature tag that must be active for the group, if any.
    pub feature: Option<&'static str>,
}

impl RegistryInstance for Operation {
    fn type_name(&self) -> &'static str {
        self.name
    }
}

/// Operation names used by the engine.
pub mod ops {
    pub const LIST_INVITATIONS: &str = "group.list_invitations";
    pub const READ_INVITATION: &str = "group.read_invitation";
    pub const CREATE_INVITATION: &str = "group.create_invitation";
    pub const UPDATE_INVITATION: &str = "group.update_invitation";
    pub const DELETE_INVITATION: &str = "group.delete_invitation";
    pub const ASSIGN_ROLE: &str = "group.assign_role";
    pub const UPDATE_GROUP: &str = "group.update";
    pub const DELETE_GROUP: &str = "group.delete";
    pub const REMOVE_MEMBER: &str = "group.remove_member";
    pub const LIST_MEMBERS: &str = "group.list_members";
}

/// The operation registry with every built-in operation registered.
#[must_use]
pub fn builtin_operations() -> Registry<Operation> {
    let defs = [
        Operation {
            name: ops::LIST_INVITATIONS,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::READ_INVITATION,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::CREATE_INVITATION,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::UPDATE_INVITATION,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::DELETE_INVITATION,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::ASSIGN_ROLE,
            required: GroupPermission::Admin,
            feature: Some(RBAC_FEATURE),
        },
        Operation {
            name: ops::UPDATE_GROUP,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::DELETE_GROUP,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::REMOVE_MEMBER,
            required: GroupPermission::Admin,
            feature: None,
        },
        Operation {
            name: ops::LIST_MEMBERS,
            required: GroupPermission::Member,
            feature: None,
        },
    ];

    let mut registry = Registry::new("operation");
    for def in defs {
        registry.register(Arc::new(def));
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_operations_resolve_by_name() {
        let registry = builtin_operations();
        let op = registry.get(ops::CREATE_INVITATION).unwrap();
        assert_eq!(op.required, GroupPermission::Admin);
        assert!(op.feature.is_none());
    }

    #[test]
    fn test_assign_role_is_feature_gated() {
        let registry = builtin_operations();
        let op = registry.get(ops::ASSIGN_ROLE).unwrap();
        assert_eq!(op.feature, Some(RBAC_FEATURE));
    }

    #[test]
    fn test_unknown_operation_fails() {
        let registry = builtin_operations();
        assert!(registry.get("group.frobnicate").is_err());
    }
}
