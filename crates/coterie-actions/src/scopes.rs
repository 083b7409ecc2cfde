//! Action scope strings.
//!
//! Undo history is partitioned by an opaque scope string so unrelated
//! tenants' histories never interleave. The only scope the engine uses
//! today is the per-group scope.

use uuid::Uuid;

/// The scope string for a group's undo history.
#[must_use]
pub fn group_scope(group_id: Uuid) -> String {
    format!("group_{group_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_scope_format() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            group_scope(id),
            "group_550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_distinct_groups_get_distinct_scopes() {
        assert_ne!(group_scope(Uuid::new_v4()), group_scope(Uuid::new_v4()));
    }
}
