//! Action type registry.
//!
//! Concrete action types are constructed with their collaborators at
//! startup, registered once, and the registry is treated as immutable
//! while serving. Params are plain serialized structs, not closures, so a
//! logged action can be replayed by a different process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;

use coterie_core::{CoterieError, Result};
use coterie_db::models::{Action, User};

/// One reversible action type.
///
/// `perform` is not part of the trait: its signature is specific to each
/// action, so concrete types expose it as an inherent method. Undo and
/// redo are uniform because they only receive the stored params.
///
/// Both undo and redo must re-check permissions as of now, not as of the
/// original action; a permission revoked since then blocks the replay.
/// The replayed mutation runs on `conn`, the handler's open transaction,
/// so it commits atomically with the `undone_at` stamp.
#[async_trait]
pub trait ActionType: Send + Sync {
    /// Stable type tag stored on the action row.
    fn action_type(&self) -> &'static str;

    /// Re-apply the *previous* state captured in `params`.
    async fn undo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        action: &Action,
    ) -> Result<()>;

    /// Re-apply the *new* state captured in `params`.
    async fn redo(
        &self,
        conn: &mut PgConnection,
        actor: &User,
        params: JsonValue,
        action: &Action,
    ) -> Result<()>;
}

impl std::fmt::Debug for dyn ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionType")
            .field("action_type", &self.action_type())
            .finish()
    }
}

/// Startup-time lookup table from action type tag to implementation.
#[derive(Default)]
pub struct ActionTypeRegistry {
    types: HashMap<&'static str, Arc<dyn ActionType>>,
}

impl ActionTypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action type. Last registration wins for a duplicate
    /// tag; registration only happens during startup wiring.
    pub fn register(&mut self, action_type: Arc<dyn ActionType>) {
        self.types.insert(action_type.action_type(), action_type);
    }

    /// Looks up an action type by tag.
    pub fn get(&self, type_name: &str) -> Result<Arc<dyn ActionType>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| CoterieError::InstanceTypeDoesNotExist {
                type_name: type_name.to_string(),
            })
    }

    /// Registered tags, for diagnostics.
    #[must_use]
    pub fn registered_types(&self) -> Vec<&'static str> {
        self.types.keys().copied().collect()
    }
}

impl std::fmt::Debug for ActionTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTypeRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAction;

    #[async_trait]
    impl ActionType for NoopAction {
        fn action_type(&self) -> &'static str {
            "noop"
        }

        async fn undo(
            &self,
            _conn: &mut PgConnection,
            _actor: &User,
            _params: JsonValue,
            _action: &Action,
        ) -> Result<()> {
            Ok(())
        }

        async fn redo(
            &self,
            _conn: &mut PgConnection,
            _actor: &User,
            _params: JsonValue,
            _action: &Action,
        ) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(Arc::new(NoopAction));

        let found = registry.get("noop").unwrap();
        assert_eq!(found.action_type(), "noop");
    }

    #[test]
    fn test_get_unregistered_tag_fails() {
        let registry = ActionTypeRegistry::new();
        let err = registry.get("assign_role").unwrap_err();
        assert!(matches!(
            err,
            CoterieError::InstanceTypeDoesNotExist { type_name } if type_name == "assign_role"
        ));
    }

    #[test]
    fn test_registered_types_lists_tags() {
        let mut registry = ActionTypeRegistry::new();
        registry.register(Arc::new(NoopAction));
        assert_eq!(registry.registered_types(), vec!["noop"]);
    }
}
