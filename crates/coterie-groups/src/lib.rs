//! Group, membership and invitation lifecycle services.
//!
//! # Modules
//!
//! - [`token`] - HMAC-signed invitation tokens
//! - [`mailer`] - the mail-dispatch seam
//! - [`invitations`] - the invitation lifecycle service
//! - [`groups`] - group and membership service
//! - [`actions`] - the reversible invitation and group action types

pub mod actions;
pub mod groups;
pub mod invitations;
pub mod mailer;
pub mod token;

pub use actions::{
    CreateGroupActionType, CreateInvitationActionType, DeleteInvitationActionType,
    UpdateInvitationActionType,
};
pub use groups::GroupService;
pub use invitations::GroupInvitationService;
pub use mailer::{InvitationMail, InvitationMailer, LoggingMailer};
pub use token::{TokenClaims, TokenSigner};

use std::sync::Arc;

use sqlx::PgPool;

use coterie_actions::ActionTypeRegistry;
use coterie_authz::{AssignRoleActionType, PermissionChecker, RoleAssignmentHandler};

/// Registers every built-in action type. Called once during startup
/// wiring, before the registry is shared with the action handler.
pub fn register_action_types(
    registry: &mut ActionTypeRegistry,
    pool: PgPool,
    checker: Arc<PermissionChecker>,
    roles: RoleAssignmentHandler,
) {
    registry.register(Arc::new(AssignRoleActionType::new(pool, checker.clone(), roles)));
    registry.register(Arc::new(CreateInvitationActionType::new(checker.clone())));
    registry.register(Arc::new(UpdateInvitationActionType::new(checker.clone())));
    registry.register(Arc::new(DeleteInvitationActionType::new(checker.clone())));
    registry.register(Arc::new(CreateGroupActionType::new(checker)));
}
