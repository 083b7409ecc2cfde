//! Database models.

pub mod action;
pub mod group;
pub mod group_invitation;
pub mod group_user;
pub mod role;
pub mod role_assignment;
pub mod team;
pub mod user;

pub use action::{Action, CreateAction};
pub use group::Group;
pub use group_invitation::{CreateGroupInvitation, GroupInvitation, UpdateGroupInvitation};
pub use group_user::{GroupPermission, GroupUser};
pub use role::Role;
pub use role_assignment::{RoleAssignment, SubjectRef};
pub use team::Team;
pub use user::User;
