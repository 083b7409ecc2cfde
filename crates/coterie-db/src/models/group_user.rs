//! Group membership model.
//!
//! Links a user to a group with a coarse permission level. Created on group
//! creation (the creator becomes an admin) or on invitation acceptance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Coarse membership permission level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "group_permission", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupPermission {
    /// Full control over the group, its members and invitations.
    Admin,
    /// Regular member.
    Member,
}

impl GroupPermission {
    /// Whether this level satisfies the given requirement.
    #[must_use]
    pub fn satisfies(&self, required: GroupPermission) -> bool {
        match required {
            GroupPermission::Member => true,
            GroupPermission::Admin => matches!(self, GroupPermission::Admin),
        }
    }
}

impl std::fmt::Display for GroupPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupPermission::Admin => write!(f, "admin"),
            GroupPermission::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for GroupPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(GroupPermission::Admin),
            "member" => Ok(GroupPermission::Member),
            _ => Err(format!("Invalid group permission: {s}")),
        }
    }
}

/// A user's membership in a group.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct GroupUser {
    /// Unique identifier.
    pub id: Uuid,
    /// The group.
    pub group_id: Uuid,
    /// The member.
    pub user_id: Uuid,
    /// Coarse permission level.
    pub permissions: GroupPermission,
    /// When the membership was created.
    pub created_at: DateTime<Utc>,
}

impl GroupUser {
    /// Insert a membership, or update the permission level of an existing
    /// one (reactivation on invitation acceptance).
    pub async fn create_or_update<'e, E>(
        executor: E,
        group_id: Uuid,
        user_id: Uuid,
        permissions: GroupPermission,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO group_users (group_id, user_id, permissions)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, user_id)
            DO UPDATE SET permissions = EXCLUDED.permissions
            RETURNING id, group_id, user_id, permissions, created_at
            ",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(permissions)
        .fetch_one(executor)
        .await
    }

    /// Find a membership by group and user.
    pub async fn find_by_group_and_user<'e, E>(
        executor: E,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, user_id, permissions, created_at
            FROM group_users
            WHERE group_id = $1 AND user_id = $2
            ",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Whether a member with the given normalized email already exists in
    /// the group. Used to reject invitations targeting existing members.
    pub async fn member_exists_by_email<'e, E>(
        executor: E,
        group_id: Uuid,
        email: &str,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS(
                SELECT 1
                FROM group_users gu
                JOIN users u ON u.id = gu.user_id
                WHERE gu.group_id = $1 AND u.email = $2
            )
            ",
        )
        .bind(group_id)
        .bind(email)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// List memberships of a group.
    pub async fn list_by_group<'e, E>(executor: E, group_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, user_id, permissions, created_at
            FROM group_users
            WHERE group_id = $1
            ORDER BY created_at
            ",
        )
        .bind(group_id)
        .fetch_all(executor)
        .await
    }

    /// Count the admins of a group. Used by the last-admin guard.
    pub async fn count_admins<'e, E>(executor: E, group_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM group_users WHERE group_id = $1 AND permissions = 'admin'",
        )
        .bind(group_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Remove a membership.
    pub async fn delete<'e, E>(
        executor: E,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM group_users WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_permission_display() {
        assert_eq!(GroupPermission::Admin.to_string(), "admin");
        assert_eq!(GroupPermission::Member.to_string(), "member");
    }

    #[test]
    fn test_group_permission_from_str() {
        assert_eq!(
            "admin".parse::<GroupPermission>().unwrap(),
            GroupPermission::Admin
        );
        assert_eq!(
            "MEMBER".parse::<GroupPermission>().unwrap(),
            GroupPermission::Member
        );
        assert!("owner".parse::<GroupPermission>().is_err());
    }

    #[test]
    fn test_admin_satisfies_both_levels() {
        assert!(GroupPermission::Admin.satisfies(GroupPermission::Admin));
        assert!(GroupPermission::Admin.satisfies(GroupPermission::Member));
    }

    #[test]
    fn test_member_does_not_satisfy_admin() {
        assert!(!GroupPermission::Member.satisfies(GroupPermission::Admin));
        assert!(GroupPermission::Member.satisfies(GroupPermission::Member));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&GroupPermission::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }
}
