//! Team model.
//!
//! A team is a named set of users inside a group that can receive role
//! assignments as a single subject.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// A role-assignment subject grouping several users.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier.
    pub id: Uuid,
    /// The group the team belongs to.
    pub group_id: Uuid,
    /// Display name.
    pub name: String,
    /// When the team was created.
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Insert a new team.
    pub async fn create<'e, E>(
        executor: E,
        group_id: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            INSERT INTO teams (group_id, name)
            VALUES ($1, $2)
            RETURNING id, group_id, name, created_at
            ",
        )
        .bind(group_id)
        .bind(name)
        .fetch_one(executor)
        .await
    }

    /// Find a team by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as(
            r"
            SELECT id, group_id, name, created_at
            FROM teams
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Whether a team with the given ID exists.
    pub async fn exists<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM teams WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await?;
        Ok(row.0)
    }

    /// Add a user to the team.
    pub async fn add_member<'e, E>(
        executor: E,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            INSERT INTO team_users (team_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(team_id)
        .bind(user_id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Team IDs the user belongs to inside the given group. Used when
    /// resolving role assignments granted through team membership.
    pub async fn ids_for_user<'e, E>(
        executor: E,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r"
            SELECT t.id
            FROM teams t
            JOIN team_users tu ON tu.team_id = t.id
            WHERE t.group_id = $1 AND tu.user_id = $2
            ",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
