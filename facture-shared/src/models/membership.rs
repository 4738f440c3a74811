/// Membership model and database operations
///
/// This module provides the Membership model binding a user to an
/// organization with a role. A user holds at most one active membership per
/// organization. Membership is the first authority check in the request
/// gate: no membership row means every downstream check is moot.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE memberships (
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role_id UUID NOT NULL REFERENCES roles(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (organization_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use facture_shared::models::membership::{Membership, CreateMembership};
/// use facture_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(org_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let membership = Membership::create(&pool, CreateMembership {
///     organization_id: org_id,
///     user_id,
///     role_id,
/// }).await?;
///
/// let is_member = Membership::find(&pool, org_id, user_id).await?.is_some();
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Membership model representing a user-organization binding
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Organization ID
    pub organization_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role held within the organization
    pub role_id: Uuid,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    /// Organization ID
    pub organization_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role to assign
    pub role_id: Uuid,
}

/// A membership joined with its role name, for member listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MemberRow {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub role_name: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    /// Creates a new membership (adds user to organization)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Membership already exists (unique constraint violation)
    /// - Organization, user, or role doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        data: CreateMembership,
    ) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (organization_id, user_id, role_id)
            VALUES ($1, $2, $3)
            RETURNING organization_id, user_id, role_id, created_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.user_id)
        .bind(data.role_id)
        .fetch_one(db)
        .await?;

        Ok(membership)
    }

    /// Finds a specific membership by organization and user
    ///
    /// Re-resolved on every request (no caching) so that a concurrent
    /// removal takes effect immediately.
    pub async fn find(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT organization_id, user_id, role_id, created_at
            FROM memberships
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Changes a member's role
    ///
    /// Returns the updated membership, or None if no membership exists.
    pub async fn update_role<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        user_id: Uuid,
        role_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE memberships
            SET role_id = $3
            WHERE organization_id = $1 AND user_id = $2
            RETURNING organization_id, user_id, role_id, created_at
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(db)
        .await?;

        Ok(membership)
    }

    /// Deletes a membership (removes user from organization)
    ///
    /// Returns true if a row was deleted.
    pub async fn delete<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM memberships WHERE organization_id = $1 AND user_id = $2")
                .bind(organization_id)
                .bind(user_id)
                .execute(db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists all members of an organization with user and role details
    pub async fn list_members(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<MemberRow>, sqlx::Error> {
        let members = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m.organization_id, m.user_id, m.role_id, r.name AS role_name,
                   u.email, u.name, m.created_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            JOIN roles r ON r.id = m.role_id
            WHERE m.organization_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Lists all organizations a user belongs to
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let memberships = sqlx::query_as::<_, Membership>(
            r#"
            SELECT organization_id, user_id, role_id, created_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(memberships)
    }

    /// Counts members in an organization
    ///
    /// Used by the plan-limit evaluator for the add-user action.
    pub async fn count_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    /// Counts members holding a given role
    ///
    /// Used to refuse removing or demoting the last owner.
    pub async fn count_with_role<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        role_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE organization_id = $1 AND role_id = $2",
        )
        .bind(organization_id)
        .bind(role_id)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}
