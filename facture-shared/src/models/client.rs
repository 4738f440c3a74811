/// Client (customer) model
///
/// A client is a billable counterparty owned by exactly one organization.
/// Every query is scoped by `organization_id`; there is no cross-tenant
/// lookup path. The per-organization client count is what the plan limit
/// for `client.create` is measured against.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE clients (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255),
///     address TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Client model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    /// Unique client ID (UUID v4)
    pub id: Uuid,

    /// Owning organization
    pub organization_id: Uuid,

    /// Client display name
    pub name: String,

    /// Contact email, if any
    pub email: Option<String>,

    /// Billing address, if any
    pub address: Option<String>,

    /// When the client was created
    pub created_at: DateTime<Utc>,

    /// When the client was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a client
#[derive(Debug, Clone)]
pub struct CreateClient {
    pub organization_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Input for updating a client; None fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateClient {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl Client {
    /// Creates a client
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        data: CreateClient,
    ) -> Result<Self, sqlx::Error> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (organization_id, name, email, address)
            VALUES ($1, $2, $3, $4)
            RETURNING id, organization_id, name, email, address, created_at, updated_at
            "#,
        )
        .bind(data.organization_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.address)
        .fetch_one(db)
        .await?;

        Ok(client)
    }

    /// Finds a client within an organization
    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, organization_id, name, email, address, created_at, updated_at
            FROM clients
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(db)
        .await?;

        Ok(client)
    }

    /// Lists an organization's clients, newest first
    pub async fn list_by_organization<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT id, organization_id, name, email, address, created_at, updated_at
            FROM clients
            WHERE organization_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(db)
        .await?;

        Ok(clients)
    }

    /// Updates a client's mutable fields
    pub async fn update<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
        data: UpdateClient,
    ) -> Result<Option<Self>, sqlx::Error> {
        let client = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients
            SET name = COALESCE($3, name),
                email = COALESCE($4, email),
                address = COALESCE($5, address),
                updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING id, organization_id, name, email, address, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.address)
        .fetch_optional(db)
        .await?;

        Ok(client)
    }

    /// Deletes a client, returning whether a row was removed
    pub async fn delete<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1 AND organization_id = $2")
            .bind(id)
            .bind(organization_id)
            .execute(db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts an organization's clients (plan-limit input for client creation)
    pub async fn count_by_organization<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(db)
                .await?;

        Ok(count)
    }
}
