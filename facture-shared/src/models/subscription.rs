/// Subscription model
///
/// Local mirror of the billing provider's subscription state, maintained by
/// the billing webhook. The organization's `plan` column is what the gate
/// reads; this table keeps the provider linkage so webhook events can be
/// mapped back to an organization.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE subscriptions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL UNIQUE REFERENCES organizations(id) ON DELETE CASCADE,
///     external_id VARCHAR(255) NOT NULL,
///     plan VARCHAR(20) NOT NULL,
///     status VARCHAR(20) NOT NULL,
///     current_period_end TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Subscription model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    /// Unique subscription ID (UUID v4)
    pub id: Uuid,

    /// Organization this subscription belongs to (one per organization)
    pub organization_id: Uuid,

    /// The billing provider's subscription identifier
    pub external_id: String,

    /// Plan the provider says the organization is on
    pub plan: String,

    /// Provider-side status, e.g. `active`, `past_due`, `canceled`
    pub status: String,

    /// End of the current billing period, if the provider reports one
    pub current_period_end: Option<DateTime<Utc>>,

    /// When the mirror row was created
    pub created_at: DateTime<Utc>,

    /// When the mirror row was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for upserting a subscription from a webhook event
#[derive(Debug, Clone)]
pub struct UpsertSubscription {
    pub organization_id: Uuid,
    pub external_id: String,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Upserts the organization's subscription mirror
    ///
    /// Webhook deliveries can arrive more than once; the upsert makes
    /// processing idempotent per organization.
    pub async fn upsert<'e>(
        db: impl PgExecutor<'e>,
        data: UpsertSubscription,
    ) -> Result<Self, sqlx::Error> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (organization_id, external_id, plan, status, current_period_end)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (organization_id) DO UPDATE
            SET external_id = EXCLUDED.external_id,
                plan = EXCLUDED.plan,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = NOW()
            RETURNING id, organization_id, external_id, plan, status, current_period_end,
                      created_at, updated_at
            "#,
        )
        .bind(data.organization_id)
        .bind(&data.external_id)
        .bind(&data.plan)
        .bind(&data.status)
        .bind(data.current_period_end)
        .fetch_one(db)
        .await?;

        Ok(subscription)
    }

    /// Finds an organization's subscription mirror
    pub async fn find_by_organization<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, organization_id, external_id, plan, status, current_period_end,
                   created_at, updated_at
            FROM subscriptions
            WHERE organization_id = $1
            "#,
        )
        .bind(organization_id)
        .fetch_optional(db)
        .await?;

        Ok(subscription)
    }
}
