/// Organization model and database operations
///
/// This module provides the Organization model, the tenant boundary for
/// multi-tenant isolation. Every business record (client, invoice, audit
/// entry) is owned by exactly one organization: no query may return rows
/// whose organization id differs from the caller's active organization.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     plan VARCHAR(50) NOT NULL DEFAULT 'trial',
///     trial_ends_at TIMESTAMPTZ,
///     billing_customer_id VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT organizations_plan_check CHECK (
///         plan IN ('trial', 'starter', 'growth', 'enterprise')
///     )
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use facture_shared::models::organization::{Organization, CreateOrganization, OrganizationPlan};
/// use facture_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let org = Organization::create(&pool, CreateOrganization {
///     name: "Acme Corp".to_string(),
///     plan: OrganizationPlan::Trial,
/// }).await?;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Subscription plan tiers
///
/// Plans determine resource-count ceilings and rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationPlan {
    /// Trial plan (14 days, tight limits)
    Trial,

    /// Starter plan (small teams)
    Starter,

    /// Growth plan (larger teams, generous limits)
    Growth,

    /// Enterprise plan (no resource ceilings)
    Enterprise,
}

impl OrganizationPlan {
    /// Converts plan to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationPlan::Trial => "trial",
            OrganizationPlan::Starter => "starter",
            OrganizationPlan::Growth => "growth",
            OrganizationPlan::Enterprise => "enterprise",
        }
    }

    /// Parses plan from its database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trial" => Some(OrganizationPlan::Trial),
            "starter" => Some(OrganizationPlan::Starter),
            "growth" => Some(OrganizationPlan::Growth),
            "enterprise" => Some(OrganizationPlan::Enterprise),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrganizationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Length of the trial period granted at registration
pub const TRIAL_PERIOD_DAYS: i64 = 14;

/// Organization model representing a tenant
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organization {
    /// Unique organization ID (UUID v4)
    pub id: Uuid,

    /// Organization name
    pub name: String,

    /// Current subscription plan (stored as text)
    pub plan: String,

    /// When the trial expires (trial plan only)
    pub trial_ends_at: Option<DateTime<Utc>>,

    /// External billing-customer reference (if billing enabled)
    pub billing_customer_id: Option<String>,

    /// When the organization was created
    pub created_at: DateTime<Utc>,

    /// When the organization was last updated
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Gets the parsed plan enum
    ///
    /// Unknown values in the column fall back to `None`; callers treat that
    /// as the most restrictive plan.
    pub fn get_plan(&self) -> Option<OrganizationPlan> {
        OrganizationPlan::parse(&self.plan)
    }
}

/// Input for creating a new organization
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganization {
    /// Organization name
    pub name: String,

    /// Initial plan (defaults to Trial)
    #[serde(default = "default_plan")]
    pub plan: OrganizationPlan,
}

fn default_plan() -> OrganizationPlan {
    OrganizationPlan::Trial
}

impl Organization {
    /// Creates a new organization
    ///
    /// Trial organizations get a `trial_ends_at` of now + TRIAL_PERIOD_DAYS;
    /// paid plans get none.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        data: CreateOrganization,
    ) -> Result<Self, sqlx::Error> {
        let trial_ends_at = match data.plan {
            OrganizationPlan::Trial => Some(Utc::now() + Duration::days(TRIAL_PERIOD_DAYS)),
            _ => None,
        };

        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, plan, trial_ends_at)
            VALUES ($1, $2, $3)
            RETURNING id, name, plan, trial_ends_at, billing_customer_id, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.plan.as_str())
        .bind(trial_ends_at)
        .fetch_one(db)
        .await?;

        Ok(org)
    }

    /// Finds an organization by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, plan, trial_ends_at, billing_customer_id, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(org)
    }

    /// Renames an organization
    pub async fn rename<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, plan, trial_ends_at, billing_customer_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(db)
        .await?;

        Ok(org)
    }

    /// Changes an organization's plan
    ///
    /// Called from the billing webhook when the provider reports a plan
    /// change. Moving off trial clears the trial expiry.
    pub async fn update_plan<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        plan: OrganizationPlan,
    ) -> Result<Option<Self>, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET plan = $2,
                trial_ends_at = CASE WHEN $2 = 'trial' THEN trial_ends_at ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, plan, trial_ends_at, billing_customer_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(plan.as_str())
        .fetch_optional(db)
        .await?;

        Ok(org)
    }

    /// Stores the external billing-customer reference
    pub async fn set_billing_customer<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        billing_customer_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE organizations SET billing_customer_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(billing_customer_id)
        .execute(db)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_as_str() {
        assert_eq!(OrganizationPlan::Trial.as_str(), "trial");
        assert_eq!(OrganizationPlan::Starter.as_str(), "starter");
        assert_eq!(OrganizationPlan::Growth.as_str(), "growth");
        assert_eq!(OrganizationPlan::Enterprise.as_str(), "enterprise");
    }

    #[test]
    fn test_plan_parse_roundtrip() {
        for plan in [
            OrganizationPlan::Trial,
            OrganizationPlan::Starter,
            OrganizationPlan::Growth,
            OrganizationPlan::Enterprise,
        ] {
            assert_eq!(OrganizationPlan::parse(plan.as_str()), Some(plan));
        }
    }

    #[test]
    fn test_plan_parse_unknown() {
        assert_eq!(OrganizationPlan::parse("platinum"), None);
        assert_eq!(OrganizationPlan::parse(""), None);
        assert_eq!(OrganizationPlan::parse("TRIAL"), None);
    }

    #[test]
    fn test_get_plan_unknown_column_value() {
        let org = Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            plan: "legacy".to_string(),
            trial_ends_at: None,
            billing_customer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(org.get_plan(), None);
    }

    #[test]
    fn test_default_plan_is_trial() {
        assert_eq!(default_plan(), OrganizationPlan::Trial);
    }
}
