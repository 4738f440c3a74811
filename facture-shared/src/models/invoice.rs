/// Invoice model
///
/// Invoices are organization-scoped, numbered uniquely per organization, and
/// counted per calendar month (UTC) for plan-limit enforcement: the limit on
/// `invoice.create` applies to invoices created in the current month, not a
/// rolling 30-day window.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invoices (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     client_id UUID NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
///     number VARCHAR(50) NOT NULL,
///     status VARCHAR(20) NOT NULL DEFAULT 'draft',
///     amount_cents BIGINT NOT NULL,
///     currency VARCHAR(3) NOT NULL DEFAULT 'USD',
///     due_date DATE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (organization_id, number)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::plan::month_window;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    /// Parses status from its database representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "void" => Some(InvoiceStatus::Void),
            _ => None,
        }
    }
}

/// Invoice model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    /// Unique invoice ID (UUID v4)
    pub id: Uuid,

    /// Owning organization
    pub organization_id: Uuid,

    /// Client the invoice bills
    pub client_id: Uuid,

    /// Invoice number, unique within the organization
    pub number: String,

    /// Current status (stored as text)
    pub status: String,

    /// Amount in the smallest currency unit
    pub amount_cents: i64,

    /// ISO 4217 currency code
    pub currency: String,

    /// Payment due date, if set
    pub due_date: Option<NaiveDate>,

    /// When the invoice was created; determines which monthly quota window
    /// it counts toward
    pub created_at: DateTime<Utc>,

    /// When the invoice was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an invoice
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub organization_id: Uuid,
    pub client_id: Uuid,
    pub number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub due_date: Option<NaiveDate>,
}

impl Invoice {
    /// Creates an invoice in `draft` status
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        data: CreateInvoice,
    ) -> Result<Self, sqlx::Error> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (organization_id, client_id, number, amount_cents, currency, due_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, organization_id, client_id, number, status, amount_cents, currency,
                      due_date, created_at, updated_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.client_id)
        .bind(&data.number)
        .bind(data.amount_cents)
        .bind(&data.currency)
        .bind(data.due_date)
        .fetch_one(db)
        .await?;

        Ok(invoice)
    }

    /// Finds an invoice within an organization
    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, organization_id, client_id, number, status, amount_cents, currency,
                   due_date, created_at, updated_at
            FROM invoices
            WHERE id = $1 AND organization_id = $2
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(db)
        .await?;

        Ok(invoice)
    }

    /// Lists an organization's invoices, newest first
    pub async fn list_by_organization<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, organization_id, client_id, number, status, amount_cents, currency,
                   due_date, created_at, updated_at
            FROM invoices
            WHERE organization_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

        Ok(invoices)
    }

    /// Updates an invoice's status
    pub async fn update_status<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        id: Uuid,
        status: InvoiceStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND organization_id = $2
            RETURNING id, organization_id, client_id, number, status, amount_cents, currency,
                      due_date, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(organization_id)
        .bind(status.as_str())
        .fetch_optional(db)
        .await?;

        Ok(invoice)
    }

    /// Counts invoices created in the calendar month containing `now`
    ///
    /// Plan-limit input for invoice creation. The window is
    /// `[first instant of the month, first instant of the next month)` in
    /// UTC; the count resets when the month rolls over, regardless of how
    /// recently the previous month's invoices were created.
    pub async fn count_in_month<'e>(
        db: impl PgExecutor<'e>,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (start, end) = month_window(now);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM invoices
            WHERE organization_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(organization_id)
        .bind(start)
        .bind(end)
        .fetch_one(db)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Void,
        ] {
            assert_eq!(InvoiceStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InvoiceStatus::parse("overdue"), None);
    }
}
