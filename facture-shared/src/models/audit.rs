/// Audit log model
///
/// Append-only record of every permitted mutation. Entries are written in
/// the same transaction as the mutation they describe, so a committed change
/// always has its audit entry and a rolled-back change never does. There is
/// no update or delete path.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE audit_log (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     actor_user_id UUID NOT NULL,
///     action VARCHAR(100) NOT NULL,
///     resource_type VARCHAR(50) NOT NULL,
///     resource_id VARCHAR(255),
///     metadata JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    /// Unique entry ID (UUID v4)
    pub id: Uuid,

    /// Organization the action happened in
    pub organization_id: Uuid,

    /// User who performed the action; retained even after the user or their
    /// membership is deleted
    pub actor_user_id: Uuid,

    /// Action identifier, e.g. `invoice.created`, `member.removed`
    pub action: String,

    /// Type of the affected resource, e.g. `invoice`, `membership`
    pub resource_type: String,

    /// Identifier of the affected resource, if any
    pub resource_id: Option<String>,

    /// Free-form context for the entry
    pub metadata: Value,

    /// When the action happened
    pub created_at: DateTime<Utc>,
}

/// Input for recording an audit entry
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub organization_id: Uuid,
    pub actor_user_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub metadata: Value,
}

impl AuditEntry {
    /// Records an audit entry on the caller's connection
    ///
    /// Takes a `&mut PgConnection` rather than a pool so the write joins the
    /// caller's transaction: call with `&mut *tx` and the entry commits or
    /// rolls back together with the mutation it describes.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use facture_shared::models::audit::{AuditEntry, NewAuditEntry};
    /// # use uuid::Uuid;
    /// # async fn example(pool: &sqlx::PgPool) -> Result<(), sqlx::Error> {
    /// let mut tx = pool.begin().await?;
    /// // ... perform the mutation on &mut *tx ...
    /// AuditEntry::record(&mut tx, NewAuditEntry {
    ///     organization_id: Uuid::new_v4(),
    ///     actor_user_id: Uuid::new_v4(),
    ///     action: "client.created".to_string(),
    ///     resource_type: "client".to_string(),
    ///     resource_id: None,
    ///     metadata: serde_json::json!({}),
    /// }).await?;
    /// tx.commit().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn record(
        conn: &mut PgConnection,
        entry: NewAuditEntry,
    ) -> Result<Self, sqlx::Error> {
        let recorded = sqlx::query_as::<_, AuditEntry>(
            r#"
            INSERT INTO audit_log (organization_id, actor_user_id, action, resource_type,
                                   resource_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, organization_id, actor_user_id, action, resource_type,
                      resource_id, metadata, created_at
            "#,
        )
        .bind(entry.organization_id)
        .bind(entry.actor_user_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.metadata)
        .fetch_one(conn)
        .await?;

        Ok(recorded)
    }

    /// Lists an organization's audit entries, newest first
    ///
    /// `limit` is clamped to 1..=100; `offset` pages through older entries.
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, organization_id, actor_user_id, action, resource_type,
                   resource_id, metadata, created_at
            FROM audit_log
            WHERE organization_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    /// Counts an organization's audit entries
    pub async fn count_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE organization_id = $1")
                .bind(organization_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
