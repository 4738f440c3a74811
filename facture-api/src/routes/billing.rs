/// Billing provider webhook
///
/// # Endpoint
///
/// - `POST /v1/billing/webhook` - Receive subscription events
///
/// The webhook carries no user session. Callers authenticate with a shared
/// secret in the `X-Webhook-Secret` header, compared against the configured
/// secret via SHA-256 digests so the comparison doesn't leak length or
/// prefix timing.
///
/// # Idempotency
///
/// Providers redeliver events. The subscription mirror is an upsert keyed
/// by organization, so replaying an event converges on the same state.

use crate::{app::AppState, error::ApiResult};
use crate::error::ApiError;
use axum::{extract::State, http::HeaderMap, Json};
use chrono::{DateTime, Utc};
use facture_shared::models::{
    audit::{AuditEntry, NewAuditEntry},
    organization::{Organization, OrganizationPlan},
    subscription::{Subscription, UpsertSubscription},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A subscription event from the billing provider
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    /// Event type, e.g. `subscription.updated`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Organization the subscription belongs to
    pub organization_id: Uuid,

    /// Provider-side subscription identifier
    pub subscription_id: String,

    /// Plan the provider reports: `starter`, `growth`, or `enterprise`
    pub plan: String,

    /// Provider-side status, e.g. `active`, `past_due`, `canceled`
    pub status: String,

    /// Provider-side customer identifier
    pub customer_id: Option<String>,

    /// End of the current billing period
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Handle a billing provider webhook delivery
///
/// Mirrors the subscription and moves the organization onto the reported
/// plan, in one transaction with the audit entry. A canceled subscription
/// drops the organization back to trial.
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or wrong shared secret
/// - `400 Bad Request`: Unknown plan in the event
/// - `404 Not Found`: Unknown organization
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<BillingEvent>,
) -> ApiResult<Json<WebhookResponse>> {
    let provided = headers
        .get("X-Webhook-Secret")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing webhook secret".to_string()))?;

    if !secrets_match(provided, &state.config.billing.webhook_secret) {
        return Err(ApiError::Unauthorized("Invalid webhook secret".to_string()));
    }

    let canceled = event.status == "canceled";

    // Canceled subscriptions drop back to trial; otherwise the event's plan
    // must be one we sell
    let plan = if canceled {
        OrganizationPlan::Trial
    } else {
        OrganizationPlan::parse(&event.plan)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown plan: {}", event.plan)))?
    };

    let mut tx = state.db.begin().await?;

    let organization = Organization::update_plan(&mut *tx, event.organization_id, plan)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    Subscription::upsert(
        &mut *tx,
        UpsertSubscription {
            organization_id: event.organization_id,
            external_id: event.subscription_id.clone(),
            plan: event.plan.clone(),
            status: event.status.clone(),
            current_period_end: event.current_period_end,
        },
    )
    .await?;

    if let Some(customer_id) = &event.customer_id {
        Organization::set_billing_customer(&mut *tx, event.organization_id, customer_id).await?;
    }

    // System actor: webhook deliveries have no user session
    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: event.organization_id,
            actor_user_id: Uuid::nil(),
            action: "billing.subscription_updated".to_string(),
            resource_type: "subscription".to_string(),
            resource_id: Some(event.subscription_id),
            metadata: serde_json::json!({
                "event_type": event.event_type,
                "plan": organization.plan,
                "status": event.status,
            }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(WebhookResponse { received: true }))
}

/// Compares two secrets without leaking length or prefix timing
///
/// Hashing both sides first makes the byte comparison run over fixed-size
/// digests that an attacker cannot choose.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("whsec_abc123", "whsec_abc123"));
    }

    #[test]
    fn test_secrets_differ() {
        assert!(!secrets_match("whsec_abc123", "whsec_abc124"));
        assert!(!secrets_match("", "whsec_abc123"));
        assert!(!secrets_match("whsec_abc", "whsec_abc123"));
    }

    #[test]
    fn test_event_deserializes() {
        let event: BillingEvent = serde_json::from_str(
            r#"{
                "type": "subscription.updated",
                "organization_id": "7f8a1c2e-0000-4000-8000-000000000000",
                "subscription_id": "sub_123",
                "plan": "growth",
                "status": "active",
                "customer_id": "cus_456",
                "current_period_end": "2026-09-30T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(event.event_type, "subscription.updated");
        assert_eq!(event.plan, "growth");
        assert_eq!(event.customer_id.as_deref(), Some("cus_456"));
    }
}
