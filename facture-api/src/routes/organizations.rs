/// Organization endpoints
///
/// # Endpoints
///
/// - `GET /v1/organization` - Get the active organization
/// - `PATCH /v1/organization` - Rename the organization
/// - `GET /v1/organization/audit-log` - Page through the audit trail

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Extension, Query, State},
    Json,
};
use facture_shared::{
    authz::keys,
    gate::GateRequest,
    models::{
        audit::{AuditEntry, NewAuditEntry},
        organization::Organization,
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Organization update request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    /// New organization name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

/// Audit log query parameters
#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    /// Page size (clamped to 1..=100)
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Offset into older entries
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Audit log response page
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Get the active organization
///
/// Requires `org:read`.
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Organization>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::ORGANIZATION_READ,
            plan_action: None,
        })
        .await?;

    let organization = Organization::find_by_id(&state.db, auth.org_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    Ok(Json(organization))
}

/// Rename the organization
///
/// Requires `org:update`. The rename and its audit entry commit together.
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> ApiResult<Json<Organization>> {
    req.validate()?;

    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::ORGANIZATION_UPDATE,
            plan_action: None,
        })
        .await?;

    let mut tx = state.db.begin().await?;

    let organization = Organization::rename(&mut *tx, auth.org_id, &req.name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Organization not found".to_string()))?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "organization.updated".to_string(),
            resource_type: "organization".to_string(),
            resource_id: Some(auth.org_id.to_string()),
            metadata: serde_json::json!({ "name": organization.name }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(organization))
}

/// Page through the organization's audit trail, newest first
///
/// Requires `audit:read`.
pub async fn get_audit_log(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<AuditLogResponse>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::AUDIT_READ,
            plan_action: None,
        })
        .await?;

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let entries =
        AuditEntry::list_by_organization(&state.db, auth.org_id, limit, offset).await?;
    let total = AuditEntry::count_by_organization(&state.db, auth.org_id).await?;

    Ok(Json(AuditLogResponse {
        entries,
        total,
        limit,
        offset,
    }))
}
