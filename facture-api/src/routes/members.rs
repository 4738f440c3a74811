/// Member management endpoints
///
/// # Endpoints
///
/// - `GET /v1/organization/members` - List members
/// - `PATCH /v1/organization/members/:user_id` - Change a member's role
/// - `DELETE /v1/organization/members/:user_id` - Remove a member
///
/// # Last Owner Protection
///
/// An organization must always have at least one owner. Demoting or
/// removing the sole owner is rejected with 409 so an organization can
/// never lock itself out.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use facture_shared::{
    authz::keys,
    gate::GateRequest,
    models::{
        audit::{AuditEntry, NewAuditEntry},
        membership::{MemberRow, Membership},
        role::Role,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Member role update request
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    /// New role to assign
    pub role_id: Uuid,
}

/// Member listing response
#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberRow>,
}

/// List the organization's members with their roles
///
/// Requires `member:read`.
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MembersResponse>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_READ,
            plan_action: None,
        })
        .await?;

    let members = Membership::list_members(&state.db, auth.org_id).await?;

    Ok(Json(MembersResponse { members }))
}

/// Change a member's role
///
/// Requires `member:update`. The new role must exist in the same
/// organization; demoting the last owner is rejected.
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<Membership>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_UPDATE,
            plan_action: None,
        })
        .await?;

    let new_role = Role::find_by_id(&state.db, req.role_id)
        .await?
        .filter(|r| r.organization_id == Some(auth.org_id))
        .ok_or_else(|| ApiError::BadRequest("Unknown role".to_string()))?;

    let current = Membership::find(&state.db, auth.org_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    if current.role_id != new_role.id {
        ensure_not_last_owner(&state, auth.org_id, current.role_id).await?;
    }

    let mut tx = state.db.begin().await?;

    let membership = Membership::update_role(&mut *tx, auth.org_id, user_id, new_role.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "member.role_changed".to_string(),
            resource_type: "membership".to_string(),
            resource_id: Some(user_id.to_string()),
            metadata: serde_json::json!({
                "role_id": new_role.id,
                "role_name": new_role.name,
            }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(membership))
}

/// Remove a member from the organization
///
/// Requires `member:delete`. Removing the last owner is rejected.
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_DELETE,
            plan_action: None,
        })
        .await?;

    let current = Membership::find(&state.db, auth.org_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Member not found".to_string()))?;

    ensure_not_last_owner(&state, auth.org_id, current.role_id).await?;

    let mut tx = state.db.begin().await?;

    let deleted = Membership::delete(&mut *tx, auth.org_id, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Member not found".to_string()));
    }

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "member.removed".to_string(),
            resource_type: "membership".to_string(),
            resource_id: Some(user_id.to_string()),
            metadata: serde_json::json!({}),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "removed": true })))
}

/// Rejects the operation if it would leave the organization without an owner
///
/// Only matters when the affected member currently holds the owner role and
/// is the only one who does.
async fn ensure_not_last_owner(
    state: &AppState,
    organization_id: Uuid,
    current_role_id: Uuid,
) -> ApiResult<()> {
    let owner_role = Role::find_by_name(&state.db, organization_id, "owner")
        .await?
        .ok_or_else(|| ApiError::InternalError("Owner role missing".to_string()))?;

    if current_role_id != owner_role.id {
        return Ok(());
    }

    let owners = Membership::count_with_role(&state.db, organization_id, owner_role.id).await?;
    if owners <= 1 {
        return Err(ApiError::Conflict(
            "Cannot remove or demote the last owner".to_string(),
        ));
    }

    Ok(())
}
