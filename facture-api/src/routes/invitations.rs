/// Invitation endpoints
///
/// # Endpoints
///
/// - `POST /v1/invitations` - Invite a user into the organization
/// - `GET /v1/invitations` - List invitations
/// - `DELETE /v1/invitations/:id` - Revoke a pending invitation
/// - `POST /v1/invitations/accept` - Accept an invitation by token
///
/// # Token Handling
///
/// The plaintext invitation token appears exactly once, in the creation
/// response. Only its hash is stored, so a leaked database dump cannot be
/// replayed into memberships.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Extension, Path, State},
    Json,
};
use facture_shared::{
    auth::token,
    authz::keys,
    gate::GateRequest,
    models::{
        audit::{AuditEntry, NewAuditEntry},
        invitation::{CreateInvitation, Invitation},
        role::Role,
    },
    plan::PlanAction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Invitation creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    /// Invitee email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Role the membership will hold on acceptance
    pub role_id: Uuid,
}

/// Invitation creation response
///
/// `token` is the plaintext invitation token, shown only here.
#[derive(Debug, Serialize)]
pub struct CreateInvitationResponse {
    pub invitation: Invitation,
    pub token: String,
}

/// Invitation listing response
#[derive(Debug, Serialize)]
pub struct InvitationsResponse {
    pub invitations: Vec<Invitation>,
}

/// Invitation acceptance request
#[derive(Debug, Deserialize)]
pub struct AcceptInvitationRequest {
    /// Plaintext invitation token
    pub token: String,
}

/// Invitation acceptance response
#[derive(Debug, Serialize)]
pub struct AcceptInvitationResponse {
    pub organization_id: Uuid,
    pub role_id: Uuid,
}

/// Invite a user into the organization
///
/// Requires `member:invite` and a free member seat on the plan. The seat
/// is checked at invitation time so the limit surfaces to the inviter, not
/// to the invitee at acceptance.
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<Json<CreateInvitationResponse>> {
    req.validate()?;

    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_INVITE,
            plan_action: Some(PlanAction::AddMember),
        })
        .await?;

    Role::find_by_id(&state.db, req.role_id)
        .await?
        .filter(|r| r.organization_id == Some(auth.org_id))
        .ok_or_else(|| ApiError::BadRequest("Unknown role".to_string()))?;

    let mut tx = state.db.begin().await?;

    let (invitation, plaintext) = Invitation::create(
        &mut *tx,
        CreateInvitation {
            organization_id: auth.org_id,
            email: req.email.clone(),
            role_id: req.role_id,
            invited_by: auth.user_id,
        },
    )
    .await?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "invitation.created".to_string(),
            resource_type: "invitation".to_string(),
            resource_id: Some(invitation.id.to_string()),
            metadata: serde_json::json!({
                "email": req.email,
                "role_id": req.role_id,
            }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(CreateInvitationResponse {
        invitation,
        token: plaintext,
    }))
}

/// List the organization's invitations
///
/// Requires `member:read`. Pending invitations past their expiry are
/// flipped to `expired` before the listing is returned.
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<InvitationsResponse>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_READ,
            plan_action: None,
        })
        .await?;

    let invitations = Invitation::list_by_organization(&state.db, auth.org_id).await?;

    Ok(Json(InvitationsResponse { invitations }))
}

/// Revoke a pending invitation
///
/// Requires `member:invite`. Only pending invitations can be revoked;
/// accepted, expired, and already-revoked invitations return 404.
pub async fn revoke_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invitation>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::MEMBER_INVITE,
            plan_action: None,
        })
        .await?;

    let mut tx = state.db.begin().await?;

    let invitation = Invitation::revoke(&mut *tx, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pending invitation not found".to_string()))?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "invitation.revoked".to_string(),
            resource_type: "invitation".to_string(),
            resource_id: Some(invitation.id.to_string()),
            metadata: serde_json::json!({ "email": invitation.email }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(invitation))
}

/// Accept an invitation by token
///
/// Requires only an authenticated session; the caller is by definition not
/// yet a member of the target organization, so no gate check applies. The
/// acceptance is atomic: the membership, the status flip, and the audit
/// entry commit together or not at all.
pub async fn accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<AcceptInvitationResponse>> {
    // Reject malformed tokens before touching the database
    if !token::validate_token_format(&req.token) {
        return Err(ApiError::NotFound("Invitation not found".to_string()));
    }

    let accepted = Invitation::accept(&state.db, &req.token, auth.user_id).await?;

    Ok(Json(AcceptInvitationResponse {
        organization_id: accepted.membership.organization_id,
        role_id: accepted.membership.role_id,
    }))
}
