/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a user and their organization
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, Json};
use facture_shared::{
    auth::{jwt, password},
    models::{
        audit::{AuditEntry, NewAuditEntry},
        membership::{CreateMembership, Membership},
        organization::{CreateOrganization, Organization, OrganizationPlan},
        role::Role,
        user::{CreateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Canonical form of an email address: trimmed and lowercased
///
/// Both registration and login pass through this, so lookups always see
/// the same form that was stored.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Picks the organization a fresh login is scoped to
///
/// A user whose memberships were all removed can still authenticate but
/// has nothing to act on; that is an access decision, not a server fault.
fn primary_organization(memberships: &[Membership]) -> Result<Uuid, ApiError> {
    memberships
        .first()
        .map(|m| m.organization_id)
        .ok_or_else(|| ApiError::Forbidden("No organization membership".to_string()))
}

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Optional display name
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Optional organization name
    #[validate(length(max = 100, message = "Organization name must be at most 100 characters"))]
    pub organization_name: Option<String>,
}

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// User ID
    pub user_id: String,

    /// Organization ID
    pub organization_id: String,

    /// Access token (1h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// User ID
    pub user_id: String,

    /// Default organization ID
    pub organization_id: String,

    /// Access token (1h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (1h)
    pub access_token: String,
}

/// Register a new user
///
/// Creates the user, their organization on the trial plan, the four default
/// roles, and an owner membership, all in one transaction. Either the whole
/// account exists afterwards or none of it does.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "user@example.com",
///   "password": "SecureP@ss123",
///   "name": "Ada Quinn",
///   "organization_name": "Quinn Consulting"
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already exists
/// - `500 Internal Server Error`: Server error
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let organization_name = req
        .organization_name
        .unwrap_or_else(|| format!("{}'s Workspace", req.name.as_deref().unwrap_or("User")));

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: normalize_email(&req.email),
            password_hash,
            name: req.name.clone(),
        },
    )
    .await?;

    let organization = Organization::create(
        &mut *tx,
        CreateOrganization {
            name: organization_name,
            plan: OrganizationPlan::Trial,
        },
    )
    .await?;

    let roles = Role::create_defaults(&mut tx, organization.id).await?;

    Membership::create(
        &mut *tx,
        CreateMembership {
            organization_id: organization.id,
            user_id: user.id,
            role_id: roles.owner.id,
        },
    )
    .await?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: organization.id,
            actor_user_id: user.id,
            action: "organization.created".to_string(),
            resource_type: "organization".to_string(),
            resource_id: Some(organization.id.to_string()),
            metadata: serde_json::json!({ "plan": organization.plan }),
        },
    )
    .await?;

    tx.commit().await?;

    let access_claims = jwt::Claims::new(user.id, organization.id, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, organization.id, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    Ok(Json(RegisterResponse {
        user_id: user.id.to_string(),
        organization_id: organization.id.to_string(),
        access_token,
        refresh_token,
    }))
}

/// Login endpoint
///
/// Authenticates a user and returns JWT tokens scoped to their first
/// organization. The organization in the token is a hint; every gated
/// request re-resolves membership from the database.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials
/// - `403 Forbidden`: No organization membership remains
/// - `422 Unprocessable Entity`: Validation failed
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    let valid = password::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let memberships = Membership::list_by_user(&state.db, user.id).await?;
    let organization_id = primary_organization(&memberships)?;

    User::update_last_login(&state.db, user.id).await?;

    let access_claims = jwt::Claims::new(user.id, organization_id, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(user.id, organization_id, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    Ok(Json(LoginResponse {
        user_id: user.id.to_string(),
        organization_id: organization_id.to_string(),
        access_token,
        refresh_token,
    }))
}

/// Token refresh endpoint
///
/// Exchanges a refresh token for a new access token.
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("User@Example.COM"), "user@example.com");
        assert_eq!(normalize_email("  ada@example.com "), "ada@example.com");
        assert_eq!(normalize_email("plain@example.com"), "plain@example.com");
    }

    #[test]
    fn test_primary_organization_picks_first_membership() {
        let org_id = Uuid::new_v4();
        let memberships = vec![
            Membership {
                organization_id: org_id,
                user_id: Uuid::new_v4(),
                role_id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
            Membership {
                organization_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                role_id: Uuid::new_v4(),
                created_at: Utc::now(),
            },
        ];

        let picked = primary_organization(&memberships).expect("should resolve");
        assert_eq!(picked, org_id);
    }

    #[test]
    fn test_primary_organization_without_memberships_is_forbidden() {
        // A user removed from every organization gets an access denial,
        // not a server error
        let err = primary_organization(&[]).expect_err("should deny");
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
