/// Error handling for the API server
///
/// A unified error type that maps to HTTP responses. Handlers return
/// `Result<T, ApiError>` and the conversion to status codes happens in one
/// place.
///
/// # Status Mapping
///
/// Gate outcomes map deliberately:
/// - Non-membership is `404 Not Found`, never `403`, so callers can't probe
///   which organizations exist
/// - Permission denials and plan-limit denials are `403 Forbidden` with
///   distinct error codes (`forbidden` vs `plan_limit_exceeded`)
/// - Store failures during authorization are `500` and deny the request

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use facture_shared::auth::jwt::JwtError;
use facture_shared::auth::password::PasswordError;
use facture_shared::authz::AuthzError;
use facture_shared::gate::GateError;
use facture_shared::models::invitation::InvitationError;
use facture_shared::plan::PlanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Plan limit reached or trial expired (403, distinct error code)
    PlanLimitExceeded(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or invoice number
    Conflict(String),

    /// Invitation no longer usable (410)
    Gone(String),

    /// Unprocessable entity (422), validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "forbidden", "plan_limit_exceeded")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::PlanLimitExceeded(msg) => write!(f, "Plan limit exceeded: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Gone(msg) => write!(f, "Gone: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Handle rate limit separately to add Retry-After header
        if let ApiError::RateLimitExceeded {
            retry_after,
            message,
        } = &self
        {
            let body = Json(ErrorResponse {
                error: "rate_limit_exceeded".to_string(),
                message: message.clone(),
                details: None,
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            return response;
        }

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::PlanLimitExceeded(msg) => {
                (StatusCode::FORBIDDEN, "plan_limit_exceeded", msg, None)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Gone(msg) => (StatusCode::GONE, "gone", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                message,
                None,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return ApiError::Conflict("Email already exists".to_string());
                    }
                    if constraint.contains("number") {
                        return ApiError::Conflict("Invoice number already exists".to_string());
                    }
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert gate decisions to API errors
impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            // Non-membership surfaces as not-found
            GateError::NotMember(_) => ApiError::NotFound("Organization not found".to_string()),
            // The denied key stays server-side; the body never names which
            // permission was required
            GateError::PermissionDenied(key) => {
                tracing::debug!(permission = %key, "Permission denied");
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            GateError::PlanDenied(plan_err) => plan_err.into(),
            GateError::Store(e) => {
                ApiError::InternalError(format!("Authorization check failed: {}", e))
            }
        }
    }
}

/// Convert plan-limit errors to API errors
impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::LimitExceeded { .. } | PlanError::TrialExpired => {
                ApiError::PlanLimitExceeded(err.to_string())
            }
            PlanError::OrganizationNotFound(_) => {
                ApiError::NotFound("Organization not found".to_string())
            }
            PlanError::DatabaseError(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => ApiError::NotFound("Organization not found".to_string()),
            AuthzError::RoleNotFound(_) => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::PermissionDenied(key) => {
                tracing::debug!(permission = %key, "Permission denied");
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::DatabaseError(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

/// Convert invitation lifecycle errors to API errors
impl From<InvitationError> for ApiError {
    fn from(err: InvitationError) -> Self {
        match err {
            InvitationError::NotFound => ApiError::NotFound("Invitation not found".to_string()),
            InvitationError::Expired => ApiError::Gone("Invitation has expired".to_string()),
            InvitationError::Revoked => ApiError::Gone("Invitation has been revoked".to_string()),
            InvitationError::AlreadyAccepted => {
                ApiError::Gone("Invitation has already been accepted".to_string())
            }
            InvitationError::AlreadyMember => {
                ApiError::Conflict("Already a member of this organization".to_string())
            }
            InvitationError::Database(e) => ApiError::InternalError(format!("Database error: {}", e)),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => {
                ApiError::Unauthorized("Invalid token issuer".to_string())
            }
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

/// Convert request validation failures to 422 responses
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_gate_not_member_maps_to_not_found() {
        let err: ApiError = GateError::NotMember(Uuid::new_v4()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_gate_permission_denied_maps_to_forbidden() {
        let err: ApiError = GateError::PermissionDenied("invoice:create".to_string()).into();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn test_permission_denial_body_never_names_the_key() {
        // The 403 message is a fixed string; a denied caller must not learn
        // which permission key the endpoint required
        let from_gate: ApiError = GateError::PermissionDenied("member:delete".to_string()).into();
        match from_gate {
            ApiError::Forbidden(msg) => {
                assert_eq!(msg, "Insufficient permissions");
                assert!(!msg.contains("member:delete"));
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }

        let from_authz: ApiError =
            AuthzError::PermissionDenied("billing:manage".to_string()).into();
        match from_authz {
            ApiError::Forbidden(msg) => {
                assert_eq!(msg, "Insufficient permissions");
                assert!(!msg.contains("billing:manage"));
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_denied_maps_to_plan_limit_exceeded() {
        let err: ApiError = GateError::PlanDenied(PlanError::TrialExpired).into();
        assert!(matches!(err, ApiError::PlanLimitExceeded(_)));
    }

    #[test]
    fn test_invitation_terminal_states_map_to_gone() {
        for inv_err in [
            InvitationError::Expired,
            InvitationError::Revoked,
            InvitationError::AlreadyAccepted,
        ] {
            let err: ApiError = inv_err.into();
            assert!(matches!(err, ApiError::Gone(_)));
        }
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![ValidationErrorDetail {
            field: "email".to_string(),
            message: "Invalid email format".to_string(),
        }];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 1 errors");
    }
}
