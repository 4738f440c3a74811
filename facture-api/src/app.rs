/// Application state and router builder
///
/// Defines the shared application state and builds the Axum router with all
/// routes and middleware.
///
/// # Example
///
/// ```no_run
/// use facture_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let redis = redis::Client::open(config.redis.url.clone())?;
/// let redis = redis::aio::ConnectionManager::new(redis).await?;
/// let state = AppState::new(pool, redis, config);
/// let app = facture_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, patch, post},
    Router,
};
use facture_shared::auth::jwt;
use facture_shared::gate::Gate;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. Uses Arc
/// internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Redis connection (rate-limit state)
    pub redis: ConnectionManager,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, redis: ConnectionManager, config: Config) -> Self {
        Self {
            db,
            redis,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Builds a request gate over this state's pool
    pub fn gate(&self) -> Gate {
        Gate::new(self.db.clone())
    }
}

/// Authentication context added to request extensions
///
/// Carries the identity established by the session token. The organization
/// here is a claim from the token only; membership is re-resolved from the
/// database by the gate on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Active organization from the token
    pub org_id: Uuid,
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /v1/
///     ├── /auth/                     # Public
///     │   ├── POST /register
///     │   ├── POST /login
///     │   └── POST /refresh
///     ├── /billing/webhook           # Public, secret-verified
///     ├── /invitations/accept        # Authenticated, no membership required
///     ├── /organization              # Authenticated + gated
///     │   ├── GET    /
///     │   ├── PATCH  /
///     │   ├── GET    /audit-log
///     │   ├── GET    /members
///     │   ├── PATCH  /members/:user_id
///     │   └── DELETE /members/:user_id
///     ├── /invitations               # Authenticated + gated
///     │   ├── POST   /
///     │   ├── GET    /
///     │   └── DELETE /:id
///     ├── /clients                   # Authenticated + gated
///     └── /invoices                  # Authenticated + gated
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first): security headers, CORS, tracing,
/// compression; then JWT auth and rate limiting on the protected subtrees.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Public: no auth
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let billing_routes = Router::new().route("/webhook", post(routes::billing::webhook));

    // Authenticated but not organization-gated: the accepting user is not a
    // member yet
    let accept_routes = Router::new()
        .route("/accept", post(routes::invitations::accept))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Organization-scoped routes: JWT auth + per-organization rate limiting;
    // each handler runs the gate before touching data
    let organization_routes = Router::new()
        .route("/", get(routes::organizations::get_organization))
        .route("/", patch(routes::organizations::update_organization))
        .route("/audit-log", get(routes::organizations::get_audit_log))
        .route("/members", get(routes::members::list_members))
        .route("/members/:user_id", patch(routes::members::update_member))
        .route("/members/:user_id", delete(routes::members::remove_member));

    let invitation_routes = Router::new()
        .route("/", post(routes::invitations::create_invitation))
        .route("/", get(routes::invitations::list_invitations))
        .route("/:id", delete(routes::invitations::revoke_invitation));

    let client_routes = Router::new()
        .route("/", post(routes::clients::create_client))
        .route("/", get(routes::clients::list_clients))
        .route("/:id", get(routes::clients::get_client))
        .route("/:id", patch(routes::clients::update_client))
        .route("/:id", delete(routes::clients::delete_client));

    let invoice_routes = Router::new()
        .route("/", post(routes::invoices::create_invoice))
        .route("/", get(routes::invoices::list_invoices))
        .route("/:id", get(routes::invoices::get_invoice))
        .route("/:id/status", patch(routes::invoices::update_invoice_status));

    let gated = Router::new()
        .nest("/organization", organization_routes)
        .nest("/invitations", invitation_routes)
        .nest("/clients", client_routes)
        .nest("/invoices", invoice_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/billing", billing_routes)
        .nest("/invitations", accept_routes)
        .merge(gated);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Extracts and validates the Bearer token from the Authorization header,
/// then injects [`AuthContext`] into request extensions. Session resolution
/// only: no membership or permission decisions happen here.
pub async fn jwt_auth_layer(
    state: axum::extract::State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, crate::error::ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            crate::error::ApiError::Unauthorized("Missing authorization header".to_string())
        })?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| crate::error::ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    let auth_context = AuthContext {
        user_id: claims.sub,
        org_id: claims.org_id,
    };

    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
