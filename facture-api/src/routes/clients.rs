/// Client (customer record) endpoints
///
/// # Endpoints
///
/// - `POST /v1/clients` - Create a client (plan-limited)
/// - `GET /v1/clients` - List clients
/// - `GET /v1/clients/:id` - Get a client
/// - `PATCH /v1/clients/:id` - Update a client
/// - `DELETE /v1/clients/:id` - Delete a client

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
        client::{Client, CreateClient, UpdateClient},
    },
    plan::PlanAction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Client creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    /// Client name
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    /// Optional billing email
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// Optional postal address
    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,
}

/// Client update request; omitted fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Address must be at most 500 characters"))]
    pub address: Option<String>,
}

/// Client listing response
#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<Client>,
}

/// Create a client
///
/// Requires `client:create` and a free client slot on the plan.
pub async fn create_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateClientRequest>,
) -> ApiResult<Json<Client>> {
    req.validate()?;

    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::CLIENT_CREATE,
            plan_action: Some(PlanAction::CreateClient),
        })
        .await?;

    let mut tx = state.db.begin().await?;

    let client = Client::create(
        &mut *tx,
        CreateClient {
            organization_id: auth.org_id,
            name: req.name,
            email: req.email,
            address: req.address,
        },
    )
    .await?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "client.created".to_string(),
            resource_type: "client".to_string(),
            resource_id: Some(client.id.to_string()),
            metadata: serde_json::json!({ "name": client.name }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(client))
}

/// List the organization's clients, newest first
///
/// Requires `client:read`.
pub async fn list_clients(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ClientsResponse>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::CLIENT_READ,
            plan_action: None,
        })
        .await?;

    let clients = Client::list_by_organization(&state.db, auth.org_id).await?;

    Ok(Json(ClientsResponse { clients }))
}

/// Get a client
///
/// Requires `client:read`.
pub async fn get_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Client>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::CLIENT_READ,
            plan_action: None,
        })
        .await?;

    let client = Client::find_by_id(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))?;

    Ok(Json(client))
}

/// Update a client
///
/// Requires `client:update`.
pub async fn update_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> ApiResult<Json<Client>> {
    req.validate()?;

    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::CLIENT_UPDATE,
            plan_action: None,
        })
        .await?;

    let mut tx = state.db.begin().await?;

    let client = Client::update(
        &mut *tx,
        auth.org_id,
        id,
        UpdateClient {
            name: req.name,
            email: req.email,
            address: req.address,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("Client not found".to_string()))?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "client.updated".to_string(),
            resource_type: "client".to_string(),
            resource_id: Some(client.id.to_string()),
            metadata: serde_json::json!({ "name": client.name }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(client))
}

/// Delete a client
///
/// Requires `client:delete`. Fails with 409 if invoices still reference
/// the client (foreign key restriction).
pub async fn delete_client(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::CLIENT_DELETE,
            plan_action: None,
        })
        .await?;

    let mut tx = state.db.begin().await?;

    let deleted = Client::delete(&mut *tx, auth.org_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Client not found".to_string()));
    }

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "client.deleted".to_string(),
            resource_type: "client".to_string(),
            resource_id: Some(id.to_string()),
            metadata: serde_json::json!({}),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}
