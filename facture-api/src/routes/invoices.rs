/// Invoice endpoints
///
/// # Endpoints
///
/// - `POST /v1/invoices` - Create a draft invoice (plan-limited per month)
/// - `GET /v1/invoices` - List invoices
/// - `GET /v1/invoices/:id` - Get an invoice
/// - `PATCH /v1/invoices/:id/status` - Move an invoice through its lifecycle
///
/// # Plan Limits
///
/// Invoice creation counts against a calendar-month window: the count
/// resets at the first instant of each UTC month regardless of when the
/// previous month's invoices were created.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use facture_shared::{
    authz::keys,
    gate::GateRequest,
    models::{
        audit::{AuditEntry, NewAuditEntry},
        client::Client,
        invoice::{CreateInvoice, Invoice, InvoiceStatus},
    },
    plan::PlanAction,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Invoice creation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    /// Client the invoice bills
    pub client_id: Uuid,

    /// Invoice number, unique within the organization
    #[validate(length(min = 1, max = 50, message = "Number must be 1-50 characters"))]
    pub number: String,

    /// Amount in minor currency units
    #[validate(range(min = 0, message = "Amount must not be negative"))]
    pub amount_cents: i64,

    /// ISO 4217 currency code
    #[validate(length(equal = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,

    /// Optional due date
    pub due_date: Option<NaiveDate>,
}

/// Invoice status update request
#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    /// Target status: `draft`, `sent`, `paid`, or `void`
    pub status: String,
}

/// Invoice listing query parameters
#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    /// Page size (clamped to 1..=100)
    #[serde(default = "default_limit")]
    pub limit: i64,

    /// Offset into older invoices
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Invoice listing response
#[derive(Debug, Serialize)]
pub struct InvoicesResponse {
    pub invoices: Vec<Invoice>,
    pub limit: i64,
    pub offset: i64,
}

/// Create a draft invoice
///
/// Requires `invoice:create` and a free slot in the plan's monthly
/// invoice quota. The client must belong to the same organization.
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<Json<Invoice>> {
    req.validate()?;

    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::INVOICE_CREATE,
            plan_action: Some(PlanAction::CreateInvoice),
        })
        .await?;

    Client::find_by_id(&state.db, auth.org_id, req.client_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Unknown client".to_string()))?;

    let mut tx = state.db.begin().await?;

    let invoice = Invoice::create(
        &mut *tx,
        CreateInvoice {
            organization_id: auth.org_id,
            client_id: req.client_id,
            number: req.number,
            amount_cents: req.amount_cents,
            currency: req.currency.to_uppercase(),
            due_date: req.due_date,
        },
    )
    .await?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "invoice.created".to_string(),
            resource_type: "invoice".to_string(),
            resource_id: Some(invoice.id.to_string()),
            metadata: serde_json::json!({
                "number": invoice.number,
                "amount_cents": invoice.amount_cents,
                "currency": invoice.currency,
            }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(invoice))
}

/// List the organization's invoices, newest first
///
/// Requires `invoice:read`.
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult<Json<InvoicesResponse>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::INVOICE_READ,
            plan_action: None,
        })
        .await?;

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    let invoices = Invoice::list_by_organization(&state.db, auth.org_id, limit, offset).await?;

    Ok(Json(InvoicesResponse {
        invoices,
        limit,
        offset,
    }))
}

/// Get an invoice
///
/// Requires `invoice:read`.
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::INVOICE_READ,
            plan_action: None,
        })
        .await?;

    let invoice = Invoice::find_by_id(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

    Ok(Json(invoice))
}

/// Move an invoice through its lifecycle
///
/// Requires `invoice:update`. Status changes don't consume monthly quota;
/// only creation does.
pub async fn update_invoice_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInvoiceStatusRequest>,
) -> ApiResult<Json<Invoice>> {
    state
        .gate()
        .authorize(GateRequest {
            organization_id: auth.org_id,
            user_id: auth.user_id,
            permission: keys::INVOICE_UPDATE,
            plan_action: None,
        })
        .await?;

    let status = InvoiceStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown invoice status: {}", req.status)))?;

    let mut tx = state.db.begin().await?;

    let invoice = Invoice::update_status(&mut *tx, auth.org_id, id, status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

    AuditEntry::record(
        &mut tx,
        NewAuditEntry {
            organization_id: auth.org_id,
            actor_user_id: auth.user_id,
            action: "invoice.status_changed".to_string(),
            resource_type: "invoice".to_string(),
            resource_id: Some(invoice.id.to_string()),
            metadata: serde_json::json!({ "status": invoice.status }),
        },
    )
    .await?;

    tx.commit().await?;

    Ok(Json(invoice))
}
