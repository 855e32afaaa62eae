use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use super::common::{map_json_rejection, request_origin};
use crate::{
    errors::ServiceError,
    models::{lenient, OrderStatus},
    services::{
        checkout::{CheckoutOutcome, CheckoutRequest},
        orders::{sanitize_transaction_id, StatusLookup, StatusSource},
    },
    AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct PixCodePayload {
    pub code: Option<String>,
}

/// Charge details in the shape the storefront already understands.
/// Several keys repeat the same value under the names older pages read.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub success: bool,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub token: String,
    pub status: OrderStatus,
    #[serde(rename = "pixCode")]
    pub pix_code: Option<String>,
    pub qrcode: Option<String>,
    #[serde(rename = "qrCodeUrl")]
    pub qr_code_url: Option<String>,
    pub qr_code_image_url: Option<String>,
    pub pix: PixCodePayload,
    /// Amount in centavos
    pub valor: i64,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        let qr_code_url = outcome.charge.qr_code_url_or_rendered();
        let pix_code = outcome.charge.pix_code;
        Self {
            success: true,
            transaction_id: outcome.charge.transaction_id.clone(),
            token: outcome.charge.transaction_id,
            status: outcome.order.status,
            pix_code: pix_code.clone(),
            qrcode: pix_code.clone(),
            qr_code_url: qr_code_url.clone(),
            qr_code_image_url: qr_code_url,
            pix: PixCodePayload { code: pix_code },
            valor: outcome.order.amount_cents,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    /// Transaction id returned by the checkout
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct StatusRequest {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, rename = "transactionId", deserialize_with = "lenient::string")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub status: OrderStatus,
    pub transaction_id: String,
    pub source: StatusSource,
    /// Amount in centavos, when the order is known locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valor: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Raw status string reported by the gateway
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<StatusLookup> for StatusResponse {
    fn from(lookup: StatusLookup) -> Self {
        Self {
            success: true,
            status: lookup.status,
            transaction_id: lookup.transaction_id,
            source: lookup.source,
            valor: lookup.amount_cents,
            updated_at: lookup.updated_at,
            gateway_status: lookup.gateway_status,
            message: lookup.message,
        }
    }
}

/// Create a PIX charge
#[utoipa::path(
    post,
    path = "/api/checkout/pix",
    summary = "Create PIX checkout",
    description = "Validates a storefront cart, creates a PIX charge at the configured gateway and records a pending order",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Charge created", body = CheckoutResponse,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid cart or customer data", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway refused or failed", body = crate::errors::ErrorResponse),
    ),
    tag = "Checkout"
)]
#[instrument(skip_all)]
pub async fn create_pix_checkout(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<CheckoutResponse>, ServiceError> {
    let Json(request) = payload.map_err(map_json_rejection)?;
    let outcome = state
        .services
        .checkout
        .create_pix_checkout(request, request_origin(&headers))
        .await?;
    Ok(Json(outcome.into()))
}

async fn poll(state: &AppState, raw_id: Option<String>) -> Result<Json<StatusResponse>, ServiceError> {
    let raw_id = raw_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ServiceError::BadRequest("Transaction id is required".to_string()))?;
    let transaction_id = sanitize_transaction_id(&raw_id)
        .ok_or_else(|| ServiceError::InvalidInput("Transaction id is malformed".to_string()))?;

    let lookup = state.services.orders.poll_status(&transaction_id).await?;
    Ok(Json(lookup.into()))
}

/// Poll an order's payment status
#[utoipa::path(
    get,
    path = "/api/checkout/status",
    summary = "Get payment status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Current status; unknown transactions report pending", body = StatusResponse),
        (status = 400, description = "Missing or malformed id", body = crate::errors::ErrorResponse),
    ),
    tag = "Checkout"
)]
pub async fn get_payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusResponse>, ServiceError> {
    poll(&state, query.id).await
}

/// Same as the GET form, with the id in a JSON body
#[utoipa::path(
    post,
    path = "/api/checkout/status",
    summary = "Get payment status (POST)",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Current status; unknown transactions report pending", body = StatusResponse),
        (status = 400, description = "Missing or malformed id", body = crate::errors::ErrorResponse),
    ),
    tag = "Checkout"
)]
pub async fn post_payment_status(
    State(state): State<AppState>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ServiceError> {
    let Json(request) = payload.map_err(map_json_rejection)?;
    poll(&state, request.id.or(request.transaction_id)).await
}
