use axum::{body::Bytes, extract::State, Json};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    models::{lenient, OrderStatus},
    services::orders::sanitize_transaction_id,
    AppState,
};

/// Fields read from either gateway's callback. Anything else is ignored.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WebhookPayload {
    #[serde(default, rename = "transactionId", deserialize_with = "lenient::string")]
    pub transaction_id: Option<String>,
    #[serde(default, rename = "transaction_id", deserialize_with = "lenient::string")]
    pub transaction_id_snake: Option<String>,
    #[serde(default, rename = "idTransaction", deserialize_with = "lenient::string")]
    pub id_transaction: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    /// Amount in reais
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
}

impl WebhookPayload {
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id
            .as_deref()
            .or(self.transaction_id_snake.as_deref())
            .or(self.id_transaction.as_deref())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
    pub status: OrderStatus,
}

async fn process_webhook(
    state: &AppState,
    gateway: &'static str,
    body: &[u8],
) -> Result<Json<WebhookResponse>, ServiceError> {
    let payload: WebhookPayload = serde_json::from_slice(body).map_err(|e| {
        warn!(gateway, error = %e, "Unreadable webhook body");
        ServiceError::BadRequest(format!("Invalid webhook payload: {}", e))
    })?;

    let transaction_id = payload
        .transaction_id()
        .and_then(sanitize_transaction_id)
        .ok_or_else(|| {
            warn!(gateway, "Webhook without transaction id");
            ServiceError::BadRequest("Transaction id is required".to_string())
        })?;

    let update = state
        .services
        .orders
        .apply_gateway_status(&transaction_id, payload.status.as_deref(), payload.amount)
        .await?;

    counter!(
        "pix_checkout.webhooks",
        1,
        "gateway" => gateway,
        "status" => update.order.status.to_string()
    );
    info!(
        gateway,
        transaction_id = %transaction_id,
        status = %update.order.status,
        became_paid = update.became_paid,
        "Webhook processed"
    );

    Ok(Json(WebhookResponse {
        success: true,
        message: "Webhook processed".to_string(),
        transaction_id,
        status: update.order.status,
    }))
}

/// LXPAY status callback
#[utoipa::path(
    post,
    path = "/api/webhooks/lxpay",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Status recorded", body = WebhookResponse),
        (status = 400, description = "Unreadable body or missing transaction id", body = crate::errors::ErrorResponse),
    ),
    tag = "Webhooks"
)]
pub async fn lxpay_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServiceError> {
    process_webhook(&state, "lxpay", &body).await
}

/// Abyssal Pay postback
#[utoipa::path(
    post,
    path = "/api/webhooks/abyssalpay",
    request_body = WebhookPayload,
    responses(
        (status = 200, description = "Status recorded", body = WebhookResponse),
        (status = 400, description = "Unreadable body or missing transaction id", body = crate::errors::ErrorResponse),
    ),
    tag = "Webhooks"
)]
pub async fn abyssalpay_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ServiceError> {
    process_webhook(&state, "abyssalpay", &body).await
}
