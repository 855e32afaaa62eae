//! Outbound PIX gateway adapters.
//!
//! Each gateway turns a [`PixChargeRequest`] into its own JSON contract and
//! reads the charge back into a [`PixCharge`]. Gateways never touch the order
//! store; persisting and status mapping happen in the service layer.

pub mod abyssal_pay;
pub mod lxpay;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{AppConfig, GatewayKind};

pub use abyssal_pay::AbyssalPayGateway;
pub use lxpay::LxPayGateway;

/// Public renderer used when a gateway returns a PIX code without an image
const QR_RENDERER_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Longest gateway error body kept in an error message
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("gateway response did not include a transaction id")]
    MissingTransactionId,

    #[error("gateway is not configured: {0}")]
    NotConfigured(String),
}

/// Payer details, already cleaned: document and phone are digits only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixCustomer {
    pub name: String,
    pub email: String,
    pub document: String,
    pub phone: String,
}

/// A cart line as gateways expect it; `price` is the unit price in reais.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixProduct {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct PixChargeRequest {
    /// Charge amount in centavos
    pub amount_cents: i64,
    pub customer: PixCustomer,
    pub products: Vec<PixProduct>,
    /// Free-form object forwarded to gateways that accept one
    pub metadata: Value,
    /// Where the gateway should post status changes
    pub callback_url: String,
}

impl PixChargeRequest {
    /// Amount in reais with two decimal places, as gateways expect it
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.amount_cents, 2)
    }
}

/// A created charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixCharge {
    pub transaction_id: String,
    /// PIX "copia e cola" payload
    pub pix_code: Option<String>,
    pub qr_code_url: Option<String>,
}

impl PixCharge {
    /// The gateway's QR image, or one rendered from the PIX code
    pub fn qr_code_url_or_rendered(&self) -> Option<String> {
        self.qr_code_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.pix_code.as_deref().map(qr_code_image_url))
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Short stable name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Path (under the service's public origin) that receives this gateway's webhooks
    fn webhook_path(&self) -> &'static str;

    async fn create_pix_charge(&self, request: &PixChargeRequest)
        -> Result<PixCharge, GatewayError>;

    /// Raw gateway status for a transaction; `None` when the gateway has no lookup
    async fn fetch_status(&self, transaction_id: &str) -> Result<Option<String>, GatewayError>;
}

/// Builds the gateway selected by `payment_gateway`
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let gateway: Arc<dyn PaymentGateway> = match config.payment_gateway {
        GatewayKind::Lxpay => Arc::new(LxPayGateway::new(&config.lxpay)?),
        GatewayKind::Abyssalpay => Arc::new(AbyssalPayGateway::new(&config.abyssalpay)?),
    };
    Ok(gateway)
}

/// QR image URL for a PIX code via the public renderer
pub fn qr_code_image_url(pix_code: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("size", "300x300")
        .append_pair("data", pix_code)
        .finish();
    format!("{}?{}", QR_RENDERER_URL, query)
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, GatewayError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// First non-empty string (or number) found at any of the JSON pointers
pub(crate) fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| match value.pointer(pointer) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Reads a response body as JSON, tolerating empty or non-JSON bodies.
pub(crate) async fn read_body(response: reqwest::Response) -> Result<(u16, Value, String), GatewayError> {
    let status = response.status().as_u16();
    let text = response.text().await?;
    let json = serde_json::from_str(&text).unwrap_or(Value::Null);
    Ok((status, json, text))
}

/// Error message from a failed response: `message`, then `error`, then the raw body
pub(crate) fn rejection(status: u16, json: &Value, text: &str) -> GatewayError {
    let message = first_string(json, &["/message", "/error", "/error/message"]).unwrap_or_else(|| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            "empty response".to_string()
        } else {
            trimmed.chars().take(MAX_ERROR_BODY).collect()
        }
    });
    GatewayError::Rejected { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qr_url_encodes_pix_code() {
        let url = qr_code_image_url("000201 br.gov.bcb.pix&x=1");
        assert!(url.starts_with("https://api.qrserver.com/v1/create-qr-code/?size=300x300&data="));
        assert!(url.contains("br.gov.bcb.pix%26x%3D1"));
        assert!(!url.contains(' '));
    }

    #[test]
    fn charge_prefers_gateway_qr_url() {
        let charge = PixCharge {
            transaction_id: "tx".into(),
            pix_code: Some("000201".into()),
            qr_code_url: Some("https://gw.example/qr.png".into()),
        };
        assert_eq!(
            charge.qr_code_url_or_rendered().as_deref(),
            Some("https://gw.example/qr.png")
        );

        let without = PixCharge {
            qr_code_url: Some(String::new()),
            ..charge
        };
        assert_eq!(
            without.qr_code_url_or_rendered(),
            Some(qr_code_image_url("000201"))
        );
    }

    #[test]
    fn first_string_walks_pointers_in_order() {
        let body = json!({"id": 42, "order": {"id": "ord-1"}, "transactionId": ""});
        assert_eq!(
            first_string(&body, &["/transactionId", "/order/id", "/id"]).as_deref(),
            Some("ord-1")
        );
        assert_eq!(first_string(&body, &["/id"]).as_deref(), Some("42"));
        assert_eq!(first_string(&body, &["/missing"]), None);
    }

    #[test]
    fn rejection_prefers_message_fields() {
        let err = rejection(422, &json!({"message": "document invalid"}), "");
        assert!(matches!(err, GatewayError::Rejected { status: 422, ref message } if message == "document invalid"));

        let err = rejection(500, &Value::Null, "  ");
        assert!(matches!(err, GatewayError::Rejected { ref message, .. } if message == "empty response"));
    }

    #[test]
    fn amount_is_reais_with_two_places() {
        let request = PixChargeRequest {
            amount_cents: 2590,
            customer: PixCustomer {
                name: "Ana".into(),
                email: "ana@example.com".into(),
                document: "11144477735".into(),
                phone: "11999999999".into(),
            },
            products: vec![],
            metadata: Value::Null,
            callback_url: "https://loja.example.com/api/webhooks/lxpay".into(),
        };
        assert_eq!(request.amount().to_string(), "25.90");
    }
}
