use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{
    first_string, http_client, read_body, rejection, GatewayError, PaymentGateway, PixCharge,
    PixChargeRequest, PixProduct,
};
use crate::config::LxPayConfig;

const RECEIVE_PATH: &str = "/api/v1/gateway/pix/receive";
const TRANSACTIONS_PATH: &str = "/api/v1/transactions/";
const IDENTIFIER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const IDENTIFIER_MIN_LEN: usize = 26;
const IDENTIFIER_MAX_LEN: usize = 35;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveRequest<'a> {
    identifier: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    client: Client<'a>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    products: &'a [PixProduct],
    #[serde(skip_serializing_if = "Value::is_null")]
    metadata: &'a Value,
    #[serde(skip_serializing_if = "str::is_empty")]
    callback_url: &'a str,
}

#[derive(Serialize)]
struct Client<'a> {
    name: &'a str,
    email: &'a str,
    document: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    phone: &'a str,
}

pub struct LxPayGateway {
    client: reqwest::Client,
    base_url: String,
    public_key: String,
    secret_key: String,
}

impl LxPayGateway {
    pub fn new(config: &LxPayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            public_key: config.public_key.clone().unwrap_or_default(),
            secret_key: config.secret_key.clone().unwrap_or_default(),
        })
    }

    fn ensure_credentials(&self) -> Result<(), GatewayError> {
        if self.public_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return Err(GatewayError::NotConfigured(
                "LXPAY public/secret key missing".to_string(),
            ));
        }
        Ok(())
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-public-key", &self.public_key)
            .header("x-secret-key", &self.secret_key)
    }
}

/// Unique charge identifier: millisecond timestamp followed by random
/// `[A-Z0-9]`, always 26 to 35 characters.
pub fn generate_identifier() -> String {
    let mut rng = rand::thread_rng();
    let timestamp = chrono::Utc::now().timestamp_millis().to_string();
    let random: String = (0..13)
        .map(|_| char::from(IDENTIFIER_CHARSET[rng.gen_range(0..IDENTIFIER_CHARSET.len())]))
        .collect();

    let mut identifier = format!("{}{}", timestamp, random);
    if identifier.len() < IDENTIFIER_MIN_LEN {
        identifier.extend(std::iter::repeat('0').take(IDENTIFIER_MIN_LEN - identifier.len()));
    }
    identifier.truncate(IDENTIFIER_MAX_LEN);
    identifier
}

/// Reads the charge out of a receive response, whose shape varies between API versions.
fn parse_charge(body: &Value) -> Result<PixCharge, GatewayError> {
    let transaction_id = first_string(
        body,
        &["/transactionId", "/transaction_id", "/id", "/order/id"],
    )
    .ok_or(GatewayError::MissingTransactionId)?;

    let pix_code = match body.get("pix") {
        Some(Value::String(code)) if !code.trim().is_empty() => Some(code.trim().to_string()),
        _ => None,
    }
    .or_else(|| first_string(body, &["/pix/code", "/pix/qrcode", "/pix/qrCode"]))
    .or_else(|| first_string(body, &["/pixCode", "/qrcode", "/code"]));

    let qr_code_url = first_string(
        body,
        &["/pix/qrCodeUrl", "/pix/qr_code_image_url", "/pix/imageUrl"],
    );

    Ok(PixCharge {
        transaction_id,
        pix_code,
        qr_code_url,
    })
}

#[async_trait]
impl PaymentGateway for LxPayGateway {
    fn name(&self) -> &'static str {
        "lxpay"
    }

    fn webhook_path(&self) -> &'static str {
        "/api/webhooks/lxpay"
    }

    #[instrument(skip(self, request), fields(amount_cents = request.amount_cents))]
    async fn create_pix_charge(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PixCharge, GatewayError> {
        self.ensure_credentials()?;

        let identifier = generate_identifier();
        let payload = ReceiveRequest {
            identifier: identifier.clone(),
            amount: request.amount(),
            client: Client {
                name: &request.customer.name,
                email: &request.customer.email,
                document: &request.customer.document,
                phone: &request.customer.phone,
            },
            products: &request.products,
            metadata: &request.metadata,
            callback_url: &request.callback_url,
        };

        debug!(identifier = %identifier, "Requesting LXPAY PIX charge");
        let response = self
            .authorized(self.client.post(format!("{}{}", self.base_url, RECEIVE_PATH)))
            .json(&payload)
            .send()
            .await?;

        let (status, body, text) = read_body(response).await?;
        if !(200..300).contains(&status) {
            warn!(status, "LXPAY rejected PIX charge");
            return Err(rejection(status, &body, &text));
        }
        if body.is_null() {
            return Err(GatewayError::InvalidResponse(
                "LXPAY returned a non-JSON body".to_string(),
            ));
        }

        parse_charge(&body)
    }

    #[instrument(skip(self))]
    async fn fetch_status(&self, transaction_id: &str) -> Result<Option<String>, GatewayError> {
        self.ensure_credentials()?;

        let encoded: String = url::form_urlencoded::byte_serialize(transaction_id.as_bytes()).collect();
        let response = self
            .authorized(
                self.client
                    .get(format!("{}{}{}", self.base_url, TRANSACTIONS_PATH, encoded)),
            )
            .send()
            .await?;

        let (status, body, text) = read_body(response).await?;
        if !(200..300).contains(&status) {
            return Err(rejection(status, &body, &text));
        }

        Ok(first_string(&body, &["/status", "/data/status", "/transaction/status"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifier_is_uppercase_alphanumeric_within_bounds() {
        for _ in 0..200 {
            let id = generate_identifier();
            assert!((IDENTIFIER_MIN_LEN..=IDENTIFIER_MAX_LEN).contains(&id.len()), "{id}");
            assert!(id
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase()));
        }
    }

    #[test]
    fn parses_nested_pix_object() {
        let charge = parse_charge(&json!({
            "transactionId": "tx_1",
            "pix": {"code": "000201abc", "qrCodeUrl": "https://lx.example/qr.png"}
        }))
        .unwrap();

        assert_eq!(charge.transaction_id, "tx_1");
        assert_eq!(charge.pix_code.as_deref(), Some("000201abc"));
        assert_eq!(charge.qr_code_url.as_deref(), Some("https://lx.example/qr.png"));
    }

    #[test]
    fn parses_flat_and_legacy_shapes() {
        let charge = parse_charge(&json!({"order": {"id": "ord_9"}, "pix": "000201flat"})).unwrap();
        assert_eq!(charge.transaction_id, "ord_9");
        assert_eq!(charge.pix_code.as_deref(), Some("000201flat"));
        assert!(charge.qr_code_url.is_none());

        let charge = parse_charge(&json!({"id": 77, "qrcode": "000201top"})).unwrap();
        assert_eq!(charge.transaction_id, "77");
        assert_eq!(charge.pix_code.as_deref(), Some("000201top"));
    }

    #[test]
    fn missing_transaction_id_is_an_error() {
        let err = parse_charge(&json!({"pix": {"code": "000201"}})).unwrap_err();
        assert!(matches!(err, GatewayError::MissingTransactionId));
    }

    #[tokio::test]
    async fn refuses_to_call_without_credentials() {
        let gateway = LxPayGateway::new(&LxPayConfig::default()).unwrap();
        let err = gateway.fetch_status("tx").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
    }
}
