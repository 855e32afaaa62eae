use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{instrument, warn};

use super::{
    first_string, http_client, read_body, rejection, GatewayError, PaymentGateway, PixCharge,
    PixChargeRequest,
};
use crate::config::AbyssalPayConfig;

#[derive(Serialize)]
struct DepositRequest<'a> {
    token: &'a str,
    secret: &'a str,
    postback: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    debtor_name: &'a str,
    email: &'a str,
    debtor_document_number: &'a str,
    phone: &'a str,
    method_pay: &'static str,
}

/// Abyssal Pay wallet deposits. Credentials travel in the body, and there
/// is no status lookup: updates arrive only through the postback.
pub struct AbyssalPayGateway {
    client: reqwest::Client,
    deposit_url: String,
    token: String,
    secret: String,
}

impl AbyssalPayGateway {
    pub fn new(config: &AbyssalPayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            deposit_url: config.deposit_url.clone(),
            token: config.token.clone().unwrap_or_default(),
            secret: config.secret.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PaymentGateway for AbyssalPayGateway {
    fn name(&self) -> &'static str {
        "abyssalpay"
    }

    fn webhook_path(&self) -> &'static str {
        "/api/webhooks/abyssalpay"
    }

    #[instrument(skip(self, request), fields(amount_cents = request.amount_cents))]
    async fn create_pix_charge(
        &self,
        request: &PixChargeRequest,
    ) -> Result<PixCharge, GatewayError> {
        if self.token.trim().is_empty() || self.secret.trim().is_empty() {
            return Err(GatewayError::NotConfigured(
                "Abyssal Pay token/secret missing".to_string(),
            ));
        }

        let payload = DepositRequest {
            token: &self.token,
            secret: &self.secret,
            postback: &request.callback_url,
            amount: request.amount(),
            debtor_name: &request.customer.name,
            email: &request.customer.email,
            debtor_document_number: &request.customer.document,
            phone: &request.customer.phone,
            method_pay: "pix",
        };

        let response = self
            .client
            .post(&self.deposit_url)
            .header("Accept", "application/json")
            .json(&payload)
            .send()
            .await?;

        let (status, body, text) = read_body(response).await?;
        // Only 200 and 201 carry a deposit; other 2xx codes are treated as failures.
        if status != 200 && status != 201 {
            warn!(status, "Abyssal Pay rejected deposit");
            return Err(rejection(status, &body, &text));
        }
        if body.is_null() {
            return Err(GatewayError::InvalidResponse(
                "Abyssal Pay returned an empty or non-JSON body".to_string(),
            ));
        }

        let transaction_id =
            first_string(&body, &["/idTransaction"]).ok_or(GatewayError::MissingTransactionId)?;

        Ok(PixCharge {
            transaction_id,
            pix_code: first_string(&body, &["/qrcode"]),
            qr_code_url: first_string(&body, &["/qr_code_image_url"]),
        })
    }

    async fn fetch_status(&self, _transaction_id: &str) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
}
