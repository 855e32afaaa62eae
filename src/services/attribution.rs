use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::UtmifyConfig;
use crate::errors::ServiceError;
use crate::models::TrackingParameters;

/// Date layout UTMify expects, always in UTC
const UTMIFY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Order lifecycle events reported to UTMify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionStatus {
    WaitingPayment,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionCustomer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub document: String,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionProduct {
    pub id: String,
    pub name: String,
    pub quantity: u32,
    pub price_in_cents: i64,
}

/// Everything needed to report one order state change
#[derive(Debug, Clone)]
pub struct AttributionEvent {
    pub order_id: String,
    pub status: AttributionStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub customer: AttributionCustomer,
    pub products: Vec<AttributionProduct>,
    pub tracking: TrackingParameters,
    pub amount_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UtmifyOrder<'a> {
    order_id: &'a str,
    platform: &'a str,
    payment_method: &'static str,
    status: AttributionStatus,
    created_at: String,
    approved_date: Option<String>,
    refunded_at: Option<String>,
    customer: UtmifyCustomer<'a>,
    products: Vec<UtmifyProduct<'a>>,
    tracking_parameters: &'a TrackingParameters,
    commission: UtmifyCommission,
    is_test: bool,
}

#[derive(Debug, Serialize)]
struct UtmifyCustomer<'a> {
    name: &'a str,
    email: &'a str,
    phone: Option<&'a str>,
    document: &'a str,
    country: &'static str,
    ip: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UtmifyProduct<'a> {
    id: &'a str,
    name: &'a str,
    plan_id: Option<String>,
    plan_name: Option<String>,
    quantity: u32,
    price_in_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UtmifyCommission {
    total_price_in_cents: i64,
    gateway_fee_in_cents: i64,
    user_commission_in_cents: i64,
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format(UTMIFY_DATE_FORMAT).to_string()
}

/// Forwards order events to UTMify on spawned tasks.
///
/// Delivery is best effort: attempts are retried with exponential backoff and
/// a final failure is only logged, never surfaced to the checkout caller.
#[derive(Clone)]
pub struct AttributionForwarder {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
    platform: String,
    is_test: bool,
    max_attempts: u32,
    base_backoff: Duration,
}

impl AttributionForwarder {
    pub fn new(config: &UtmifyConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_token: config
                .api_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            platform: config.platform.clone(),
            is_test: config.is_test,
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_secs(1),
        })
    }

    /// Overrides the first retry delay; later retries double it.
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.api_token.is_some()
    }

    fn payload<'a>(&'a self, event: &'a AttributionEvent) -> UtmifyOrder<'a> {
        UtmifyOrder {
            order_id: &event.order_id,
            platform: &self.platform,
            payment_method: "pix",
            status: event.status,
            created_at: format_date(event.created_at),
            approved_date: event.approved_at.map(format_date),
            refunded_at: None,
            customer: UtmifyCustomer {
                name: &event.customer.name,
                email: &event.customer.email,
                phone: event.customer.phone.as_deref(),
                document: &event.customer.document,
                country: "BR",
                ip: event.customer.ip.as_deref(),
            },
            products: event
                .products
                .iter()
                .map(|p| UtmifyProduct {
                    id: &p.id,
                    name: &p.name,
                    plan_id: None,
                    plan_name: None,
                    quantity: p.quantity,
                    price_in_cents: p.price_in_cents,
                })
                .collect(),
            tracking_parameters: &event.tracking,
            commission: UtmifyCommission {
                total_price_in_cents: event.amount_cents,
                gateway_fee_in_cents: 0,
                user_commission_in_cents: event.amount_cents,
            },
            is_test: self.is_test,
        }
    }

    /// Delivers one event, retrying with exponential backoff
    #[instrument(skip(self, event), fields(order_id = %event.order_id, status = ?event.status))]
    pub async fn deliver(&self, event: &AttributionEvent) -> Result<(), ServiceError> {
        let Some(token) = self.api_token.as_deref() else {
            debug!("Attribution forwarding disabled; skipping event");
            return Ok(());
        };

        let body = serde_json::to_string(&self.payload(event))?;

        for attempt in 1..=self.max_attempts {
            let request = self
                .client
                .post(&self.api_url)
                .header("Content-Type", "application/json")
                .header("x-api-token", token)
                .body(body.clone());

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(attempt, "Attribution event delivered");
                    counter!("pix_checkout.attribution.delivered", 1);
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        "Attribution delivery failed with status: {} (attempt {}/{})",
                        response.status(),
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => {
                    warn!(
                        "Attribution delivery error: {} (attempt {}/{})",
                        e, attempt, self.max_attempts
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.base_backoff * 2_u32.pow(attempt - 1)).await;
            }
        }

        counter!("pix_checkout.attribution.failed", 1);
        Err(ServiceError::ExternalServiceError(format!(
            "Failed to deliver attribution event after {} attempts",
            self.max_attempts
        )))
    }

    /// Fire-and-forget delivery
    pub fn forward(&self, event: AttributionEvent) {
        if !self.is_enabled() {
            return;
        }

        let forwarder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = forwarder.deliver(&event).await {
                error!(order_id = %event.order_id, "Async attribution delivery failed: {}", e);
            }
        });
    }
}
