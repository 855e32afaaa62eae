use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    entities::order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
    gateways::PaymentGateway,
    models::{OrderStatus, TrackingParameters},
    services::attribution::{
        AttributionCustomer, AttributionEvent, AttributionForwarder, AttributionStatus,
    },
};

/// Longest transaction id the `pedidos` key column holds
pub const MAX_TRANSACTION_ID_LEN: usize = 128;

/// Customer and amount captured when a charge is created
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub transaction_id: String,
    pub amount_cents: i64,
    pub customer_name: String,
    pub email: String,
    pub document: String,
    pub phone: String,
    pub tracking: TrackingParameters,
}

/// Where a polled status came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Database,
    Gateway,
    None,
}

#[derive(Debug, Clone)]
pub struct StatusLookup {
    pub transaction_id: String,
    pub status: OrderStatus,
    pub source: StatusSource,
    pub amount_cents: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
    pub gateway_status: Option<String>,
    pub message: Option<String>,
}

/// Result of applying a gateway status to the store
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub order: OrderModel,
    pub previous: Option<OrderStatus>,
    pub became_paid: bool,
}

/// Trims a transaction id down to `[A-Za-z0-9_.-]`.
/// Returns `None` when nothing usable is left.
pub fn sanitize_transaction_id(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_TRANSACTION_ID_LEN)
        .collect();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Converts a decimal amount in reais to centavos, rounding half away from zero.
/// Amounts that overflow count as zero.
pub fn reais_to_cents(amount: Decimal) -> i64 {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| {
            cents
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .unwrap_or(0)
}

/// Access to the `pedidos` table plus the status rules around it
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    attribution: AttributionForwarder,
    refresh_from_gateway: bool,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        attribution: AttributionForwarder,
        refresh_from_gateway: bool,
    ) -> Self {
        Self {
            db,
            gateway,
            attribution,
            refresh_from_gateway,
        }
    }

    pub async fn find(&self, transaction_id: &str) -> Result<Option<OrderModel>, ServiceError> {
        Ok(OrderEntity::find_by_id(transaction_id.to_string())
            .one(&*self.db)
            .await?)
    }

    async fn get(&self, transaction_id: &str) -> Result<OrderModel, ServiceError> {
        self.find(transaction_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", transaction_id)))
    }

    /// Stores a freshly created charge as pending.
    ///
    /// A webhook can beat the insert; in that case the row already exists and
    /// only the customer columns are filled in, keeping the webhook's status.
    #[instrument(skip(self, new_order), fields(transaction_id = %new_order.transaction_id))]
    pub async fn record_pending(&self, new_order: NewOrder) -> Result<OrderModel, ServiceError> {
        // Webhooks and polls look rows up by the sanitized id.
        if sanitize_transaction_id(&new_order.transaction_id).as_deref()
            != Some(new_order.transaction_id.as_str())
        {
            warn!("Gateway transaction id cannot be stored");
            return Err(ServiceError::ExternalServiceError(format!(
                "gateway returned an unusable transaction id {:?}",
                new_order.transaction_id
            )));
        }

        let now = Utc::now();
        let utm_params = (!new_order.tracking.is_empty())
            .then(|| new_order.tracking.to_json().to_string());

        let row = OrderActiveModel {
            transaction_id: Set(new_order.transaction_id.clone()),
            status: Set(OrderStatus::Pending),
            amount_cents: Set(new_order.amount_cents),
            customer_name: Set(Some(new_order.customer_name)),
            email: Set(Some(new_order.email)),
            document: Set(Some(new_order.document)),
            phone: Set(Some(new_order.phone)),
            utm_params: Set(utm_params),
            created_at: Set(now),
            updated_at: Set(now),
        };

        OrderEntity::insert(row)
            .on_conflict(
                OnConflict::column(order::Column::TransactionId)
                    .update_columns([
                        order::Column::AmountCents,
                        order::Column::CustomerName,
                        order::Column::Email,
                        order::Column::Document,
                        order::Column::Phone,
                        order::Column::UtmParams,
                        order::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?;

        info!("Pending order recorded");
        self.get(&new_order.transaction_id).await
    }

    /// Upserts a gateway-reported status; last write wins.
    ///
    /// Unknown transactions get a basic row with the reported amount. A
    /// transition into `paid` forwards a paid attribution event.
    #[instrument(skip(self, amount))]
    pub async fn apply_gateway_status(
        &self,
        transaction_id: &str,
        raw_status: Option<&str>,
        amount: Option<Decimal>,
    ) -> Result<StatusUpdate, ServiceError> {
        let status = match raw_status {
            Some(raw) => {
                if !OrderStatus::recognizes(raw) {
                    warn!(raw_status = raw, "Unrecognised gateway status, treating as pending");
                }
                OrderStatus::from_gateway(raw)
            }
            None => {
                warn!("Gateway update without status, treating as pending");
                OrderStatus::Pending
            }
        };

        let previous = self.find(transaction_id).await?.map(|order| order.status);
        let now = Utc::now();

        let row = OrderActiveModel {
            transaction_id: Set(transaction_id.to_string()),
            status: Set(status),
            amount_cents: Set(amount.map(reais_to_cents).unwrap_or(0)),
            customer_name: Set(None),
            email: Set(None),
            document: Set(None),
            phone: Set(None),
            utm_params: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = OrderEntity::insert(row)
            .on_conflict(
                OnConflict::column(order::Column::TransactionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await?
            > 0;

        // A paid delivery only counts when its write moves the row into `paid`.
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(status))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::TransactionId.eq(transaction_id));
        if status.is_paid() {
            update = update.filter(order::Column::Status.ne(OrderStatus::Paid));
        }
        let changed = !inserted && update.exec(&*self.db).await?.rows_affected > 0;

        let order = self.get(transaction_id).await?;
        let became_paid = status.is_paid() && (inserted || changed);

        counter!("pix_checkout.order_status_updates", 1, "status" => status.to_string());
        info!(
            previous = ?previous,
            status = %status,
            created = inserted,
            "Order status updated"
        );

        if became_paid {
            self.attribution.forward(paid_event(&order, now));
        }

        Ok(StatusUpdate {
            order,
            previous,
            became_paid,
        })
    }

    /// Answers "has this order been paid yet?"
    ///
    /// Settled local rows are authoritative. Otherwise, when enabled, the
    /// gateway is asked and a differing answer is written back. A gateway
    /// failure never fails the poll; the local status (or pending) is returned.
    #[instrument(skip(self))]
    pub async fn poll_status(&self, transaction_id: &str) -> Result<StatusLookup, ServiceError> {
        let local = self.find(transaction_id).await?;

        let settled = local.as_ref().map(|o| o.status.is_final()).unwrap_or(false);
        if settled || !self.refresh_from_gateway {
            return Ok(from_local(transaction_id, local));
        }

        match self.gateway.fetch_status(transaction_id).await {
            Ok(Some(raw)) => {
                let status = OrderStatus::from_gateway(&raw);
                let mut updated_at = None;

                if let Some(order) = local.as_ref().filter(|o| o.status != status) {
                    info!(from = %order.status, to = %status, "Gateway reports a newer status");
                    let update = self
                        .apply_gateway_status(transaction_id, Some(&raw), None)
                        .await?;
                    updated_at = Some(update.order.updated_at);
                }

                Ok(StatusLookup {
                    transaction_id: transaction_id.to_string(),
                    status,
                    source: StatusSource::Gateway,
                    amount_cents: local.as_ref().map(|o| o.amount_cents),
                    updated_at: updated_at.or_else(|| local.as_ref().map(|o| o.updated_at)),
                    gateway_status: Some(raw),
                    message: None,
                })
            }
            Ok(None) => Ok(from_local(transaction_id, local)),
            Err(e) => {
                warn!(gateway = self.gateway.name(), error = %e, "Gateway status lookup failed");
                counter!("pix_checkout.gateway_failures", 1, "operation" => "fetch_status");
                let mut lookup = from_local(transaction_id, local);
                lookup.message = Some("Gateway status lookup failed".to_string());
                Ok(lookup)
            }
        }
    }
}

fn from_local(transaction_id: &str, local: Option<OrderModel>) -> StatusLookup {
    match local {
        Some(order) => StatusLookup {
            transaction_id: transaction_id.to_string(),
            status: order.status,
            source: StatusSource::Database,
            amount_cents: Some(order.amount_cents),
            updated_at: Some(order.updated_at),
            gateway_status: None,
            message: None,
        },
        None => StatusLookup {
            transaction_id: transaction_id.to_string(),
            status: OrderStatus::Pending,
            source: StatusSource::None,
            amount_cents: None,
            updated_at: None,
            gateway_status: None,
            message: None,
        },
    }
}

/// The stored row has no cart, so paid events carry no products.
fn paid_event(order: &OrderModel, approved_at: DateTime<Utc>) -> AttributionEvent {
    AttributionEvent {
        order_id: order.transaction_id.clone(),
        status: AttributionStatus::Paid,
        created_at: order.created_at,
        approved_at: Some(approved_at),
        customer: AttributionCustomer {
            name: order.customer_name.clone().unwrap_or_default(),
            email: order.email.clone().unwrap_or_default(),
            phone: order.phone.clone(),
            document: order.document.clone().unwrap_or_default(),
            ip: None,
        },
        products: Vec::new(),
        tracking: TrackingParameters::from_stored(order.utm_params.as_deref()),
        amount_cents: order.amount_cents,
    }
}
