pub mod checkout;
pub mod common;
pub mod health;
pub mod webhooks;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    gateways::PaymentGateway,
    services::{attribution::AttributionForwarder, checkout::CheckoutService, orders::OrderService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub checkout: CheckoutService,
}

impl AppServices {
    /// Wires the order store, checkout flow and attribution forwarder around one gateway.
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let attribution = AttributionForwarder::new(&config.utmify)?;
        let orders = OrderService::new(
            db_pool,
            gateway.clone(),
            attribution.clone(),
            config.checkout.refresh_status_from_gateway,
        );
        let checkout = CheckoutService::new(
            gateway,
            orders.clone(),
            attribution,
            config.checkout.clone(),
        );

        Ok(Self { orders, checkout })
    }
}
