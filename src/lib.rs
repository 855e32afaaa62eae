//! PIX checkout service library
//!
//! Storefront checkout, gateway webhooks and payment status polling over a
//! single `pedidos` table, plus CPF/CNPJ validation in [`identity`].
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateways;
pub mod handlers;
pub mod identity;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::gateways::PaymentGateway;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub gateway: Arc<dyn PaymentGateway>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Builds state around the gateway selected in `config`.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
    ) -> Result<Self, errors::ServiceError> {
        let gateway = gateways::from_config(&config)?;
        Self::with_gateway(db, config, gateway)
    }

    /// Builds state around an explicit gateway implementation.
    pub fn with_gateway(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, errors::ServiceError> {
        let services = handlers::AppServices::new(db.clone(), gateway.clone(), &config)?;
        Ok(Self {
            db,
            config,
            gateway,
            services,
        })
    }
}

/// Checkout and status polling routes
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/pix", post(handlers::checkout::create_pix_checkout))
        .route(
            "/status",
            get(handlers::checkout::get_payment_status)
                .post(handlers::checkout::post_payment_status),
        )
}

/// Gateway callbacks
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/lxpay", post(handlers::webhooks::lxpay_webhook))
        .route("/abyssalpay", post(handlers::webhooks::abyssalpay_webhook))
}

/// Full application router with tracing, timeout and request-id layers.
/// CORS is left to the binary since it depends on deployment.
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/status", get(handlers::health::service_status))
        .nest("/api/checkout", checkout_routes())
        .nest("/api/webhooks", webhook_routes())
        .merge(openapi::swagger_ui())
        .layer(TimeoutLayer::new(timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(tracing::configure_http_tracing())
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(tracing::request_id_middleware))
        .with_state(state)
}
