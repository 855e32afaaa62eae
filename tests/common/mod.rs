#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use pix_checkout::{
    config::AppConfig,
    db,
    entities::order,
    gateways::{GatewayError, PaymentGateway, PixCharge, PixChargeRequest},
    AppState,
};
use sea_orm::EntityTrait;
use serde_json::Value;
use tower::ServiceExt;

/// In-process gateway double: records every charge request and answers
/// status lookups from a map the test controls.
#[derive(Default)]
pub struct StubGateway {
    pub requests: Mutex<Vec<PixChargeRequest>>,
    pub statuses: Mutex<HashMap<String, String>>,
    pub fail_charges: Mutex<bool>,
    pub fail_lookups: Mutex<bool>,
    /// Ids handed out before falling back to `tx-stub-N`
    pub charge_ids: Mutex<VecDeque<String>>,
    counter: Mutex<u32>,
}

impl StubGateway {
    pub fn set_status(&self, transaction_id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(transaction_id.to_string(), status.to_string());
    }

    pub fn queue_charge_id(&self, transaction_id: &str) {
        self.charge_ids
            .lock()
            .unwrap()
            .push_back(transaction_id.to_string());
    }

    pub fn last_request(&self) -> PixChargeRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("gateway was never called")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn webhook_path(&self) -> &'static str {
        "/api/webhooks/lxpay"
    }

    async fn create_pix_charge(&self, request: &PixChargeRequest) -> Result<PixCharge, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());
        if *self.fail_charges.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 422,
                message: "document invalid".to_string(),
            });
        }

        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let transaction_id = self
            .charge_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("tx-stub-{}", *counter));
        Ok(PixCharge {
            transaction_id,
            pix_code: Some("00020126580014br.gov.bcb.pix0136stub".to_string()),
            qr_code_url: None,
        })
    }

    async fn fetch_status(&self, transaction_id: &str) -> Result<Option<String>, GatewayError> {
        if *self.fail_lookups.lock().unwrap() {
            return Err(GatewayError::InvalidResponse("stub lookup failure".to_string()));
        }
        Ok(self.statuses.lock().unwrap().get(transaction_id).cloned())
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
}

pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One connection keeps every query on the same in-memory database.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let gateway = Arc::new(StubGateway::default());
        let state = AppState::with_gateway(Arc::new(pool), cfg, gateway.clone())
            .expect("failed to build app state");
        let router = pix_checkout::app_router(state.clone());

        Self {
            router,
            state,
            gateway,
        }
    }

    /// Send a request against the router and decode the JSON body (Null when empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("failed to build request"))
            .await
            .expect("router error during test request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body), &[("host", "loja.example.com")])
            .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None, &[]).await
    }

    pub async fn order(&self, transaction_id: &str) -> Option<order::Model> {
        order::Entity::find_by_id(transaction_id.to_string())
            .one(&*self.state.db)
            .await
            .expect("order lookup failed")
    }
}

/// A storefront payload that passes validation
pub fn cart_payload() -> Value {
    serde_json::json!({
        "valor": 5180,
        "nome": "Maria Souza",
        "email": "maria@example.com",
        "cpf": "111.444.777-35",
        "telefone": "(11) 98888-7777",
        "itens": [
            {"id": "burger-1", "nome": "X-Bacon", "quantidade": 2, "precoOriginal": 29.9, "precoPromocional": 25.9}
        ],
        "endereco": {"rua": "Av. Paulista", "numero": "1000", "cidade": "São Paulo"},
        "utmParams": {"utm_source": "facebook", "utm_campaign": "combo"}
    })
}
