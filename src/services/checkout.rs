use chrono::Utc;
use metrics::counter;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::{CheckoutConfig, InvalidDocumentPolicy},
    entities::order::Model as OrderModel,
    errors::ServiceError,
    gateways::{PaymentGateway, PixCharge, PixChargeRequest, PixCustomer, PixProduct},
    identity,
    models::{lenient, TrackingParameters},
    services::{
        attribution::{
            AttributionCustomer, AttributionEvent, AttributionForwarder, AttributionProduct,
            AttributionStatus,
        },
        orders::{reais_to_cents, NewOrder, OrderService},
    },
};

/// Fewer digits than this and the customer's phone is replaced by the default
const MIN_PHONE_DIGITS: usize = 10;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Customer block the storefront may nest under `cliente`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CustomerInput {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub telefone: Option<String>,
}

/// One cart line. Prices are unit prices in reais.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(default, alias = "idProduto", deserialize_with = "lenient::string")]
    pub id: Option<String>,
    #[serde(default, alias = "nomeProduto")]
    pub nome: Option<String>,
    #[serde(default, alias = "qtdeProduto", deserialize_with = "lenient::quantity")]
    pub quantidade: Option<u32>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[schema(value_type = Option<f64>)]
    pub preco_promocional: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[schema(value_type = Option<f64>)]
    pub preco_original: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    #[schema(value_type = Option<f64>)]
    pub preco: Option<Decimal>,
}

impl CartItem {
    /// Promotional price, then original, then plain price; zero when none is given
    pub fn unit_price(&self) -> Decimal {
        self.preco_promocional
            .or(self.preco_original)
            .or(self.preco)
            .unwrap_or(Decimal::ZERO)
    }

    fn to_product(&self) -> PixProduct {
        PixProduct {
            id: self.id.clone().unwrap_or_else(generated_product_id),
            name: self
                .nome
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Produto".to_string()),
            quantity: self.quantidade.unwrap_or(1),
            price: self.unit_price(),
        }
    }
}

/// Checkout payload exactly as the storefront posts it.
///
/// Customer fields may sit at the top level or under `cliente`; top-level
/// values win. Tracking keys may sit at the top level or under `utmParams`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Total in centavos
    #[serde(default, deserialize_with = "lenient::cents")]
    #[schema(value_type = Option<i64>, example = 5180)]
    pub valor: Option<i64>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub telefone: Option<String>,
    #[serde(default)]
    pub cliente: Option<CustomerInput>,
    #[serde(default)]
    pub itens: Vec<CartItem>,
    /// Delivery address, passed through to gateway metadata untouched
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub endereco: Option<Value>,
    #[serde(default, rename = "utmParams")]
    #[schema(value_type = Option<Object>)]
    pub utm_params: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub tracking: TrackingParameters,
}

impl CheckoutRequest {
    fn customer_field<'a>(
        &'a self,
        top: &'a Option<String>,
        nested: impl Fn(&'a CustomerInput) -> &'a Option<String>,
    ) -> Option<&'a str> {
        top.as_deref()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| {
                self.cliente
                    .as_ref()
                    .and_then(|c| nested(c).as_deref())
                    .filter(|v| !v.trim().is_empty())
            })
            .map(str::trim)
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer_field(&self.nome, |c| &c.nome)
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer_field(&self.email, |c| &c.email)
    }

    pub fn customer_document(&self) -> Option<&str> {
        self.customer_field(&self.cpf, |c| &c.cpf)
    }

    pub fn customer_phone(&self) -> Option<&str> {
        self.customer_field(&self.telefone, |c| &c.telefone)
    }

    /// Top-level tracking keys overlaid with `utmParams`
    pub fn tracking_parameters(&self) -> TrackingParameters {
        let nested = self
            .utm_params
            .as_ref()
            .map(TrackingParameters::from_json_object)
            .unwrap_or_default();
        self.tracking.clone().merge(nested)
    }
}

/// The fields that must be present before a gateway is called
#[derive(Debug, Validate)]
struct RequiredFields {
    #[validate(range(min = 1, message = "valor must be greater than zero"))]
    amount_cents: i64,
    #[validate(length(min = 1, message = "nome is required"))]
    name: String,
    #[validate(email(message = "email must be a valid address"))]
    email: String,
}

/// Facts about the inbound HTTP request the checkout needs
#[derive(Debug, Clone, Default)]
pub struct RequestOrigin {
    /// `scheme://host` the storefront reached us on
    pub base_url: Option<String>,
    pub client_ip: Option<String>,
}

/// A charge that was created and stored
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: OrderModel,
    pub charge: PixCharge,
}

/// Turns storefront carts into gateway charges and pending orders
#[derive(Clone)]
pub struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    orders: OrderService,
    attribution: AttributionForwarder,
    config: CheckoutConfig,
}

impl CheckoutService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: OrderService,
        attribution: AttributionForwarder,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            gateway,
            orders,
            attribution,
            config,
        }
    }

    /// Digits-only document to send to the gateway.
    ///
    /// A missing document is replaced by a generated CPF. An invalid one is
    /// rejected or replaced according to `invalid_document_policy`.
    pub fn resolve_document(&self, raw: Option<&str>) -> Result<String, ServiceError> {
        let digits = raw.map(identity::normalize).unwrap_or_default();

        if digits.is_empty() {
            debug!("No customer document supplied; generating CPF");
            return Ok(identity::generate_valid_cpf());
        }
        if identity::is_valid_document(&digits) {
            return Ok(digits);
        }

        match self.config.invalid_document_policy {
            InvalidDocumentPolicy::Reject => {
                info!(document = %identity::mask(&digits), "Rejecting invalid customer document");
                Err(ServiceError::ValidationError(
                    "cpf is not a valid CPF or CNPJ".to_string(),
                ))
            }
            InvalidDocumentPolicy::Regenerate => {
                warn!(
                    document = %identity::mask(&digits),
                    "Invalid customer document; substituting generated CPF"
                );
                Ok(identity::generate_valid_cpf())
            }
        }
    }

    /// Digits-only phone, or the configured default when too short
    pub fn resolve_phone(&self, raw: Option<&str>) -> String {
        let digits = raw.map(identity::normalize).unwrap_or_default();
        if digits.len() < MIN_PHONE_DIGITS {
            self.config.default_phone.clone()
        } else {
            digits
        }
    }

    fn callback_url(&self, origin: &RequestOrigin) -> String {
        let base = self
            .config
            .public_base_url
            .as_deref()
            .or(origin.base_url.as_deref())
            .map(|b| b.trim_end_matches('/'))
            .unwrap_or_default();
        if base.is_empty() {
            return String::new();
        }
        format!("{}{}", base, self.gateway.webhook_path())
    }

    fn metadata(&self, request: &CheckoutRequest, tracking: &TrackingParameters) -> Value {
        let mut metadata = json!({
            "pedido_id": generated_order_reference(),
            "fonte": self.config.store_source,
            "timestamp": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        if let Some(address) = request.endereco.as_ref().filter(|a| !is_blank(a)) {
            metadata["entrega"] = address.clone();
        }
        if !tracking.is_empty() {
            metadata["utm_params"] = tracking.to_json();
        }
        metadata
    }

    /// Creates a PIX charge for a storefront cart and records it as pending.
    #[instrument(skip(self, request, origin), fields(gateway = self.gateway.name()))]
    pub async fn create_pix_checkout(
        &self,
        request: CheckoutRequest,
        origin: RequestOrigin,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let required = RequiredFields {
            amount_cents: request.valor.unwrap_or(0),
            name: request.customer_name().unwrap_or_default().to_string(),
            email: request.customer_email().unwrap_or_default().to_string(),
        };
        required.validate()?;
        let RequiredFields {
            amount_cents,
            name,
            email,
        } = required;

        let document = self.resolve_document(request.customer_document())?;
        let phone = self.resolve_phone(request.customer_phone());
        let tracking = request.tracking_parameters();
        let products: Vec<PixProduct> = request.itens.iter().map(CartItem::to_product).collect();

        let charge_request = PixChargeRequest {
            amount_cents,
            customer: PixCustomer {
                name: name.clone(),
                email: email.clone(),
                document: document.clone(),
                phone: phone.clone(),
            },
            products: products.clone(),
            metadata: self.metadata(&request, &tracking),
            callback_url: self.callback_url(&origin),
        };

        let charge = match self.gateway.create_pix_charge(&charge_request).await {
            Ok(charge) => charge,
            Err(e) => {
                error!(error = %e, "Gateway failed to create PIX charge");
                counter!("pix_checkout.gateway_failures", 1, "operation" => "create_pix_charge");
                counter!("pix_checkout.checkouts", 1, "outcome" => "failed");
                return Err(e.into());
            }
        };

        let order = self
            .orders
            .record_pending(NewOrder {
                transaction_id: charge.transaction_id.clone(),
                amount_cents,
                customer_name: name.clone(),
                email: email.clone(),
                document: document.clone(),
                phone: phone.clone(),
                tracking: tracking.clone(),
            })
            .await?;

        counter!("pix_checkout.checkouts", 1, "outcome" => "created");
        info!(
            transaction_id = %charge.transaction_id,
            amount_cents,
            has_pix_code = charge.pix_code.is_some(),
            "PIX checkout created"
        );

        self.attribution.forward(AttributionEvent {
            order_id: charge.transaction_id.clone(),
            status: AttributionStatus::WaitingPayment,
            created_at: order.created_at,
            approved_at: None,
            customer: AttributionCustomer {
                name,
                email,
                phone: Some(phone),
                document,
                ip: origin.client_ip,
            },
            products: products
                .iter()
                .map(|p| AttributionProduct {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    quantity: p.quantity,
                    price_in_cents: reais_to_cents(p.price),
                })
                .collect(),
            tracking,
            amount_cents,
        });

        Ok(CheckoutOutcome { order, charge })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

/// `ped_{millis}_{9 base36 chars}`
fn generated_order_reference() -> String {
    format!("ped_{}_{}", Utc::now().timestamp_millis(), random_base36(9))
}

fn generated_product_id() -> String {
    format!("prod_{}", random_base36(13))
}
