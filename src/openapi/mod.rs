use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PIX Checkout API",
        version = "0.1.0",
        description = r#"
# PIX Checkout API

Checkout backend for the Alpha Burguer storefront.

## Flow

1. The storefront posts its cart to `POST /api/checkout/pix` and receives a PIX
   "copia e cola" code plus a QR image URL.
2. The configured gateway (LXPAY or Abyssal Pay) calls back
   `/api/webhooks/{gateway}` when the payment status changes.
3. The storefront polls `/api/checkout/status?id=...` until the order is `paid`.

## Amounts

`valor` is always in centavos. Cart item prices are unit prices in reais.

## Error Handling

Every error uses the same body:

```json
{
  "success": false,
  "error": "Bad Request",
  "message": "Validation error: email must be a valid address",
  "timestamp": "2025-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    tags(
        (name = "Checkout", description = "PIX charge creation and status polling"),
        (name = "Webhooks", description = "Gateway status callbacks"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        crate::handlers::checkout::create_pix_checkout,
        crate::handlers::checkout::get_payment_status,
        crate::handlers::checkout::post_payment_status,
        crate::handlers::webhooks::lxpay_webhook,
        crate::handlers::webhooks::abyssalpay_webhook,
        crate::handlers::health::health_check,
        crate::handlers::health::service_status,
    ),
    components(
        schemas(
            crate::services::checkout::CheckoutRequest,
            crate::services::checkout::CustomerInput,
            crate::services::checkout::CartItem,
            crate::handlers::checkout::CheckoutResponse,
            crate::handlers::checkout::PixCodePayload,
            crate::handlers::checkout::StatusRequest,
            crate::handlers::checkout::StatusResponse,
            crate::handlers::webhooks::WebhookPayload,
            crate::handlers::webhooks::WebhookResponse,
            crate::handlers::health::HealthResponse,
            crate::handlers::health::ServiceStatusResponse,
            crate::models::OrderStatus,
            crate::models::TrackingParameters,
            crate::services::orders::StatusSource,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
