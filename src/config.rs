use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_LXPAY_BASE_URL: &str = "https://api.lxpay.com.br";
const DEFAULT_ABYSSALPAY_DEPOSIT_URL: &str = "https://abyssalpay.com/api/wallet/deposit/payment";
const DEFAULT_UTMIFY_API_URL: &str = "https://api.utmify.com.br/api-credentials/orders";
const DEFAULT_UTMIFY_PLATFORM: &str = "Monetrix";
const DEFAULT_PHONE: &str = "11999999999";
const DEFAULT_STORE_SOURCE: &str = "alphaburguer";
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Which PIX gateway new charges are sent to.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    #[default]
    Lxpay,
    Abyssalpay,
}

/// What checkout does with a customer document that fails validation.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvalidDocumentPolicy {
    /// Answer 400 and never reach the gateway
    #[default]
    Reject,
    /// Substitute a generated CPF and log a warning
    Regenerate,
}

/// LXPAY credentials and endpoint
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct LxPayConfig {
    #[serde(default = "default_lxpay_base_url")]
    #[validate(url)]
    pub base_url: String,

    #[serde(default)]
    pub public_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Outbound request timeout (seconds)
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LxPayConfig {
    fn default() -> Self {
        Self {
            base_url: default_lxpay_base_url(),
            public_key: None,
            secret_key: None,
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl LxPayConfig {
    pub fn has_credentials(&self) -> bool {
        is_set(&self.public_key) && is_set(&self.secret_key)
    }
}

/// Abyssal Pay credentials and endpoint
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AbyssalPayConfig {
    #[serde(default = "default_abyssalpay_deposit_url")]
    #[validate(url)]
    pub deposit_url: String,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AbyssalPayConfig {
    fn default() -> Self {
        Self {
            deposit_url: default_abyssalpay_deposit_url(),
            token: None,
            secret: None,
            timeout_secs: default_gateway_timeout_secs(),
        }
    }
}

impl AbyssalPayConfig {
    pub fn has_credentials(&self) -> bool {
        is_set(&self.token) && is_set(&self.secret)
    }
}

/// UTMify attribution forwarding. Disabled while `api_token` is unset.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UtmifyConfig {
    #[serde(default = "default_utmify_api_url")]
    #[validate(url)]
    pub api_url: String,

    #[serde(default)]
    pub api_token: Option<String>,

    /// Platform label reported with every order
    #[serde(default = "default_utmify_platform")]
    pub platform: String,

    /// Delivery attempts before an event is dropped
    #[serde(default = "default_utmify_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(default = "default_utmify_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub is_test: bool,
}

impl Default for UtmifyConfig {
    fn default() -> Self {
        Self {
            api_url: default_utmify_api_url(),
            api_token: None,
            platform: default_utmify_platform(),
            max_attempts: default_utmify_max_attempts(),
            timeout_secs: default_utmify_timeout_secs(),
            is_test: false,
        }
    }
}

impl UtmifyConfig {
    pub fn is_enabled(&self) -> bool {
        is_set(&self.api_token)
    }
}

/// Checkout behaviour knobs
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub invalid_document_policy: InvalidDocumentPolicy,

    /// Phone sent to gateways when the customer gave none (or too few digits)
    #[serde(default = "default_phone")]
    #[validate(length(min = 10, max = 13))]
    pub default_phone: String,

    /// Value of `metadata.fonte` on every charge
    #[serde(default = "default_store_source")]
    pub store_source: String,

    /// Public origin used to build webhook callback URLs, e.g. `https://loja.example.com`.
    /// Falls back to the request's Host header when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Ask the gateway when a polled order is not yet paid locally
    #[serde(default = "default_true_bool")]
    pub refresh_status_from_gateway: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            invalid_document_policy: InvalidDocumentPolicy::default(),
            default_phone: default_phone(),
            store_source: default_store_source(),
            public_base_url: None,
            refresh_status_from_gateway: true,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Per-request timeout enforced by the HTTP stack (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Gateway that receives new PIX charges
    #[serde(default)]
    pub payment_gateway: GatewayKind,

    #[serde(default)]
    #[validate]
    pub lxpay: LxPayConfig,

    #[serde(default)]
    #[validate]
    pub abyssalpay: AbyssalPayConfig,

    #[serde(default)]
    #[validate]
    pub utmify: UtmifyConfig,

    #[serde(default)]
    #[validate]
    pub checkout: CheckoutConfig,
}

impl AppConfig {
    /// Creates a configuration with every optional section at its default
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            request_timeout_secs: default_request_timeout_secs(),
            auto_migrate: true,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            payment_gateway: GatewayKind::default(),
            lxpay: LxPayConfig::default(),
            abyssalpay: AbyssalPayConfig::default(),
            utmify: UtmifyConfig::default(),
            checkout: CheckoutConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    fn selected_gateway_has_credentials(&self) -> bool {
        match self.payment_gateway {
            GatewayKind::Lxpay => self.lxpay.has_credentials(),
            GatewayKind::Abyssalpay => self.abyssalpay.has_credentials(),
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && !self.selected_gateway_has_credentials() {
            let mut err = ValidationError::new("payment_gateway_credentials_required");
            err.message = Some(
                "The selected payment gateway has no credentials. Set APP__LXPAY__PUBLIC_KEY/APP__LXPAY__SECRET_KEY or APP__ABYSSALPAY__TOKEN/APP__ABYSSALPAY__SECRET."
                    .into(),
            );
            errors.add("payment_gateway", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_db_max_connections() -> u32 {
    8
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_true_bool() -> bool {
    true
}

fn default_lxpay_base_url() -> String {
    DEFAULT_LXPAY_BASE_URL.to_string()
}

fn default_abyssalpay_deposit_url() -> String {
    DEFAULT_ABYSSALPAY_DEPOSIT_URL.to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

fn default_utmify_api_url() -> String {
    DEFAULT_UTMIFY_API_URL.to_string()
}

fn default_utmify_platform() -> String {
    DEFAULT_UTMIFY_PLATFORM.to_string()
}

fn default_utmify_max_attempts() -> u32 {
    3
}

fn default_utmify_timeout_secs() -> u64 {
    10
}

fn default_phone() -> String {
    DEFAULT_PHONE.to_string()
}

fn default_store_source() -> String {
    DEFAULT_STORE_SOURCE.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("pix_checkout={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::new(filter_directive);

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*, nested sections with `__`)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://pedidos.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        gateway = ?app_config.payment_gateway,
        attribution = app_config.utmify.is_enabled(),
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
