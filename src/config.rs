use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Checkout policy knobs.
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutConfig {
    /// Recency window in seconds within which a repeated checkout intent
    /// (same owner, total, phone, email) is treated as a retry and answered
    /// with the prior payment link. This is a distinct policy value; it is
    /// not derived from the provider's invoice expiry.
    #[serde(default = "default_idempotency_window_secs")]
    pub idempotency_window_secs: u64,

    /// Static redirect used for OFFLINE (pay-on-delivery) orders.
    pub offline_payment_link: String,

    /// Description line sent to the provider with each invoice.
    #[serde(default = "default_invoice_description")]
    pub invoice_description: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            idempotency_window_secs: default_idempotency_window_secs(),
            offline_payment_link: "https://shop.example.com/pay-on-delivery".to_string(),
            invoice_description: default_invoice_description(),
        }
    }
}

/// Static configuration block for the payment provider: credential exchange
/// parameters plus the merchant fields merged into every invoice request.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    pub token_url: String,
    pub payment_url: String,
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub account_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_expire_period")]
    pub expire_period: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub post_link: String,
    #[serde(default)]
    pub failure_post_link: String,
    #[serde(default)]
    pub back_link: String,
    #[serde(default)]
    pub failure_back_link: String,
    /// Outbound call timeout. A stalled provider must not pin request
    /// handling capacity; the whole checkout attempt aborts on expiry.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token_url: "https://provider.example.com/oauth2/token".to_string(),
            payment_url: "https://provider.example.com/invoice".to_string(),
            grant_type: default_grant_type(),
            scope: String::new(),
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            shop_id: String::new(),
            account_id: String::new(),
            language: default_language(),
            expire_period: default_expire_period(),
            currency: default_currency(),
            post_link: String::new(),
            failure_post_link: String::new(),
            back_link: String::new(),
            failure_back_link: String::new(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Inbound webhook authenticity settings. When `secret` is unset the
/// signature check is skipped (e.g., behind a trusted gateway).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WebhookConfig {
    pub secret: Option<String>,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub tolerance_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    /// Create missing tables from entity definitions at startup.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub checkout: CheckoutConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl AppConfig {
    /// Minimal configuration for tests and tooling.
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            host: default_host(),
            port: default_port(),
            environment: "test".to_string(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            db_max_connections: 1,
            db_min_connections: 1,
            request_timeout_secs: default_request_timeout_secs(),
            checkout: CheckoutConfig::default(),
            provider: ProviderConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_idempotency_window_secs() -> u64 {
    86_400
}

fn default_invoice_description() -> String {
    "Order payment".to_string()
}

fn default_grant_type() -> String {
    "password".to_string()
}

fn default_language() -> String {
    "ru".to_string()
}

fn default_expire_period() -> String {
    "1d".to_string()
}

fn default_currency() -> String {
    "KZT".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

/// Load configuration from `config/default.toml`, an environment-specific
/// overlay, and `APP__`-prefixed environment variables, in that order.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std::env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    Config::builder()
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
