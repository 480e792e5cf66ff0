//! Application configuration management.

use serde::Deserialize;

use crate::types::WalletPaymentStrategy;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Billing engine configuration.
    #[serde(default)]
    pub billing: BillingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to do when a create request reuses an idempotency key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Return the invoice created by the original request.
    #[default]
    ReturnExisting,
    /// Fail the request with a duplicate fault.
    Reject,
}

/// Billing engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Wallet ordering strategy used when the caller does not pick one.
    #[serde(default)]
    pub default_wallet_strategy: WalletPaymentStrategy,
    /// Maximum wallets debited per settlement run (0 = unbounded).
    #[serde(default)]
    pub max_wallets_to_use: usize,
    /// Behavior on idempotency-key reuse.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Whether webhook notifications are dispatched after commit.
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
}

fn default_notifications_enabled() -> bool {
    true
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_wallet_strategy: WalletPaymentStrategy::default(),
            max_wallets_to_use: 0,
            duplicate_policy: DuplicatePolicy::default(),
            notifications_enabled: default_notifications_enabled(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "quill=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("QUILL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
