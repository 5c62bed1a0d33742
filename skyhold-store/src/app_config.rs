use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub booking: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_payment_window")]
    pub payment_window_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_payment_window() -> u64 { 900 }
fn default_sweep_interval() -> u64 { 60 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            payment_window_seconds: default_payment_window(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl BookingRules {
    pub fn payment_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.payment_window_seconds as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }

    /// Ledger entries outlive the window they can matter in.
    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.payment_window_seconds.saturating_mul(2).max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    pub base_url: String,
    #[serde(default = "default_inventory_timeout")]
    pub timeout_ms: u64,
}

fn default_inventory_timeout() -> u64 { 2000 }

impl InventoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        s.try_deserialize()
    }
}

/// Eg. `SKYHOLD__BOOKING__PAYMENT_WINDOW_SECONDS=600`. The prefix takes the
/// same `__` separator as nested keys.
fn environment() -> config::Environment {
    config::Environment::with_prefix("SKYHOLD").separator("__")
}
