//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Money;
use fulfillment::FulfillmentSettings;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps events in memory
/// - `CATALOG_URL`: inventory/catalog service; unset uses an in-memory catalog
/// - `ORDER_SERVICE_URL`: order service for the delivery side; unset calls
///   the order service of this process
/// - `UPSTREAM_CONNECT_TIMEOUT_MS` (default `2000`) and `UPSTREAM_TIMEOUT_MS`
///   (default `5000`): limits for every outbound call
/// - `DELIVERY_RATE`: delivery price per order, in whole units (default `1900`)
/// - `DELIVERY_WEBHOOK_ENABLED`: report delivery outcomes to the order side
///   (default `true`)
/// - `EVIDENCE_DIR`: where delivery photos are written (default `./evidence`)
/// - `NOTIFIER_QUEUE_CAPACITY`: pending delivery reports (default `256`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub catalog_url: Option<String>,
    pub order_service_url: Option<String>,
    pub upstream_connect_timeout: Duration,
    pub upstream_timeout: Duration,
    pub delivery_rate: i64,
    pub delivery_webhook_enabled: bool,
    pub evidence_dir: String,
    pub notifier_queue_capacity: usize,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    var(name).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            catalog_url: var("CATALOG_URL"),
            order_service_url: var("ORDER_SERVICE_URL"),
            upstream_connect_timeout: Duration::from_millis(parsed(
                "UPSTREAM_CONNECT_TIMEOUT_MS",
                2000,
            )),
            upstream_timeout: Duration::from_millis(parsed("UPSTREAM_TIMEOUT_MS", 5000)),
            delivery_rate: parsed("DELIVERY_RATE", defaults.delivery_rate),
            delivery_webhook_enabled: parsed(
                "DELIVERY_WEBHOOK_ENABLED",
                defaults.delivery_webhook_enabled,
            ),
            evidence_dir: var("EVIDENCE_DIR").unwrap_or(defaults.evidence_dir),
            notifier_queue_capacity: parsed(
                "NOTIFIER_QUEUE_CAPACITY",
                defaults.notifier_queue_capacity,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The part of the configuration the fulfillment services see.
    pub fn fulfillment_settings(&self) -> FulfillmentSettings {
        FulfillmentSettings {
            delivery_rate: Money::from_major(self.delivery_rate),
            delivery_webhook_enabled: self.delivery_webhook_enabled,
            notifier_queue_capacity: self.notifier_queue_capacity,
            ..FulfillmentSettings::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            catalog_url: None,
            order_service_url: None,
            upstream_connect_timeout: Duration::from_millis(2000),
            upstream_timeout: Duration::from_millis(5000),
            delivery_rate: 1900,
            delivery_webhook_enabled: true,
            evidence_dir: "./evidence".to_string(),
            notifier_queue_capacity: 256,
        }
    }
}
