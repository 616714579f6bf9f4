use ingest_framework::BusConfig;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Service configuration.
///
/// # Environment variables
///
/// Every value can be overridden from the environment (or a `.env` file):
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ENV | local | `local`, `dev` or `prod` |
/// | HTTP_ADDRESS | localhost:8080 | Read gateway listen address |
/// | HTTP_TIMEOUT_MS | 4000 | Per-request timeout |
/// | STORAGE_PATH | orders.redb | Order database file |
/// | NATS_CLUSTER_ID | test-cluster | Bus cluster identifier |
/// | NATS_CLIENT_ID | client-123 | Bus client identifier |
/// | NATS_URL | nats://localhost:4222 | Bus URL |
/// | ORDERS_TOPIC | orders | Topic orders arrive on |
/// | DURABLE_NAME | my-durable | Durable subscription name |
/// | MAX_DELIVERIES | 5 | Delivery attempts per message |
/// | REDELIVERY_DELAY_MS | 500 | Pause before a nacked message is redelivered |
/// | SHUTDOWN_GRACE_MS | 5000 | Time the consumer gets to finish on shutdown |
/// | PUBLISH_DEMO_ORDER | false | Publish the demo order after startup |
///
/// A variable that is set but does not parse is an error, never silently replaced by
/// its default.
///
/// ```ignore
/// ENV=prod HTTP_ADDRESS=0.0.0.0:8080 cargo run -p order-service
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub http: HttpConfig,
    /// Path of the redb database file
    pub storage_path: String,
    pub bus: BusSettings,
    /// Grace period for the consumer on shutdown
    pub shutdown_grace: Duration,
    /// Publish [`Order::demo`](crate::model::Order::demo) once the service is up
    pub publish_demo_order: bool,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub address: String,
    pub timeout: Duration,
}

/// Bus connection and subscription parameters.
///
/// `cluster_id`, `client_id` and `url` identify an external broker. The in-process bus
/// ignores them; they are carried so a networked transport can be dropped in.
#[derive(Debug, Clone)]
pub struct BusSettings {
    pub cluster_id: String,
    pub client_id: String,
    pub url: String,
    pub topic: String,
    pub durable_name: String,
    pub max_deliveries: u32,
    pub redelivery_delay: Duration,
}

impl BusSettings {
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            max_deliveries: self.max_deliveries,
            redelivery_delay: self.redelivery_delay,
        }
    }
}

/// Deployment environment. Selects the log format and default level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(format!("expected local, dev or prod, got {other:?}")),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// Used by tests to avoid touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        Ok(Self {
            environment: parse(&lookup, "ENV", Environment::Local)?,
            http: HttpConfig {
                address: string("HTTP_ADDRESS", "localhost:8080"),
                timeout: millis(&lookup, "HTTP_TIMEOUT_MS", 4000)?,
            },
            storage_path: string("STORAGE_PATH", "orders.redb"),
            bus: BusSettings {
                cluster_id: string("NATS_CLUSTER_ID", "test-cluster"),
                client_id: string("NATS_CLIENT_ID", "client-123"),
                url: string("NATS_URL", "nats://localhost:4222"),
                topic: string("ORDERS_TOPIC", "orders"),
                durable_name: string("DURABLE_NAME", "my-durable"),
                max_deliveries: parse(&lookup, "MAX_DELIVERIES", 5)?,
                redelivery_delay: millis(&lookup, "REDELIVERY_DELAY_MS", 500)?,
            },
            shutdown_grace: millis(&lookup, "SHUTDOWN_GRACE_MS", 5000)?,
            publish_demo_order: parse(&lookup, "PUBLISH_DEMO_ORDER", false)?,
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

fn millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse(lookup, name, default).map(Duration::from_millis)
}
