//! Configuration for subscription-service.

use dotenvy::dotenv;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Background sweep cadence. `None` disables the in-process sweep;
/// an external scheduler can drive POST /process-all instead.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub interval_secs: Option<u64>,
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let common = CoreConfig::load()?;

        let database_url = env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("DATABASE_URL must be set"))
        })?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a number"))
            })?;
        let min_connections = env::var("DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("DATABASE_MIN_CONNECTIONS must be a number"))
            })?;

        let otlp_endpoint = env::var("OTLP_ENDPOINT").ok();

        let sweep_interval_secs = match env::var("SWEEP_INTERVAL_SECS") {
            Ok(value) => Some(value.parse().map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("SWEEP_INTERVAL_SECS must be a number"))
            })?),
            Err(_) => None,
        };

        Ok(Self {
            common,
            service_name: "subscription-service".to_string(),
            otlp_endpoint,
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                min_connections,
            },
            sweep: SweepConfig {
                interval_secs: sweep_interval_secs,
            },
        })
    }
}
