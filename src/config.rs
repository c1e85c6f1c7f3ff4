//! Configuration module
//!
//! Loads configuration from environment variables, including the system
//! default exchange-rate table used when a company has no configured rate
//! for a currency pair.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Currency;

/// Hard bounds for the per-operation timeout.
const MIN_OPERATION_TIMEOUT_SECS: u64 = 1;
const MAX_OPERATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 5;

/// Timeout applied by engines when none is injected.
pub const DEFAULT_OPERATION_TIMEOUT: Duration =
    Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS);

/// Seed values for the system default rate table. Each entry can be
/// overridden with a `DEFAULT_RATE_<FROM>_<TO>` environment variable.
const SEED_RATES: [(Currency, Currency, &str); 3] = [
    (Currency::Usd, Currency::Cdf, "2200.0"),
    (Currency::Eur, Currency::Cdf, "2400.0"),
    (Currency::Usd, Currency::Eur, "0.92"),
];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// Bounded per-operation timeout, clamped to [1s, 60s]
    pub operation_timeout: Duration,

    /// System-wide default exchange rates, fallback when a company has no
    /// configured rate for a pair
    pub default_rates: HashMap<(Currency, Currency), Decimal>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let timeout_secs: u64 = env::var("OPERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_OPERATION_TIMEOUT_SECS.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OPERATION_TIMEOUT_SECS"))?;
        let operation_timeout = Duration::from_secs(
            timeout_secs.clamp(MIN_OPERATION_TIMEOUT_SECS, MAX_OPERATION_TIMEOUT_SECS),
        );

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            operation_timeout,
            default_rates: load_default_rates()?,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Build the default rate table from seeds, applying env overrides.
fn load_default_rates() -> Result<HashMap<(Currency, Currency), Decimal>, ConfigError> {
    let mut rates = HashMap::new();

    for (from, to, seed) in SEED_RATES {
        let var = format!("DEFAULT_RATE_{}_{}", from.as_str(), to.as_str());
        let raw = env::var(&var).unwrap_or_else(|_| seed.to_string());
        let rate =
            Decimal::from_str(&raw).map_err(|_| ConfigError::InvalidRate(from, to, raw))?;
        if rate <= Decimal::ZERO {
            return Err(ConfigError::InvalidRate(from, to, rate.to_string()));
        }
        rates.insert((from, to), rate);
    }

    Ok(rates)
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid default exchange rate for {0}->{1}: {2}")]
    InvalidRate(Currency, Currency, String),
}
