use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::DEFAULT_BASE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in {1} environment")]
    MissingSecret(&'static str, String),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | ENVIRONMENT | development | development, staging or production |
/// | WORK_DIR | ./data | Database and log directory |
/// | HTTP_PORT | 8080 | HTTP port |
/// | DISPATCH_BASE_URL | https://api.shipday.com | Dispatch provider API |
/// | DISPATCH_API_KEY | (required outside development) | Provider key |
/// | DISPATCH_TIMEOUT_MS | 10000 | Per-request timeout |
/// | ORDER_CREDIT_COST | 1 | Credits debited per order |
/// | PLATFORM_SERVICE_FEE | 15 | Fee per completed order |
/// | DEFAULT_DRIVER_DEBT_LIMIT | 500 | Debt limit for new drivers |
/// | POLL_INTERVAL_SECS | 120 | Reconcile sweep interval |
/// | POLL_WINDOW_HOURS | 24 | Age limit of polled orders |
/// | POLL_STAGGER_MS | 250 | Delay between single fetches |
/// | PAYMENT_WEBHOOK_SECRET | (required outside development) | Stripe signing secret |
/// | LOG_LEVEL | info | Default log filter |
/// | LOG_DIR | (unset) | Daily rolling log files when set |
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub work_dir: PathBuf,
    pub http_port: u16,

    pub dispatch_base_url: String,
    pub dispatch_api_key: String,
    pub dispatch_timeout: Duration,

    pub order_credit_cost: i64,
    pub platform_service_fee: Decimal,
    pub default_driver_debt_limit: Decimal,

    pub poll_interval: Duration,
    pub poll_window: Duration,
    pub poll_stagger: Duration,

    pub payment_webhook_secret: String,

    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            http_port: parse_or("HTTP_PORT", 8080)?,

            dispatch_base_url: std::env::var("DISPATCH_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            dispatch_api_key: require_secret("DISPATCH_API_KEY", &environment)?,
            dispatch_timeout: Duration::from_millis(parse_or("DISPATCH_TIMEOUT_MS", 10_000)?),

            order_credit_cost: parse_or("ORDER_CREDIT_COST", 1)?,
            platform_service_fee: parse_or("PLATFORM_SERVICE_FEE", Decimal::from(15))?,
            default_driver_debt_limit: parse_or("DEFAULT_DRIVER_DEBT_LIMIT", Decimal::from(500))?,

            poll_interval: Duration::from_secs(parse_or("POLL_INTERVAL_SECS", 120)?),
            poll_window: hours("POLL_WINDOW_HOURS", parse_or("POLL_WINDOW_HOURS", 24)?)?,
            poll_stagger: Duration::from_millis(parse_or("POLL_STAGGER_MS", 250)?),

            payment_webhook_secret: require_secret("PAYMENT_WEBHOOK_SECRET", &environment)?,

            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.order_credit_cost <= 0 {
            return Err(ConfigError::Invalid {
                name: "ORDER_CREDIT_COST",
                value: self.order_credit_cost.to_string(),
            });
        }
        if self.platform_service_fee.is_sign_negative() {
            return Err(ConfigError::Invalid {
                name: "PLATFORM_SERVICE_FEE",
                value: self.platform_service_fee.to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_SECS",
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Path of the redb database file
    pub fn database_path(&self) -> PathBuf {
        self.work_dir.join("delivery.redb")
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Development defaults, no environment access
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            environment: "development".into(),
            work_dir: PathBuf::from("."),
            http_port: 0,
            dispatch_base_url: DEFAULT_BASE_URL.into(),
            dispatch_api_key: "test-key".into(),
            dispatch_timeout: Duration::from_secs(5),
            order_credit_cost: 1,
            platform_service_fee: Decimal::from(15),
            default_driver_debt_limit: Decimal::from(500),
            poll_interval: Duration::from_secs(120),
            poll_window: Duration::from_secs(24 * 3600),
            poll_stagger: Duration::ZERO,
            payment_webhook_secret: "whsec_test".into(),
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
///
/// A set but unparsable value is an error rather than a silent default.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw,
        }),
        _ => Ok(default),
    }
}

fn hours(name: &'static str, value: u64) -> Result<Duration, ConfigError> {
    value
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
}

/// Read a secret; only development may run without it
fn require_secret(name: &'static str, environment: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ if environment == "development" => Ok(format!("dev-{name}-not-for-production")),
        _ => Err(ConfigError::MissingSecret(name, environment.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_secret_development_fallback() {
        let value = require_secret("DELIVERY_TEST_UNSET_SECRET", "development").unwrap();
        assert_eq!(value, "dev-DELIVERY_TEST_UNSET_SECRET-not-for-production");

        let err = require_secret("DELIVERY_TEST_UNSET_SECRET", "production").unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret(_, _)));
    }

    #[test]
    fn test_parse_or_default() {
        let port: u16 = parse_or("DELIVERY_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_hours_rejects_overflow() {
        assert_eq!(hours("POLL_WINDOW_HOURS", 24).unwrap(), Duration::from_secs(86_400));
        let err = hours("POLL_WINDOW_HOURS", u64::MAX).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { name: "POLL_WINDOW_HOURS", .. }
        ));
    }

    #[test]
    fn test_validate() {
        let mut config = Config::for_tests();
        assert!(config.validate().is_ok());

        config.order_credit_cost = 0;
        assert!(config.validate().is_err());
    }
}
