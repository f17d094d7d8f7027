//! Configuration for price_engine_rust

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use goldwatch_core::clients::{icbc, mock, sge};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Redis
    pub redis_url: String,
    pub store_key_prefix: String,
    pub request_channel: String,
    pub response_channel: String,
    pub badge_channel: String,

    // Market
    pub market_timezone: Tz,

    // Polling
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,

    // Sources
    pub sge_home_url: String,
    pub sge_quotations_url: String,
    pub icbc_quote_url: String,
    pub mock_base_price: f64,
    pub mock_noise: f64,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let poll_interval_ms = parse_u64("POLL_INTERVAL_MS", 1000)?;
        let fetch_timeout_secs = parse_u64("FETCH_TIMEOUT_SECS", 8)?;
        let mock_base_price = parse_f64("MOCK_BASE_PRICE", mock::DEFAULT_BASE_PRICE)?;
        let mock_noise = parse_f64("MOCK_NOISE", mock::DEFAULT_NOISE)?;

        let tz_name = env::var("MARKET_TIMEZONE").unwrap_or_else(|_| "Asia/Shanghai".to_string());
        let market_timezone = Tz::from_str(&tz_name).map_err(|_| {
            anyhow!(
                "Invalid MARKET_TIMEZONE: {} (expected IANA tz like Asia/Shanghai)",
                tz_name
            )
        })?;

        let config = Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            store_key_prefix: env::var("STORE_KEY_PREFIX")
                .unwrap_or_else(|_| "goldwatch:".to_string()),
            request_channel: env::var("REQUEST_CHANNEL")
                .unwrap_or_else(|_| "goldwatch:requests".to_string()),
            response_channel: env::var("RESPONSE_CHANNEL")
                .unwrap_or_else(|_| "goldwatch:responses".to_string()),
            badge_channel: env::var("BADGE_CHANNEL")
                .unwrap_or_else(|_| "goldwatch:badge".to_string()),

            market_timezone,

            poll_interval: Duration::from_millis(poll_interval_ms),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),

            sge_home_url: env::var("SGE_HOME_URL").unwrap_or_else(|_| sge::HOME_URL.to_string()),
            sge_quotations_url: env::var("SGE_QUOTATIONS_URL")
                .unwrap_or_else(|_| sge::QUOTATIONS_URL.to_string()),
            icbc_quote_url: env::var("ICBC_QUOTE_URL")
                .unwrap_or_else(|_| icbc::QUOTE_URL.to_string()),
            mock_base_price,
            mock_noise,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("POLL_INTERVAL_MS must be > 0"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(anyhow!("FETCH_TIMEOUT_SECS must be > 0"));
        }
        if self.mock_base_price <= 0.0 {
            return Err(anyhow!("MOCK_BASE_PRICE must be > 0"));
        }
        if self.mock_noise < 0.0 || self.mock_noise >= self.mock_base_price {
            return Err(anyhow!("MOCK_NOISE must be >= 0 and below MOCK_BASE_PRICE"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            store_key_prefix: "goldwatch:".to_string(),
            request_channel: "goldwatch:requests".to_string(),
            response_channel: "goldwatch:responses".to_string(),
            badge_channel: "goldwatch:badge".to_string(),
            market_timezone: chrono_tz::Asia::Shanghai,
            poll_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(8),
            sge_home_url: sge::HOME_URL.to_string(),
            sge_quotations_url: sge::QUOTATIONS_URL.to_string(),
            icbc_quote_url: icbc::QUOTE_URL.to_string(),
            mock_base_price: mock::DEFAULT_BASE_PRICE,
            mock_noise: mock::DEFAULT_NOISE,
        }
    }
}

/// Parse environment variable as f64 with default fallback
fn parse_f64(var_name: &str, default: f64) -> Result<f64> {
    match env::var(var_name) {
        Ok(val) => val.parse().map_err(|_| anyhow!("{} must be a valid f64", var_name)),
        Err(_) => Ok(default),
    }
}

/// Parse environment variable as u64 with default fallback
fn parse_u64(var_name: &str, default: u64) -> Result<u64> {
    match env::var(var_name) {
        Ok(val) => val.parse().map_err(|_| anyhow!("{} must be a valid u64", var_name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment-driven parsing is left to integration runs; these cover the
    // defaults and validation rules.

    #[test]
    fn test_parse_f64_with_default() {
        assert_eq!(parse_f64("NON_EXISTENT_VAR_GOLD_XYZ", 42.5).unwrap(), 42.5);
    }

    #[test]
    fn test_parse_u64_with_default() {
        assert_eq!(parse_u64("NON_EXISTENT_VAR_GOLD_ABC", 100).unwrap(), 100);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_validation_rejects_bad_mock_settings() {
        let mut config = EngineConfig::default();
        config.mock_noise = config.mock_base_price;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
