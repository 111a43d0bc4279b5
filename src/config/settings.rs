//! Settings management utilities

use crate::{ArbitrageError, Result};
use rust_decimal::Decimal;
use std::env;

/// Environment variable expansion utility
pub struct EnvExpander;

impl EnvExpander {
    /// Expand environment variables in a string
    /// Supports the ${VAR_NAME} pattern
    pub fn expand(input: &str) -> Result<String> {
        let mut result = input.to_string();

        while let Some(start) = result.find("${") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 2..start + end];
                let var_value = env::var(var_name).map_err(|_| {
                    ArbitrageError::Config(format!("Environment variable '{}' not found", var_name))
                })?;

                result.replace_range(start..start + end + 1, &var_value);
            } else {
                return Err(ArbitrageError::Config(
                    "Unclosed environment variable reference".to_string(),
                )
                .into());
            }
        }

        Ok(result)
    }
}

/// Configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate an underlying symbol
    pub fn validate_symbol(symbol: &str) -> Result<()> {
        if symbol.is_empty() {
            return Err(ArbitrageError::Config("Symbol cannot be empty".to_string()).into());
        }

        if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ArbitrageError::Config(
                "Symbol must contain only alphanumeric characters".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Validate a fraction in (0, 1]
    pub fn validate_fraction(value: Decimal, name: &str) -> Result<()> {
        if value <= Decimal::ZERO || value > Decimal::ONE {
            return Err(ArbitrageError::Config(format!("{} must be in (0, 1]", name)).into());
        }
        Ok(())
    }

    /// Validate a positive value
    pub fn validate_positive(value: Decimal, name: &str) -> Result<()> {
        if value <= Decimal::ZERO {
            return Err(ArbitrageError::Config(format!("{} must be positive", name)).into());
        }
        Ok(())
    }

    /// Validate a duration setting against the one-day ceiling
    pub fn validate_max_secs(secs: u64, name: &str) -> Result<()> {
        if secs > ConfigDefaults::MAX_DURATION_SECS {
            return Err(ArbitrageError::Config(format!(
                "{} of {}s exceeds the {}s ceiling",
                name,
                secs,
                ConfigDefaults::MAX_DURATION_SECS
            ))
            .into());
        }
        Ok(())
    }

    /// Validate a value that may be zero but not negative
    pub fn validate_non_negative(value: Decimal, name: &str) -> Result<()> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ArbitrageError::Config(format!("{} cannot be negative", name)).into());
        }
        Ok(())
    }

    /// Validate an HTTP(S) URL
    pub fn validate_url(url: &str, name: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ArbitrageError::Config(format!("{} cannot be empty", name)).into());
        }

        let parsed = url::Url::parse(url)
            .map_err(|_| ArbitrageError::Config(format!("{} must be a valid URL", name)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ArbitrageError::Config(format!("{} must be an http(s) URL", name)).into());
        }

        Ok(())
    }
}

/// Configuration defaults
pub struct ConfigDefaults;

impl ConfigDefaults {
    /// Exchange lot size of the index contract
    pub const LOT_SIZE: u32 = 50;

    /// Default health check interval in seconds
    pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

    /// Default liveness timeout in seconds
    pub const LIVENESS_TIMEOUT_SECS: u64 = 10;

    /// Default reconnection attempts
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// Ceiling for every second-based duration setting (one day)
    pub const MAX_DURATION_SECS: u64 = 86_400;
}
