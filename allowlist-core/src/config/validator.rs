//! Configuration validation

use super::schema::{Config, RetryConfigs};
use crate::error::{AllowlistError, Result};
use crate::reconcile::RetryPolicy;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate entire configuration
    pub fn validate(config: &Config) -> Result<()> {
        Self::validate_api(config)?;
        Self::validate_retry(&config.retry)?;
        Self::validate_entries(config)?;
        Ok(())
    }

    fn validate_api(config: &Config) -> Result<()> {
        let url = Url::parse(&config.api.base_url).map_err(|e| {
            AllowlistError::Config(format!("Invalid base URL {}: {}", config.api.base_url, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(AllowlistError::Config(format!(
                "Base URL {} cannot be used as a base",
                config.api.base_url
            )));
        }
        if config.api.request_timeout_secs == 0 {
            return Err(AllowlistError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_retry(retry: &RetryConfigs) -> Result<()> {
        let policies = retry.policies();
        for (name, policy) in [
            ("create", &policies.create),
            ("read", &policies.read),
            ("delete", &policies.delete),
        ] {
            Self::validate_policy(name, policy)?;
        }
        Ok(())
    }

    fn validate_policy(name: &str, policy: &RetryPolicy) -> Result<()> {
        if policy.timeout.is_zero() {
            return Err(AllowlistError::Config(format!(
                "retry.{}: timeout must be greater than zero",
                name
            )));
        }
        if policy.min_interval.is_zero() {
            return Err(AllowlistError::Config(format!(
                "retry.{}: min_interval must be greater than zero",
                name
            )));
        }
        if policy.min_interval > policy.max_interval {
            return Err(AllowlistError::Config(format!(
                "retry.{}: min_interval ({:?}) exceeds max_interval ({:?})",
                name, policy.min_interval, policy.max_interval
            )));
        }
        if !(policy.backoff_multiplier >= 1.0) {
            return Err(AllowlistError::Config(format!(
                "retry.{}: backoff_multiplier must be at least 1.0, got {}",
                name, policy.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Every declared entry must form a valid request
    fn validate_entries(config: &Config) -> Result<()> {
        for (name, entry) in &config.entries {
            entry
                .to_request()
                .map_err(|source| AllowlistError::InvalidEntry {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}
