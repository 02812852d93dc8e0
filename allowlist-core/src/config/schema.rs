//! Configuration schema types

use crate::entry::EntryRequest;
use crate::error::ValidationError;
use crate::reconcile::{RetryPolicies, RetryPolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfigs,
    /// Declared entries, applied in file order
    #[serde(default)]
    pub entries: IndexMap<String, EntryConfig>,
}

/// Remote API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token for service account authentication
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "https://cloud.mongodb.com/api/atlas/v1.0/".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("atlas-allowlist/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Per-operation overrides of the built-in retry windows
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfigs {
    #[serde(default)]
    pub create: RetryConfig,
    #[serde(default)]
    pub read: RetryConfig,
    #[serde(default)]
    pub delete: RetryConfig,
}

impl RetryConfigs {
    pub fn policies(&self) -> RetryPolicies {
        RetryPolicies {
            create: self.create.apply(RetryPolicy::create_default()),
            read: self.read.apply(RetryPolicy::read_default()),
            delete: self.delete.apply(RetryPolicy::delete_default()),
        }
    }
}

/// Retry window settings; unset fields keep the operation's default
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    pub timeout_secs: Option<u64>,
    pub delay_secs: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
}

impl RetryConfig {
    pub fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(base.timeout),
            delay: self.delay_secs.map(Duration::from_secs).unwrap_or(base.delay),
            min_interval: self
                .min_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(base.min_interval),
            max_interval: self
                .max_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(base.max_interval),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(base.backoff_multiplier),
        }
    }
}

/// An allowlist entry declared in the config file
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl EntryConfig {
    pub fn to_request(&self) -> Result<EntryRequest, ValidationError> {
        EntryRequest::from_fields(
            &self.project_id,
            self.cidr_block.as_deref(),
            self.ip_address.as_deref(),
            self.aws_security_group.as_deref(),
            self.comment.as_deref(),
        )
    }
}
