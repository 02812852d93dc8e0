//! Reconciliation of desired allowlist state with the remote service

pub mod reconciler;
pub mod retry;

pub use reconciler::{AllowlistReconciler, RetryPolicies};
pub use retry::{Attempt, RetryError, RetryPolicy};
