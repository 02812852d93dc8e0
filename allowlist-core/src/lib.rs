//! Project IP allowlist reconciliation against the Atlas access list API
//!
//! Turns declared allowlist entries (CIDR block, IP address or AWS security
//! group) into remote create/read/delete calls, polls through the service's
//! eventual consistency, and tracks entries by a reversible composite id.

pub mod api;
pub mod config;
pub mod data_source;
pub mod entry;
pub mod error;
pub mod reconcile;
pub mod state_id;

// Re-export commonly used types
pub use api::{AllowlistApi, ApiError, AtlasClient};
pub use config::{Config, ConfigLoader};
pub use data_source::DataSourceEntry;
pub use entry::{AllowlistEntry, EntryKind, EntryRequest, EntrySpec};
pub use error::{AllowlistError, Operation, Result, ValidationError};
pub use reconcile::{AllowlistReconciler, RetryPolicies, RetryPolicy};
pub use state_id::CompositeId;
