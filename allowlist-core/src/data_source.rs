//! Read-only lookup of a single allowlist entry

use crate::api::AllowlistApi;
use crate::entry::{kind_from_fields, AllowlistEntry};
use crate::error::{AllowlistError, Operation, Result, ValidationError};
use crate::reconcile::AllowlistReconciler;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::Ordering;
use tracing::debug;

/// Entry found by [`AllowlistReconciler::lookup`]
///
/// A lookup has no remote identity, so each result gets a fresh local id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceEntry {
    pub id: String,
    #[serde(flatten)]
    pub entry: AllowlistEntry,
}

impl<A: AllowlistApi> AllowlistReconciler<A> {
    /// Look up one entry by whichever address field is given
    ///
    /// Unlike [`AllowlistReconciler::read`], this makes a single call and
    /// treats every error, including not found, as a failure.
    pub async fn lookup(
        &self,
        project_id: &str,
        cidr_block: Option<&str>,
        ip_address: Option<&str>,
        aws_security_group: Option<&str>,
    ) -> Result<DataSourceEntry> {
        if project_id.is_empty() {
            return Err(ValidationError::EmptyProjectId.into());
        }
        let kind = kind_from_fields(cidr_block, ip_address, aws_security_group)?;
        let key = kind.key();

        debug!(project_id, entry = %key, "Looking up allowlist entry");

        let mut entry = self
            .api
            .get(project_id, &key)
            .await
            .map_err(|source| AllowlistError::Remote {
                operation: Operation::Lookup,
                source,
            })?;
        entry.project_id.get_or_insert_with(|| project_id.to_string());

        Ok(DataSourceEntry {
            id: self.unique_id(),
            entry,
        })
    }

    fn unique_id(&self) -> String {
        let counter = self.lookup_counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "allowlist-{}{:08x}",
            Utc::now().format("%Y%m%d%H%M%S%f"),
            counter
        )
    }
}
