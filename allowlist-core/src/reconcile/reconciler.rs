//! Create, read, delete and import for project allowlist entries
//!
//! The remote service provisions entries asynchronously, so every call is
//! wrapped in a [`RetryPolicy`] window: transient failures and not yet
//! visible entries are polled, everything else surfaces immediately.

use super::retry::{Attempt, RetryError, RetryPolicy};
use crate::api::{AllowlistApi, ApiError};
use crate::entry::{AllowlistEntry, EntryRequest};
use crate::error::{AllowlistError, Operation, Result};
use crate::state_id::CompositeId;
use std::sync::atomic::AtomicU64;
use std::sync::Mutex;
use tracing::{debug, info};

/// Retry windows for each operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicies {
    pub create: RetryPolicy,
    pub read: RetryPolicy,
    pub delete: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            create: RetryPolicy::create_default(),
            read: RetryPolicy::read_default(),
            delete: RetryPolicy::delete_default(),
        }
    }
}

/// Drives allowlist entries to their desired state against an [`AllowlistApi`]
pub struct AllowlistReconciler<A> {
    pub(crate) api: A,
    policies: RetryPolicies,
    pub(crate) lookup_counter: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeletePhase {
    /// Issue the delete call
    Delete,
    /// Delete accepted; confirm the entry is gone
    Verify,
    /// Entry was still visible after a delete; issue it again
    Redelete,
}

impl<A: AllowlistApi> AllowlistReconciler<A> {
    pub fn new(api: A) -> Self {
        Self::with_policies(api, RetryPolicies::default())
    }

    pub fn with_policies(api: A, policies: RetryPolicies) -> Self {
        Self {
            api,
            policies,
            lookup_counter: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn policies(&self) -> &RetryPolicies {
        &self.policies
    }

    /// Validate loose declaration fields, then create and wait for convergence
    ///
    /// Validation failures return before any remote call is made.
    pub async fn create_from_fields(
        &self,
        project_id: &str,
        cidr_block: Option<&str>,
        ip_address: Option<&str>,
        aws_security_group: Option<&str>,
        comment: Option<&str>,
    ) -> Result<CompositeId> {
        let request = EntryRequest::from_fields(
            project_id,
            cidr_block,
            ip_address,
            aws_security_group,
            comment,
        )?;
        self.create(&request).await
    }

    /// Create an entry and poll until the service reports it
    ///
    /// The entry has converged once the create response echoes it back, or
    /// comes back empty. A response listing only other entries means this one
    /// is not visible yet.
    pub async fn create(&self, request: &EntryRequest) -> Result<CompositeId> {
        let project_id = request.project_id.as_str();
        let entry = request.entry_key();
        let specs = std::slice::from_ref(&request.spec);

        info!(project_id, entry = %entry, "Creating allowlist entry");

        self.policies
            .create
            .execute(|| async move {
                match self.api.create(project_id, specs).await {
                    Ok(entries) => {
                        if entries.is_empty() || entries.iter().any(|e| request.spec.matches(e)) {
                            Attempt::Done(())
                        } else {
                            debug!(
                                project_id,
                                returned = entries.len(),
                                "Created entry not visible yet"
                            );
                            Attempt::Pending(None)
                        }
                    }
                    Err(err) if err.is_transient() => Attempt::Pending(Some(err)),
                    Err(err) => Attempt::Failed(err),
                }
            })
            .await
            .map_err(|e| into_allowlist_error(Operation::Create, e))?;

        info!(project_id, entry = %entry, "Allowlist entry created");
        Ok(CompositeId::new(project_id, entry))
    }

    /// Fetch the current remote state of an entry
    ///
    /// Returns `Ok(None)` when the service no longer knows the entry; the
    /// caller should drop its local tracking.
    pub async fn read(&self, id: &CompositeId) -> Result<Option<AllowlistEntry>> {
        let found = self
            .policies
            .read
            .execute(|| async move {
                match self.api.get(&id.project_id, &id.entry).await {
                    Ok(entry) => Attempt::Done(Some(entry)),
                    Err(err) if err.is_not_found() => Attempt::Done(None),
                    Err(err) if err.is_server_error() => Attempt::Pending(Some(err)),
                    Err(err) => Attempt::Failed(err),
                }
            })
            .await
            .map_err(|e| into_allowlist_error(Operation::Read, e))?;

        match found {
            Some(mut entry) => {
                entry.project_id.get_or_insert_with(|| id.project_id.clone());
                Ok(Some(entry))
            }
            None => {
                info!(
                    project_id = %id.project_id,
                    entry = %id.entry,
                    "Allowlist entry no longer exists remotely"
                );
                Ok(None)
            }
        }
    }

    /// Decode a persisted state id and read the entry it names
    pub async fn read_state(&self, state_id: &str) -> Result<Option<AllowlistEntry>> {
        let id = CompositeId::decode(state_id)?;
        self.read(&id).await
    }

    /// Delete an entry and keep verifying until the service stops reporting it
    ///
    /// An entry still visible after a successful delete is deleted again,
    /// and verified again, until it is gone or the window closes.
    pub async fn delete(&self, id: &CompositeId) -> Result<()> {
        let phase = Mutex::new(DeletePhase::Delete);
        let phase = &phase;

        info!(project_id = %id.project_id, entry = %id.entry, "Deleting allowlist entry");

        self.policies
            .delete
            .execute(|| async move { self.delete_step(id, phase).await })
            .await
            .map_err(|e| into_allowlist_error(Operation::Delete, e))?;

        info!(project_id = %id.project_id, entry = %id.entry, "Allowlist entry deleted");
        Ok(())
    }

    pub async fn delete_state(&self, state_id: &str) -> Result<()> {
        let id = CompositeId::decode(state_id)?;
        self.delete(&id).await
    }

    async fn delete_step(
        &self,
        id: &CompositeId,
        phase: &Mutex<DeletePhase>,
    ) -> Attempt<(), ApiError> {
        let current = get_phase(phase);

        if current != DeletePhase::Verify {
            match self.issue_delete(id, current).await {
                Attempt::Done(()) => set_phase(phase, DeletePhase::Verify),
                other => return other,
            }
        }

        match self.api.get(&id.project_id, &id.entry).await {
            Err(err) if err.is_not_found() => Attempt::Done(()),
            Err(err) => {
                // Unconfirmed: the next attempt deletes again before verifying
                debug!(
                    project_id = %id.project_id,
                    entry = %id.entry,
                    error = %err,
                    "Delete verification failed, retrying delete"
                );
                set_phase(phase, DeletePhase::Redelete);
                Attempt::Pending(Some(err))
            }
            Ok(_) => {
                debug!(
                    project_id = %id.project_id,
                    entry = %id.entry,
                    "Entry still visible after delete, deleting again"
                );
                match self.issue_delete(id, DeletePhase::Redelete).await {
                    Attempt::Done(()) => Attempt::Pending(None),
                    Attempt::Pending(err) => {
                        set_phase(phase, DeletePhase::Redelete);
                        Attempt::Pending(err)
                    }
                    Attempt::Failed(err) => Attempt::Failed(err),
                }
            }
        }
    }

    /// One delete call. `Done` means the delete was accepted (or, on a
    /// repeat delete, that the entry had already disappeared).
    async fn issue_delete(&self, id: &CompositeId, phase: DeletePhase) -> Attempt<(), ApiError> {
        match self.api.delete(&id.project_id, &id.entry).await {
            Ok(()) => Attempt::Done(()),
            Err(err) if err.is_transient() => Attempt::Pending(Some(err)),
            Err(err) if phase == DeletePhase::Redelete && err.is_not_found() => Attempt::Done(()),
            Err(err) => Attempt::Failed(err),
        }
    }

    /// Adopt an existing entry from a `{project_id}-{entry}` import id
    ///
    /// Only confirms the entry exists; a following read fills in its fields.
    pub async fn import(&self, raw_id: &str) -> Result<CompositeId> {
        let id = CompositeId::from_import_id(raw_id)?;

        self.api
            .get(&id.project_id, &id.entry)
            .await
            .map_err(|source| AllowlistError::Remote {
                operation: Operation::Import,
                source,
            })?;

        info!(project_id = %id.project_id, entry = %id.entry, "Imported allowlist entry");
        Ok(id)
    }
}

fn get_phase(phase: &Mutex<DeletePhase>) -> DeletePhase {
    match phase.lock() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn set_phase(phase: &Mutex<DeletePhase>, next: DeletePhase) {
    match phase.lock() {
        Ok(mut guard) => *guard = next,
        Err(poisoned) => *poisoned.into_inner() = next,
    }
}

fn into_allowlist_error(operation: Operation, err: RetryError<ApiError>) -> AllowlistError {
    match err {
        RetryError::Failed(source) => AllowlistError::Remote { operation, source },
        RetryError::TimedOut {
            elapsed,
            last_error,
        } => AllowlistError::Timeout {
            operation,
            elapsed,
            last_error,
        },
    }
}
