//! Common test utilities for reconciler integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use allowlist_core::{AllowlistApi, AllowlistEntry, AllowlistReconciler, ApiError, EntrySpec};
use async_trait::async_trait;

/// A remote call recorded by [`FakeApi`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        project_id: String,
        entries: Vec<EntrySpec>,
    },
    Get {
        project_id: String,
        entry: String,
    },
    Delete {
        project_id: String,
        entry: String,
    },
}

/// Queue of scripted responses; the last one repeats once the rest are used up
struct Script<T> {
    responses: Mutex<VecDeque<Result<T, ApiError>>>,
    fallback: Result<T, ApiError>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: Result<T, ApiError>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    fn push(&self, response: Result<T, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn next(&self) -> Result<T, ApiError> {
        let mut responses = self.responses.lock().unwrap();
        match responses.len() {
            0 => self.fallback.clone(),
            1 => responses[0].clone(),
            _ => responses.pop_front().unwrap(),
        }
    }
}

/// Scripted in-memory stand-in for the remote allowlist API
pub struct FakeApi {
    create: Script<Vec<AllowlistEntry>>,
    get: Script<AllowlistEntry>,
    delete: Script<()>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    /// Unscripted calls: create returns an empty list, get reports 404, delete succeeds
    pub fn new() -> Self {
        Self {
            create: Script::new(Ok(Vec::new())),
            get: Script::new(Err(not_found())),
            delete: Script::new(Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_create(&self, response: Result<Vec<AllowlistEntry>, ApiError>) -> &Self {
        self.create.push(response);
        self
    }

    pub fn push_get(&self, response: Result<AllowlistEntry, ApiError>) -> &Self {
        self.get.push(response);
        self
    }

    pub fn push_delete(&self, response: Result<(), ApiError>) -> &Self {
        self.delete.push(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded call sequence as `"create"`, `"get"`, `"delete"`
    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| match c {
                Call::Create { .. } => "create",
                Call::Get { .. } => "get",
                Call::Delete { .. } => "delete",
            })
            .collect()
    }

    pub fn create_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Create { .. }))
    }

    pub fn get_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Get { .. }))
    }

    pub fn delete_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AllowlistApi for FakeApi {
    async fn create(
        &self,
        project_id: &str,
        entries: &[EntrySpec],
    ) -> Result<Vec<AllowlistEntry>, ApiError> {
        self.record(Call::Create {
            project_id: project_id.to_string(),
            entries: entries.to_vec(),
        });
        self.create.next()
    }

    async fn get(&self, project_id: &str, entry_key: &str) -> Result<AllowlistEntry, ApiError> {
        self.record(Call::Get {
            project_id: project_id.to_string(),
            entry: entry_key.to_string(),
        });
        self.get.next()
    }

    async fn delete(&self, project_id: &str, entry_key: &str) -> Result<(), ApiError> {
        self.record(Call::Delete {
            project_id: project_id.to_string(),
            entry: entry_key.to_string(),
        });
        self.delete.next()
    }
}

pub fn reconciler() -> AllowlistReconciler<FakeApi> {
    AllowlistReconciler::new(FakeApi::new())
}

pub fn not_found() -> ApiError {
    ApiError::status(
        404,
        Some("ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND".to_string()),
        "GET groups/proj1/accessList/x: 404 (request \"ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND\") not found",
    )
}

pub fn server_error() -> ApiError {
    ApiError::status(
        500,
        Some("UNEXPECTED_ERROR".to_string()),
        "POST groups/proj1/accessList: 500 (request \"UNEXPECTED_ERROR\") Unexpected error.",
    )
}

pub fn unexpected_error() -> ApiError {
    ApiError::status(
        400,
        Some("UNEXPECTED_ERROR".to_string()),
        "POST groups/proj1/accessList: 400 (request \"UNEXPECTED_ERROR\") Unexpected error.",
    )
}

pub fn unauthorized() -> ApiError {
    ApiError::status(
        401,
        Some("USER_UNAUTHORIZED".to_string()),
        "GET groups/proj1/accessList/x: 401 (request \"USER_UNAUTHORIZED\") Unauthorized.",
    )
}

pub fn cidr_entry(cidr: &str) -> AllowlistEntry {
    AllowlistEntry {
        cidr_block: Some(cidr.to_string()),
        ..Default::default()
    }
}
