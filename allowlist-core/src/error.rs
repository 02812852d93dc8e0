//! Error types for allowlist operations

use crate::api::ApiError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AllowlistError>;

/// Remote operation an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Delete,
    Import,
    Lookup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Create => "creating",
            Operation::Read => "getting",
            Operation::Delete => "deleting",
            Operation::Import => "importing",
            Operation::Lookup => "looking up",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Error)]
pub enum AllowlistError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("error {operation} Project IP Allowlist information: {source}")]
    Remote {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    #[error("timed out {operation} Project IP Allowlist after {elapsed:?}{}", last_error_suffix(.last_error))]
    Timeout {
        operation: Operation,
        elapsed: Duration,
        last_error: Option<ApiError>,
    },

    #[error("Invalid entry {name}: {source}")]
    InvalidEntry {
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to load config from {path}: {source}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl AllowlistError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AllowlistError::Validation(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, AllowlistError::Remote { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AllowlistError::Timeout { .. })
    }
}

fn last_error_suffix(last_error: &Option<ApiError>) -> String {
    match last_error {
        Some(err) => format!(" (last error: {})", err),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("cidr_block, ip_address or aws_security_group needs to contain a value")]
    MissingEntry,

    #[error("only one of cidr_block, ip_address or aws_security_group may be set, got: {fields}")]
    ConflictingEntries { fields: String },

    #[error("project_id must not be empty")]
    EmptyProjectId,

    #[error("expected cidr_block to contain a valid CIDR, got: {cidr} with err: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("expected cidr_block to contain a valid network CIDR, expected {expected}, got {cidr}")]
    NonCanonicalCidr { cidr: String, expected: String },

    #[error("expected ip_address to contain a valid IP, got: {address}")]
    InvalidIpAddress { address: String },

    #[error("comment must not be empty when set")]
    EmptyComment,

    #[error("import format error: to import an allowlist entry, use the format {{project_id}}-{{allowlist_entry}}, got: {id}")]
    InvalidImportId { id: String },

    #[error("invalid state id {id}: {reason}")]
    InvalidStateId { id: String, reason: String },
}
