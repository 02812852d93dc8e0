//! Allowlist entry model and field validation

use crate::error::ValidationError;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// The single address form an allowlist entry grants access to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Network range in canonical form (no host bits set)
    CidrBlock(IpNet),
    IpAddress(IpAddr),
    /// Security group id; requires VPC peering on the project, which only the server checks
    AwsSecurityGroup(String),
}

impl EntryKind {
    /// Parse a CIDR block, rejecting anything that is not already the canonical network form
    pub fn cidr_block(cidr: &str) -> Result<Self, ValidationError> {
        let net: IpNet = cidr.parse().map_err(|e: ipnet::AddrParseError| {
            ValidationError::InvalidCidr {
                cidr: cidr.to_string(),
                reason: e.to_string(),
            }
        })?;

        let canonical = net.trunc();
        if canonical.to_string() != cidr {
            return Err(ValidationError::NonCanonicalCidr {
                cidr: cidr.to_string(),
                expected: canonical.to_string(),
            });
        }

        Ok(EntryKind::CidrBlock(canonical))
    }

    pub fn ip_address(address: &str) -> Result<Self, ValidationError> {
        address
            .parse::<IpAddr>()
            .map(EntryKind::IpAddress)
            .map_err(|_| ValidationError::InvalidIpAddress {
                address: address.to_string(),
            })
    }

    pub fn aws_security_group(group: &str) -> Self {
        EntryKind::AwsSecurityGroup(group.to_string())
    }

    /// Name of the field this kind populates
    pub fn field_name(&self) -> &'static str {
        match self {
            EntryKind::CidrBlock(_) => "cidr_block",
            EntryKind::IpAddress(_) => "ip_address",
            EntryKind::AwsSecurityGroup(_) => "aws_security_group",
        }
    }

    /// The raw value the remote API addresses this entry by
    pub fn key(&self) -> String {
        match self {
            EntryKind::CidrBlock(net) => net.to_string(),
            EntryKind::IpAddress(ip) => ip.to_string(),
            EntryKind::AwsSecurityGroup(group) => group.clone(),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field_name(), self.key())
    }
}

/// Entry payload sent to the remote API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    pub kind: EntryKind,
    pub comment: Option<String>,
}

impl EntrySpec {
    /// Whether an entry echoed by the server corresponds to this request
    ///
    /// IP requests also match on the equivalent host CIDR, since the server
    /// reports single addresses in both fields.
    pub fn matches(&self, echoed: &AllowlistEntry) -> bool {
        match &self.kind {
            EntryKind::CidrBlock(net) => parse_net(echoed.cidr_block.as_deref()) == Some(*net),
            EntryKind::IpAddress(ip) => {
                let ip_match = echoed
                    .ip_address
                    .as_deref()
                    .and_then(|s| s.parse::<IpAddr>().ok())
                    == Some(*ip);
                let host_net = IpNet::new(*ip, host_prefix(ip)).ok();
                ip_match || (host_net.is_some() && parse_net(echoed.cidr_block.as_deref()) == host_net)
            }
            EntryKind::AwsSecurityGroup(group) => {
                echoed.aws_security_group.as_deref() == Some(group.as_str())
            }
        }
    }
}

fn parse_net(value: Option<&str>) -> Option<IpNet> {
    value.and_then(|s| s.parse::<IpNet>().ok()).map(|net| net.trunc())
}

fn host_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Desired state for one allowlist entry in a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub project_id: String,
    pub spec: EntrySpec,
}

impl EntryRequest {
    pub fn new(
        project_id: impl Into<String>,
        kind: EntryKind,
        comment: Option<String>,
    ) -> Result<Self, ValidationError> {
        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(ValidationError::EmptyProjectId);
        }
        if comment.as_deref() == Some("") {
            return Err(ValidationError::EmptyComment);
        }

        Ok(Self {
            project_id,
            spec: EntrySpec { kind, comment },
        })
    }

    /// Build a request from the loose optional fields of a declaration
    ///
    /// Empty strings count as unset. Exactly one of the three address fields
    /// must carry a value.
    pub fn from_fields(
        project_id: &str,
        cidr_block: Option<&str>,
        ip_address: Option<&str>,
        aws_security_group: Option<&str>,
        comment: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let kind = kind_from_fields(cidr_block, ip_address, aws_security_group)?;
        Self::new(project_id, kind, comment.map(str::to_string))
    }

    pub fn kind(&self) -> &EntryKind {
        &self.spec.kind
    }

    /// The raw discriminant value used as the remote entry key
    pub fn entry_key(&self) -> String {
        self.spec.kind.key()
    }
}

/// Resolve the one populated address field into an [`EntryKind`]
pub fn kind_from_fields(
    cidr_block: Option<&str>,
    ip_address: Option<&str>,
    aws_security_group: Option<&str>,
) -> Result<EntryKind, ValidationError> {
    let present: Vec<(&str, &str)> = [
        ("cidr_block", cidr_block),
        ("ip_address", ip_address),
        ("aws_security_group", aws_security_group),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.filter(|v| !v.is_empty()).map(|v| (name, v)))
    .collect();

    match present.as_slice() {
        [] => Err(ValidationError::MissingEntry),
        [("cidr_block", value)] => EntryKind::cidr_block(value),
        [("ip_address", value)] => EntryKind::ip_address(value),
        [(_, value)] => Ok(EntryKind::aws_security_group(value)),
        many => Err(ValidationError::ConflictingEntries {
            fields: many
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Allowlist entry as reported by the remote service
///
/// The server echoes every field, so an entry created from a CIDR block may
/// come back with an IP address as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub project_id: Option<String>,
    pub cidr_block: Option<String>,
    pub ip_address: Option<String>,
    pub aws_security_group: Option<String>,
    pub comment: Option<String>,
}
