//! Composite state id for tracking an allowlist entry locally
//!
//! The persisted id packs `{project_id, entry}` as sorted
//! `base64(key):base64(value)` pairs joined with `-`. The base64 alphabet
//! contains neither separator, so decoding is exact for arbitrary values.

use crate::error::ValidationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const PROJECT_ID_KEY: &str = "project_id";
const ENTRY_KEY: &str = "entry";
const PAIR_SEPARATOR: char = '-';
const KEY_VALUE_SEPARATOR: char = ':';
const IMPORT_SEPARATOR: char = '-';

/// Identifier pairing a project with one of its allowlist entries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeId {
    pub project_id: String,
    /// Raw entry key: CIDR block, IP address or security group id
    pub entry: String,
}

impl CompositeId {
    pub fn new(project_id: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            entry: entry.into(),
        }
    }

    pub fn encode(&self) -> String {
        let mut values = BTreeMap::new();
        values.insert(PROJECT_ID_KEY, self.project_id.as_str());
        values.insert(ENTRY_KEY, self.entry.as_str());

        values
            .into_iter()
            .map(|(key, value)| {
                format!(
                    "{}{}{}",
                    STANDARD.encode(key),
                    KEY_VALUE_SEPARATOR,
                    STANDARD.encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join(&PAIR_SEPARATOR.to_string())
    }

    pub fn decode(id: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidStateId {
            id: id.to_string(),
            reason,
        };

        let mut values = BTreeMap::new();
        for pair in id.split(PAIR_SEPARATOR) {
            let (key, value) = pair
                .split_once(KEY_VALUE_SEPARATOR)
                .ok_or_else(|| invalid(format!("segment {:?} is not a key:value pair", pair)))?;
            let key = decode_part(key).map_err(&invalid)?;
            let value = decode_part(value).map_err(&invalid)?;
            values.insert(key, value);
        }

        let project_id = values
            .remove(PROJECT_ID_KEY)
            .ok_or_else(|| invalid("missing project_id".to_string()))?;
        let entry = values
            .remove(ENTRY_KEY)
            .ok_or_else(|| invalid("missing entry".to_string()))?;

        Ok(Self { project_id, entry })
    }

    /// Parse a user supplied import id of the form `{project_id}-{entry}`
    ///
    /// Splits on the first `-` only, so entries may themselves contain dashes
    /// (security group ids do).
    pub fn from_import_id(raw: &str) -> Result<Self, ValidationError> {
        match raw.split_once(IMPORT_SEPARATOR) {
            Some((project_id, entry)) if !project_id.is_empty() && !entry.is_empty() => {
                Ok(Self::new(project_id, entry))
            }
            _ => Err(ValidationError::InvalidImportId {
                id: raw.to_string(),
            }),
        }
    }
}

fn decode_part(part: &str) -> Result<String, String> {
    let bytes = STANDARD
        .decode(part)
        .map_err(|e| format!("invalid base64 {:?}: {}", part, e))?;
    String::from_utf8(bytes).map_err(|e| format!("invalid utf-8 in {:?}: {}", part, e))
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CompositeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let id = CompositeId::new("p1", "e1");
        assert_eq!(CompositeId::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn test_round_trip_with_separators_in_values() {
        for (project, entry) in [
            ("5f4d-aa:01", "sg-0a1b2c3d"),
            ("proj1", "2001:db8::/32"),
            ("", ""),
            ("p", "ünïcode-entry"),
        ] {
            let id = CompositeId::new(project, entry);
            assert_eq!(id.encode().parse::<CompositeId>().unwrap(), id);
        }
    }

    #[test]
    fn test_known_encoding() {
        let id = CompositeId::new("proj1", "192.0.2.0/24");
        assert_eq!(
            id.encode(),
            "ZW50cnk=:MTkyLjAuMi4wLzI0-cHJvamVjdF9pZA==:cHJvajE="
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            CompositeId::decode("not-a-state-id"),
            Err(ValidationError::InvalidStateId { .. })
        ));
        assert!(matches!(
            CompositeId::decode("ZW50cnk=:MTkyLjAuMi4wLzI0"),
            Err(ValidationError::InvalidStateId { .. })
        ));
        assert!(matches!(
            CompositeId::decode("ZW50cnk=:!!!"),
            Err(ValidationError::InvalidStateId { .. })
        ));
    }

    #[test]
    fn test_import_id_split() {
        let id = CompositeId::from_import_id("p1-1.2.3.0/24").unwrap();
        assert_eq!(id.project_id, "p1");
        assert_eq!(id.entry, "1.2.3.0/24");

        let id = CompositeId::from_import_id("p1-sg-12345").unwrap();
        assert_eq!(id.entry, "sg-12345");
    }

    #[test]
    fn test_import_id_requires_separator() {
        assert_eq!(
            CompositeId::from_import_id("p1").unwrap_err(),
            ValidationError::InvalidImportId {
                id: "p1".to_string()
            }
        );
        assert!(CompositeId::from_import_id("-1.2.3.4").is_err());
        assert!(CompositeId::from_import_id("p1-").is_err());
    }
}
