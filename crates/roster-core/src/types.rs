//! Shared types used across Roster.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::RosterError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for source identifiers with validation.
///
/// Source IDs must be lowercase alphanumeric with hyphens, 3-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Create a new `SourceId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, RosterError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate source ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), RosterError> {
        static SOURCE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = SOURCE_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 3 || id.len() > 50 {
            return Err(RosterError::Validation(format!(
                "invalid source ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(RosterError::Validation(format!(
                "invalid source ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SourceId {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// Identifier of one crawl job (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// Create a new random `JobId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a partition value scopes a search by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionKind {
    /// A city or locality name
    City,
    /// A state, province or region
    Region,
    /// A postal code
    PostalCode,
    /// Leading letters of a surname
    SurnamePrefix,
    /// A practice area or specialty
    Specialty,
    /// A geographic grid cell (`lat,lng` or a cell label)
    GeoCell,
    /// A free-text query term
    Keyword,
}

impl PartitionKind {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::City => "City",
            Self::Region => "Region",
            Self::PostalCode => "Postal Code",
            Self::SurnamePrefix => "Surname Prefix",
            Self::Specialty => "Specialty",
            Self::GeoCell => "Geo Cell",
            Self::Keyword => "Keyword",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// One atomic unit of search scope handed to a source.
///
/// Partitions are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    kind: PartitionKind,
    value: String,
}

impl Partition {
    /// Create a partition, trimming the value.
    ///
    /// # Errors
    /// Returns error if the value is empty after trimming.
    pub fn new(kind: PartitionKind, value: impl AsRef<str>) -> Result<Self, RosterError> {
        let value = value.as_ref().trim();
        if value.is_empty() {
            return Err(RosterError::Validation(format!(
                "partition value for {kind} cannot be empty"
            )));
        }
        Ok(Self {
            kind,
            value: value.to_string(),
        })
    }

    /// The partition kind.
    #[must_use]
    pub fn kind(&self) -> PartitionKind {
        self.kind
    }

    /// The raw partition value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.display_name(), self.value)
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, RosterError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| RosterError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get seconds since Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
