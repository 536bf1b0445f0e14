//! Record types flowing out of extraction and into the event stream.

use roster_core::{JobId, Partition, SourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Unnormalized fields pulled from one result entry by a strategy.
///
/// Every field is optional; strategies fill what they can find and leave
/// cleanup to normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: Option<String>,
    /// Pre-split given name, for sources that publish names in separate columns
    pub first_name: Option<String>,
    /// Pre-split family name
    pub last_name: Option<String>,
    pub firm: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub profile_url: Option<String>,
    pub source_record_id: Option<String>,
    pub year: Option<String>,
}

impl RawRecord {
    /// Shorthand for a record that so far only has a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// A person's name split into parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameParts {
    /// Cleaned display form as published
    pub full: String,
    pub first: Option<String>,
    pub middle: Option<String>,
    pub last: Option<String>,
    /// Generational or professional suffix (Jr., III, Esq.)
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactChannels {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    /// The source's own page for this entry
    pub profile_url: Option<String>,
}

impl ContactChannels {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.email.is_none()
            && self.website.is_none()
            && self.profile_url.is_none()
    }
}

/// Where and when a record was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub job_id: JobId,
    pub source_id: SourceId,
    pub partition: Partition,
    /// Logical page number (1-based) the record came from
    pub page: u32,
    /// Name of the extraction strategy that produced the record
    pub strategy: Option<String>,
    pub collected_at: Timestamp,
}

/// One normalized directory entry, owned by the caller once emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: NameParts,
    pub firm: Option<String>,
    pub location: Option<String>,
    pub contact: ContactChannels,
    pub source_record_id: Option<String>,
    /// Admission, licensure or founding year when the source publishes one
    pub year: Option<i32>,
    pub provenance: Provenance,
}
