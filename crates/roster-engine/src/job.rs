use crate::error::{Result, ScrapeError};
use crate::record::ResultRecord;
use roster_core::{JobId, Partition, SourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const MIN_YEAR_FLOOR: i32 = 1800;
const MIN_YEAR_CEILING: i32 = 2100;

/// What to crawl and how far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub source_id: SourceId,
    /// Searched in order
    pub partitions: Vec<Partition>,
    /// Soft limit on pages fetched per partition
    #[serde(default)]
    pub page_cap: Option<u32>,
    /// Drop records whose year is earlier than this
    #[serde(default)]
    pub min_year: Option<i32>,
    /// Override of the consecutive-empty-page tolerance for this job
    #[serde(default)]
    pub max_consecutive_empty: Option<u32>,
}

impl JobConfig {
    pub fn new(source_id: SourceId, partitions: Vec<Partition>) -> Self {
        Self {
            source_id,
            partitions,
            page_cap: None,
            min_year: None,
            max_consecutive_empty: None,
        }
    }

    #[must_use]
    pub fn with_page_cap(mut self, page_cap: u32) -> Self {
        self.page_cap = Some(page_cap);
        self
    }

    #[must_use]
    pub fn with_min_year(mut self, min_year: i32) -> Self {
        self.min_year = Some(min_year);
        self
    }

    #[must_use]
    pub fn with_max_consecutive_empty(mut self, max: u32) -> Self {
        self.max_consecutive_empty = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.partitions.is_empty() {
            return Err(ScrapeError::InvalidJob(
                "at least one partition is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for partition in &self.partitions {
            if !seen.insert(partition) {
                return Err(ScrapeError::InvalidJob(format!(
                    "duplicate partition {partition}"
                )));
            }
        }

        if self.page_cap == Some(0) {
            return Err(ScrapeError::InvalidJob(
                "page_cap must be at least 1".to_string(),
            ));
        }

        if self.max_consecutive_empty == Some(0) {
            return Err(ScrapeError::InvalidJob(
                "max_consecutive_empty must be at least 1".to_string(),
            ));
        }

        if let Some(year) = self.min_year {
            if !(MIN_YEAR_FLOOR..=MIN_YEAR_CEILING).contains(&year) {
                return Err(ScrapeError::InvalidJob(format!(
                    "min_year must be between {MIN_YEAR_FLOOR} and {MIN_YEAR_CEILING}, got {year}"
                )));
            }
        }

        Ok(())
    }
}

/// Post-filter applied after normalization. Never influences pagination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub min_year: Option<i32>,
}

impl RecordFilter {
    pub fn from_job(job: &JobConfig) -> Self {
        Self {
            min_year: job.min_year,
        }
    }

    /// Records without a year always pass.
    pub fn accepts(&self, record: &ResultRecord) -> bool {
        match (self.min_year, record.year) {
            (Some(min), Some(year)) => year >= min,
            _ => true,
        }
    }
}

/// Counters carried by every terminal event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub source_id: SourceId,
    pub partitions_total: usize,
    /// Partitions that ran to a normal stop (exhausted, empty or capped)
    pub partitions_completed: usize,
    pub partitions_blocked: usize,
    pub partitions_aborted: usize,
    pub pages_fetched: u64,
    /// Requests sent, retries and multi-request steps included
    pub requests: u64,
    pub records_emitted: u64,
    /// Records dropped for lacking a name or by the post-filter
    pub records_filtered: u64,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl JobSummary {
    pub fn new(job_id: JobId, source_id: SourceId, partitions_total: usize) -> Self {
        Self {
            job_id,
            source_id,
            partitions_total,
            partitions_completed: 0,
            partitions_blocked: 0,
            partitions_aborted: 0,
            pages_fetched: 0,
            requests: 0,
            records_emitted: 0,
            records_filtered: 0,
            started_at: Timestamp::now(),
            finished_at: None,
        }
    }
}
