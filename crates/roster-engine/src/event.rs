//! The caller-facing event sequence.

use crate::job::JobSummary;
use crate::record::ResultRecord;
use roster_core::Partition;
use serde::{Deserialize, Serialize};

/// How a partition ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartitionStatus {
    /// Declared total reached or a short page seen
    Exhausted,
    /// No results, or too many empty pages in a row
    Empty,
    /// The job's page cap was reached
    Capped,
    /// A challenge page was served
    Blocked,
    /// Retries ran out or the source flow broke
    Aborted { reason: String },
}

impl PartitionStatus {
    /// Whether the partition stopped for a normal reason.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Empty | Self::Capped)
    }
}

/// One item of the ordered event sequence a job produces.
///
/// The sequence always ends with exactly one of [`ScrapeEvent::JobDone`],
/// [`ScrapeEvent::JobCancelled`] or [`ScrapeEvent::JobAborted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScrapeEvent {
    Record(ResultRecord),

    /// A partition is starting; `current` is 1-based
    PartitionProgress {
        current: usize,
        total: usize,
        partition: Partition,
    },

    Blocked {
        partition: Partition,
        page: u32,
        reason: String,
    },

    PartitionDone {
        partition: Partition,
        status: PartitionStatus,
        pages_fetched: u32,
        records: u64,
    },

    JobDone(JobSummary),

    JobCancelled(JobSummary),

    JobAborted {
        reason: String,
        summary: JobSummary,
    },
}

impl ScrapeEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::JobDone(_) | Self::JobCancelled(_) | Self::JobAborted { .. }
        )
    }

    pub fn as_record(&self) -> Option<&ResultRecord> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn summary(&self) -> Option<&JobSummary> {
        match self {
            Self::JobDone(summary)
            | Self::JobCancelled(summary)
            | Self::JobAborted { summary, .. } => Some(summary),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::{JobId, PartitionKind, SourceId};

    #[test]
    fn test_event_tagging() {
        let event = ScrapeEvent::PartitionDone {
            partition: Partition::new(PartitionKind::City, "Akron").expect("partition"),
            status: PartitionStatus::Aborted {
                reason: "timeout".to_string(),
            },
            pages_fetched: 2,
            records: 40,
        };

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "partition_done");
        assert_eq!(json["status"]["kind"], "aborted");
        assert_eq!(json["status"]["reason"], "timeout");
        assert_eq!(json["partition"]["kind"], "city");
    }

    #[test]
    fn test_terminal_events() {
        let summary = JobSummary::new(
            JobId::generate(),
            SourceId::new("lakeside-bar").expect("valid source ID"),
            1,
        );
        let done = ScrapeEvent::JobDone(summary.clone());
        assert!(done.is_terminal());
        assert_eq!(done.summary(), Some(&summary));

        let json = serde_json::to_value(&done).expect("serialize");
        assert_eq!(json["event"], "job_done");
        assert_eq!(json["partitions_total"], 1);

        let progress = ScrapeEvent::PartitionProgress {
            current: 1,
            total: 1,
            partition: Partition::new(PartitionKind::City, "Akron").expect("partition"),
        };
        assert!(!progress.is_terminal());
        assert!(progress.as_record().is_none());
    }
}
