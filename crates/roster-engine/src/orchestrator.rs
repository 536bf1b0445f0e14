//! Job orchestrator that turns a source driver and a job configuration into a
//! lazy, ordered stream of [`ScrapeEvent`]s.
//!
//! The orchestrator owns the page loop. Each pull of the stream advances the
//! job by at most one transition (start a partition, attempt a page, finish),
//! so nothing is fetched until the consumer asks for the next event and
//! dropping the stream stops the job.

use crate::adapter::{DriveSession, PageExtraction, SourceDriver, StepError};
use crate::block::BlockDetector;
use crate::cursor::{CursorDecision, PaginationCursor};
use crate::error::{Result, ScrapeError};
use crate::event::{PartitionStatus, ScrapeEvent};
use crate::job::{JobConfig, JobSummary, RecordFilter};
use crate::normalize::normalize_record;
use crate::rate::{BlockSignal, RateController, RatePolicy};
use crate::record::Provenance;
use futures::stream::{self, BoxStream, StreamExt};
use roster_core::{AppConfig, JobId, Partition, Timestamp};
use roster_http::{Fetcher, IdentityPool};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive empty pages tolerated after a non-empty first page.
pub const DEFAULT_MAX_CONSECUTIVE_EMPTY: u32 = 2;

/// Starts jobs. Each job gets its own rate state, so independent jobs may run
/// concurrently without sharing pacing.
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    policy: RatePolicy,
    identities: IdentityPool,
    default_max_empty: u32,
}

impl Orchestrator {
    /// Create an orchestrator with a single generic client identity.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, policy: RatePolicy) -> Self {
        Self {
            fetcher,
            policy,
            identities: IdentityPool::new(Vec::new()),
            default_max_empty: DEFAULT_MAX_CONSECUTIVE_EMPTY,
        }
    }

    /// Create an orchestrator from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            policy: RatePolicy::from(&config.crawl),
            identities: IdentityPool::from_config(&config.http),
            default_max_empty: config.crawl.max_consecutive_empty.max(1),
        }
    }

    /// Set the client identities rotated between requests.
    #[must_use]
    pub fn with_identities(mut self, identities: IdentityPool) -> Self {
        self.identities = identities;
        self
    }

    /// Set the empty-page tolerance used when neither the source nor the job
    /// overrides it.
    #[must_use]
    pub fn with_max_consecutive_empty(mut self, max: u32) -> Self {
        self.default_max_empty = max.max(1);
        self
    }

    /// Pacing limits given to every job.
    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    /// Start a job.
    ///
    /// The job is validated before anything is sent. An invalid job yields a
    /// stream holding a single [`ScrapeEvent::JobAborted`]. Otherwise the
    /// stream ends with exactly one terminal event. Cancelling `cancel` is
    /// honoured before each partition, before each page attempt and while
    /// waiting for a request slot, never during a request.
    pub fn start(
        &self,
        driver: SourceDriver,
        job: JobConfig,
        cancel: CancellationToken,
    ) -> BoxStream<'static, ScrapeEvent> {
        let job_id = JobId::generate();
        let mut summary = JobSummary::new(
            job_id.clone(),
            job.source_id.clone(),
            job.partitions.len(),
        );

        if let Err(e) = validate_job(&driver, &job) {
            warn!(
                job_id = %job_id,
                source_id = %job.source_id,
                error = %e,
                "job rejected"
            );
            summary.finished_at = Some(Timestamp::now());
            let event = ScrapeEvent::JobAborted {
                reason: e.to_string(),
                summary,
            };
            return stream::once(async move { event }).boxed();
        }

        let max_empty = job
            .max_consecutive_empty
            .or_else(|| driver.max_consecutive_empty())
            .unwrap_or(self.default_max_empty)
            .max(1);

        let detector = BlockDetector::new().with_markers(driver.challenge_markers());
        let rate = RateController::new(self.policy.clone(), self.identities.clone());
        let session = DriveSession::new(rate, Arc::clone(&self.fetcher), detector, cancel.clone());

        info!(
            job_id = %job_id,
            source_id = %job.source_id,
            partitions = job.partitions.len(),
            page_cap = ?job.page_cap,
            min_year = ?job.min_year,
            max_empty,
            "job started"
        );

        let run = JobRun {
            filter: RecordFilter::from_job(&job),
            page_cap: job.page_cap,
            partitions: job.partitions,
            driver,
            session,
            max_empty,
            cancel,
            summary,
            next_partition: 0,
            phase: Phase::Idle,
            pending: VecDeque::new(),
        };

        stream::unfold(run, |mut run| async move {
            let event = run.next_event().await?;
            Some((event, run))
        })
        .boxed()
    }
}

/// Check a job against its driver without touching the network.
///
/// Unsupported partition kinds are reported together, in request order.
pub fn validate_job(driver: &SourceDriver, job: &JobConfig) -> Result<()> {
    job.validate()?;

    if &job.source_id != driver.source_id() {
        return Err(ScrapeError::InvalidJob(format!(
            "job targets {} but the driver serves {}",
            job.source_id,
            driver.source_id()
        )));
    }

    let mut unsupported = Vec::new();
    for partition in &job.partitions {
        match driver.validate_partition(partition) {
            Ok(()) => {}
            Err(ScrapeError::UnsupportedPartition { kinds, .. }) => {
                for kind in kinds {
                    if !unsupported.contains(&kind) {
                        unsupported.push(kind);
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }

    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(ScrapeError::UnsupportedPartition {
            source_id: job.source_id.clone(),
            kinds: unsupported,
        })
    }
}

enum Phase {
    Idle,
    Active(ActivePartition),
    Finished,
}

struct ActivePartition {
    partition: Partition,
    cursor: PaginationCursor,
    records: u64,
}

struct JobRun {
    driver: SourceDriver,
    partitions: Vec<Partition>,
    page_cap: Option<u32>,
    filter: RecordFilter,
    max_empty: u32,
    session: DriveSession,
    cancel: CancellationToken,
    summary: JobSummary,
    next_partition: usize,
    phase: Phase,
    pending: VecDeque<ScrapeEvent>,
}

impl JobRun {
    async fn next_event(&mut self) -> Option<ScrapeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            if matches!(self.phase, Phase::Finished) {
                return None;
            }
            self.step().await;
        }
    }

    /// Advance by one transition. Every branch leaves `phase` set.
    async fn step(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Finished) {
            Phase::Idle => self.start_next_partition(),
            Phase::Active(active) => self.attempt_page(active).await,
            Phase::Finished => {}
        }
    }

    fn start_next_partition(&mut self) {
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return;
        }

        let Some(partition) = self.partitions.get(self.next_partition).cloned() else {
            self.finish_done();
            return;
        };
        self.next_partition += 1;

        info!(
            job_id = %self.summary.job_id,
            partition = %partition,
            current = self.next_partition,
            total = self.partitions.len(),
            "partition started"
        );

        self.pending.push_back(ScrapeEvent::PartitionProgress {
            current: self.next_partition,
            total: self.partitions.len(),
            partition: partition.clone(),
        });
        self.phase = Phase::Active(ActivePartition {
            partition,
            cursor: PaginationCursor::new(
                self.driver.page_size_hint(),
                self.max_empty,
                self.page_cap,
            ),
            records: 0,
        });
    }

    async fn attempt_page(&mut self, active: ActivePartition) {
        if self.cancel.is_cancelled() {
            self.finish_cancelled();
            return;
        }

        let outcome = self.fetch_page(&active).await;
        self.summary.requests = self.session.requests();

        match outcome {
            Ok(extraction) => self.process_page(active, extraction),
            Err(StepError::Challenged { marker }) => {
                let page = active.cursor.page_number();
                warn!(
                    partition = %active.partition,
                    page,
                    marker = %marker,
                    "challenge page served, abandoning partition"
                );
                self.pending.push_back(ScrapeEvent::Blocked {
                    partition: active.partition.clone(),
                    page,
                    reason: marker,
                });
                self.end_partition(active, PartitionStatus::Blocked);
            }
            Err(StepError::Protocol(reason)) => {
                warn!(
                    partition = %active.partition,
                    page = active.cursor.page_number(),
                    reason = %reason,
                    "source flow failed"
                );
                self.end_partition(active, PartitionStatus::Aborted { reason });
            }
            Err(StepError::Transport(e)) => {
                self.retry_or_abort(active, BlockSignal::Minimal, e.to_string());
            }
            Err(StepError::Hostile { status, signal }) => {
                self.retry_or_abort(active, signal, format!("hostile response: HTTP {status}"));
            }
            Err(StepError::Cancelled) => {
                debug!(
                    partition = %active.partition,
                    page = active.cursor.page_number(),
                    "cancelled while waiting to fetch"
                );
                self.finish_cancelled();
            }
        }
    }

    async fn fetch_page(
        &mut self,
        active: &ActivePartition,
    ) -> std::result::Result<PageExtraction, StepError> {
        match self.driver.clone() {
            SourceDriver::Paged(adapter) => {
                let request = adapter
                    .build_request(&active.partition, &active.cursor)
                    .map_err(|e| StepError::Protocol(e.to_string()))?;
                let response = self.session.fetch(&request).await?;

                if adapter.reports_no_results(&response.body) {
                    debug!(partition = %active.partition, "source reports no results");
                    return Ok(PageExtraction::empty());
                }

                let declared_total = if active.cursor.is_first_page() {
                    adapter.extract_declared_total(&response.body)
                } else {
                    None
                };
                let output = adapter.extraction_chain().run(&response.body);
                Ok(PageExtraction {
                    records: output.records,
                    declared_total,
                    strategy: output.strategy,
                })
            }
            SourceDriver::Custom(drive) => {
                drive
                    .step(&active.partition, &active.cursor, &mut self.session)
                    .await
            }
        }
    }

    fn retry_or_abort(&mut self, active: ActivePartition, signal: BlockSignal, reason: String) {
        let rate = self.session.rate_mut();
        let may_retry = rate.on_blocked(signal);
        let attempt = rate.consecutive_failures();

        if may_retry {
            warn!(
                partition = %active.partition,
                page = active.cursor.page_number(),
                attempt,
                reason = %reason,
                "page attempt failed, retrying"
            );
            self.phase = Phase::Active(active);
        } else {
            warn!(
                partition = %active.partition,
                page = active.cursor.page_number(),
                attempt,
                reason = %reason,
                "retries exhausted, abandoning partition"
            );
            self.end_partition(active, PartitionStatus::Aborted { reason });
        }
    }

    fn process_page(&mut self, mut active: ActivePartition, extraction: PageExtraction) {
        self.summary.pages_fetched += 1;
        let page = active.cursor.page_number();
        let raw_count = extraction.records.len();

        for raw in extraction.records {
            let provenance = Provenance {
                job_id: self.summary.job_id.clone(),
                source_id: self.summary.source_id.clone(),
                partition: active.partition.clone(),
                page,
                strategy: extraction.strategy.clone(),
                collected_at: Timestamp::now(),
            };
            match normalize_record(raw, provenance) {
                Some(record) if self.filter.accepts(&record) => {
                    active.records += 1;
                    self.summary.records_emitted += 1;
                    self.pending.push_back(ScrapeEvent::Record(record));
                }
                _ => self.summary.records_filtered += 1,
            }
        }

        let declared = if active.cursor.is_first_page() {
            extraction.declared_total
        } else {
            None
        };
        let decision = active.cursor.should_continue(raw_count, declared);

        debug!(
            partition = %active.partition,
            page,
            records = raw_count,
            strategy = ?extraction.strategy,
            declared_total = ?active.cursor.declared_total(),
            ?decision,
            "page processed"
        );

        match decision {
            CursorDecision::Continue => self.phase = Phase::Active(active),
            CursorDecision::StopExhausted => self.end_partition(active, PartitionStatus::Exhausted),
            CursorDecision::StopEmpty => self.end_partition(active, PartitionStatus::Empty),
            CursorDecision::StopCapped => self.end_partition(active, PartitionStatus::Capped),
        }
    }

    fn end_partition(&mut self, active: ActivePartition, status: PartitionStatus) {
        match &status {
            PartitionStatus::Blocked => self.summary.partitions_blocked += 1,
            PartitionStatus::Aborted { .. } => self.summary.partitions_aborted += 1,
            _ => self.summary.partitions_completed += 1,
        }

        info!(
            partition = %active.partition,
            status = ?status,
            pages = active.cursor.pages_fetched(),
            records = active.records,
            "partition finished"
        );

        self.pending.push_back(ScrapeEvent::PartitionDone {
            partition: active.partition,
            status,
            pages_fetched: active.cursor.pages_fetched(),
            records: active.records,
        });
        self.phase = Phase::Idle;
    }

    fn close_summary(&mut self) -> JobSummary {
        self.summary.requests = self.session.requests();
        self.summary.finished_at = Some(Timestamp::now());
        self.summary.clone()
    }

    fn finish_done(&mut self) {
        let summary = self.close_summary();
        info!(
            job_id = %summary.job_id,
            pages = summary.pages_fetched,
            requests = summary.requests,
            records = summary.records_emitted,
            filtered = summary.records_filtered,
            blocked = summary.partitions_blocked,
            aborted = summary.partitions_aborted,
            "job finished"
        );
        self.pending.push_back(ScrapeEvent::JobDone(summary));
        self.phase = Phase::Finished;
    }

    fn finish_cancelled(&mut self) {
        let summary = self.close_summary();
        info!(
            job_id = %summary.job_id,
            completed = summary.partitions_completed,
            records = summary.records_emitted,
            "job cancelled"
        );
        self.pending.push_back(ScrapeEvent::JobCancelled(summary));
        self.phase = Phase::Finished;
    }
}
