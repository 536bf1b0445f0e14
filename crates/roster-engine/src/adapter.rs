//! The contract between the orchestrator and source-specific code.
//!
//! Every source exposes a [`SourceProfile`] plus exactly one way of producing
//! a page: either a [`SourceAdapter`] (the orchestrator fetches a described
//! request and runs the fallback chain) or a [`CustomDrive`] (the source runs
//! its own multi-request step through a [`DriveSession`]). Neither may loop
//! over pages or retry; the orchestrator owns both.

use crate::block::{BlockDetector, Classification};
use crate::cursor::PaginationCursor;
use crate::error::Result;
use crate::extract::FallbackChain;
use crate::rate::{BlockSignal, RateController};
use crate::record::RawRecord;
use async_trait::async_trait;
use roster_core::{Partition, SourceId};
use roster_http::{FetchRequest, FetchResponse, Fetcher, TransportError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Capabilities shared by every source.
pub trait SourceProfile: Send + Sync {
    fn source_id(&self) -> &SourceId;

    /// Records on a full page.
    fn page_size_hint(&self) -> u32;

    /// Source-level override of the consecutive-empty-page tolerance.
    fn max_consecutive_empty(&self) -> Option<u32> {
        None
    }

    /// Reject partitions the source cannot search by.
    fn validate_partition(&self, _partition: &Partition) -> Result<()> {
        Ok(())
    }

    /// Source-specific challenge markers added to the defaults.
    fn challenge_markers(&self) -> &[String] {
        &[]
    }
}

/// A source searched by one described request per page.
pub trait SourceAdapter: SourceProfile {
    fn build_request(&self, partition: &Partition, cursor: &PaginationCursor)
        -> Result<FetchRequest>;

    fn extraction_chain(&self) -> &FallbackChain;

    /// Total result count printed on the page, if any. Only consulted for the
    /// first page of a partition.
    fn extract_declared_total(&self, _payload: &str) -> Option<u64> {
        None
    }

    /// Whether the page states outright that the search matched nothing.
    fn reports_no_results(&self, _payload: &str) -> bool {
        false
    }
}

/// A source that needs form tokens, cookie handshakes or several requests per
/// page. Each call produces exactly one logical page.
#[async_trait]
pub trait CustomDrive: SourceProfile {
    async fn step(
        &self,
        partition: &Partition,
        cursor: &PaginationCursor,
        session: &mut DriveSession,
    ) -> std::result::Result<PageExtraction, StepError>;
}

/// How a job reaches its source.
#[derive(Clone)]
pub enum SourceDriver {
    Paged(Arc<dyn SourceAdapter>),
    Custom(Arc<dyn CustomDrive>),
}

impl SourceDriver {
    pub fn paged(adapter: impl SourceAdapter + 'static) -> Self {
        Self::Paged(Arc::new(adapter))
    }

    pub fn custom(drive: impl CustomDrive + 'static) -> Self {
        Self::Custom(Arc::new(drive))
    }

    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::Paged(adapter) => adapter.source_id(),
            Self::Custom(drive) => drive.source_id(),
        }
    }

    pub fn page_size_hint(&self) -> u32 {
        match self {
            Self::Paged(adapter) => adapter.page_size_hint(),
            Self::Custom(drive) => drive.page_size_hint(),
        }
    }

    pub fn max_consecutive_empty(&self) -> Option<u32> {
        match self {
            Self::Paged(adapter) => adapter.max_consecutive_empty(),
            Self::Custom(drive) => drive.max_consecutive_empty(),
        }
    }

    pub fn validate_partition(&self, partition: &Partition) -> Result<()> {
        match self {
            Self::Paged(adapter) => adapter.validate_partition(partition),
            Self::Custom(drive) => drive.validate_partition(partition),
        }
    }

    pub fn challenge_markers(&self) -> &[String] {
        match self {
            Self::Paged(adapter) => adapter.challenge_markers(),
            Self::Custom(drive) => drive.challenge_markers(),
        }
    }
}

impl std::fmt::Debug for SourceDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Paged(_) => "Paged",
            Self::Custom(_) => "Custom",
        };
        f.debug_struct("SourceDriver")
            .field("kind", &kind)
            .field("source_id", self.source_id())
            .finish()
    }
}

/// Output of one page attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub records: Vec<RawRecord>,
    /// Total result count the source reports, if it reports one
    pub declared_total: Option<u64>,
    /// Strategy that produced the records
    pub strategy: Option<String>,
}

impl PageExtraction {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Why a page attempt failed.
#[derive(Debug, Error)]
pub enum StepError {
    /// No response: timeout, refused connection, unreadable body
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Rate-limit or server-error status
    #[error("hostile response: HTTP {status}")]
    Hostile { status: u16, signal: BlockSignal },

    /// Challenge page; never retried
    #[error("challenge detected: {marker}")]
    Challenged { marker: String },

    /// The source answered but the flow cannot continue (missing form token,
    /// unexpected page shape); never retried
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The job was cancelled while waiting for a request slot
    #[error("cancelled before the request was sent")]
    Cancelled,
}

/// Everything a page attempt may use to talk to the source.
///
/// Every request goes through [`DriveSession::fetch`], so custom drives are
/// paced, classified and counted exactly like described requests.
pub struct DriveSession {
    rate: RateController,
    fetcher: Arc<dyn Fetcher>,
    detector: BlockDetector,
    cancel: CancellationToken,
    state: HashMap<String, String>,
    requests: u64,
}

impl DriveSession {
    pub fn new(
        rate: RateController,
        fetcher: Arc<dyn Fetcher>,
        detector: BlockDetector,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rate,
            fetcher,
            detector,
            cancel,
            state: HashMap::new(),
            requests: 0,
        }
    }

    /// Wait for a request slot, send the request and classify the answer.
    ///
    /// Cancellation while waiting returns [`StepError::Cancelled`] and nothing
    /// is sent. Only a usable page counts as a success for pacing purposes.
    pub async fn fetch(
        &mut self,
        request: &FetchRequest,
    ) -> std::result::Result<FetchResponse, StepError> {
        let identity = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(StepError::Cancelled),
            identity = self.rate.wait() => identity,
        };
        if self.cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        self.requests += 1;

        let outcome = self.fetcher.fetch(request, &identity).await;
        self.rate.record_response();
        let response = outcome?;

        let classification = self.detector.classify(&response.body, response.status);
        let signal = classification.signal().unwrap_or(BlockSignal::Standard);

        match classification {
            Classification::Ok => {
                self.rate.on_success();
                Ok(response)
            }
            Classification::Challenged { marker } => Err(StepError::Challenged { marker }),
            Classification::RateLimited { status } | Classification::ServerError { status } => {
                Err(StepError::Hostile { status, signal })
            }
        }
    }

    /// Scratch space for tokens and other values a drive carries between steps.
    pub fn state(&self) -> &HashMap<String, String> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.state
    }

    pub fn rate(&self) -> &RateController {
        &self.rate
    }

    pub(crate) fn rate_mut(&mut self) -> &mut RateController {
        &mut self.rate
    }

    /// Requests sent so far in this job.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}
