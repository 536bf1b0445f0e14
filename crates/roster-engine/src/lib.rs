//! Roster Engine - paced, block-aware directory crawling.
//!
//! This crate walks paginated directory searches one partition at a time and
//! streams normalized records back to the caller. It owns the page loop and
//! everything around it: request pacing with exponential backoff and a circuit
//! breaker, challenge and rate-limit detection, pagination stop rules, and an
//! ordered fallback chain of extraction strategies.
//!
//! # Features
//!
//! - Lazy event stream: nothing is fetched until the consumer pulls
//! - One rate state per job, mutated only by the rate controller
//! - Challenge pages abandon a partition without retrying
//! - Declarative sources via TOML definitions, or custom multi-request drives
//! - Cooperative cancellation between pages
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use roster_engine::{DefinitionAdapter, JobConfig, Orchestrator, RatePolicy, SourceDriver};
//! use roster_core::{HttpConfig, Partition, PartitionKind, SourceId};
//! use roster_http::HttpFetcher;
//! use roster_sources::SourceLoader;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let source_id = SourceId::new("lakeside-bar")?;
//! let definition = SourceLoader::new("source-definitions")?.load(&source_id)?;
//! let driver = SourceDriver::paged(DefinitionAdapter::new(definition)?);
//!
//! let fetcher = HttpFetcher::new(&HttpConfig::default(), Duration::from_secs(20))?;
//! let orchestrator = Orchestrator::new(Arc::new(fetcher), RatePolicy::default());
//!
//! let job = JobConfig::new(source_id, vec![Partition::new(PartitionKind::City, "Akron")?]);
//! let mut events = orchestrator.start(driver, job, CancellationToken::new());
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod adapter;
#[allow(missing_docs)]
pub mod block;
#[allow(missing_docs)]
pub mod cursor;
#[allow(missing_docs)]
pub mod definition_adapter;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod event;
#[allow(missing_docs)]
pub mod extract;
#[allow(missing_docs)]
pub mod job;
#[allow(missing_docs)]
pub mod normalize;
pub mod orchestrator;
#[allow(missing_docs)]
pub mod rate;
#[allow(missing_docs)]
pub mod record;
#[allow(missing_docs)]
pub mod strategies;

// Re-export commonly used types
pub use adapter::{
    CustomDrive, DriveSession, PageExtraction, SourceAdapter, SourceDriver, SourceProfile,
    StepError,
};
pub use block::{BlockDetector, Classification};
pub use cursor::{CursorDecision, PaginationCursor};
pub use definition_adapter::DefinitionAdapter;
pub use error::{Result, ScrapeError};
pub use event::{PartitionStatus, ScrapeEvent};
pub use extract::{ChainOutput, ExtractionStrategy, FallbackChain, FnStrategy};
pub use job::{JobConfig, JobSummary, RecordFilter};
pub use normalize::normalize_record;
pub use orchestrator::{validate_job, Orchestrator, DEFAULT_MAX_CONSECUTIVE_EMPTY};
pub use rate::{BlockSignal, RateController, RatePolicy, RateState};
pub use record::{ContactChannels, NameParts, Provenance, RawRecord, ResultRecord};
pub use strategies::{CardStrategy, LinkScanStrategy, TableStrategy};
