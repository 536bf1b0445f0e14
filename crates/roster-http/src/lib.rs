//! HTTP transport for directory sources.
//!
//! Provides the [`Fetcher`] seam the crawl engine talks to, a reqwest-backed
//! implementation with a fixed per-request timeout, and the rotating client
//! identity pool used to vary outbound signatures between requests.

pub mod error;
pub mod fetcher;
pub mod identity;
pub mod request;

pub use error::{Result, TransportError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use identity::{ClientIdentity, IdentityPool};
pub use request::{FetchMethod, FetchRequest, FetchResponse};
