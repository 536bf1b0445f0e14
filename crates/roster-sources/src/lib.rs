//! Roster Sources - declarative definitions for professional-directory sources.
//!
//! Most directories paginate a parameterized search, so they can be described in
//! TOML instead of code. This crate owns those definitions: their types, loading
//! them from disk, and an in-memory registry to query them.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed source metadata, search and pagination
//! - **Loader** ([`loader`]): TOML file loading from `source-definitions/`
//! - **Registry** ([`registry`]): In-memory cache with query support
//! - **Filter** ([`filter`]): Source selection and partition support checks
//! - **Errors** ([`error`]): Source-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use roster_sources::{SourceLoader, SourceRegistry};
//! use roster_core::SourceId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = SourceLoader::with_default_dir()?;
//! let registry = SourceRegistry::load_from(&loader)?;
//!
//! let source_id = SourceId::new("lakeside-bar")?;
//! let definition = registry.get(&source_id)?;
//! println!("Source: {} ({:?})", definition.name(), definition.category());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
#[allow(missing_docs)]
pub mod filter;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{
    DetectionRules, ExtractionRules, Pagination, SearchMethod, SourceCategory, SourceDefinition,
    SourceMetadata,
};
pub use error::{Result, SourceError};
pub use filter::{check_partition_support, SourceFilter};
pub use loader::{parse_definition, SourceLoader};
pub use registry::SourceRegistry;
