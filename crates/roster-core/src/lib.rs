//! Roster Core - Foundation crate for the Roster directory crawler.
//!
//! This crate provides shared types, error handling and configuration management
//! that all other Roster crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SourceId`, `JobId`, `Partition`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use roster_core::{AppConfig, Partition, PartitionKind, SourceId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.crawl.max_consecutive_empty, 2);
//!
//! let source = SourceId::new("example-bar")?;
//! let partition = Partition::new(PartitionKind::City, "Springfield")?;
//! println!("{source}: {partition}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, CrawlConfig, HttpConfig, SourcesConfig};
pub use error::{ConfigError, ConfigResult, Result, RosterError};
pub use types::{JobId, Partition, PartitionKind, SourceId, Timestamp};
