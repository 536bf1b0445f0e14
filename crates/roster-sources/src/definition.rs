//! Source definition types and structures.
//!
//! This module defines the data structures for source definitions loaded from TOML files.
//! A definition describes a directory whose search fits parameterized pagination: how to
//! build the request for a partition and page, where the declared total lives, which
//! selectors find result cards, and which markers betray a challenge page.

use crate::error::{Result, SourceError};
use chrono::NaiveDate;
use regex::Regex;
use roster_core::{PartitionKind, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholders that advance with the page.
const PAGE_PLACEHOLDERS: [&str; 2] = ["{page}", "{offset}"];

/// Placeholders that carry the partition value.
const PARTITION_PLACEHOLDERS: [&str; 2] = ["{partition}", "{partition_raw}"];

/// Largest page size a definition may declare.
const MAX_PAGE_SIZE: u32 = 1000;

/// Complete source definition loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Core source metadata
    pub source: SourceMetadata,

    /// Search request configuration
    pub search: SearchMethod,

    /// Pagination behavior
    pub pagination: Pagination,

    /// Structured-card selectors and fallback toggles
    #[serde(default)]
    pub extraction: ExtractionRules,

    /// Challenge and no-results detection
    #[serde(default)]
    pub detection: DetectionRules,
}

impl SourceDefinition {
    /// Get the source ID.
    #[must_use]
    pub fn id(&self) -> &SourceId {
        &self.source.id
    }

    /// Get the source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.source.name
    }

    /// Get the source category.
    #[must_use]
    pub fn category(&self) -> SourceCategory {
        self.source.category
    }

    /// Whether the source can be searched by the given partition kind.
    #[must_use]
    pub fn supports(&self, kind: PartitionKind) -> bool {
        self.source.partition_kinds.contains(&kind)
    }

    /// Validate the source definition for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.source.name.is_empty() {
            return Err(self.invalid("source name cannot be empty"));
        }

        if self.source.url.is_empty() {
            return Err(self.invalid("source URL cannot be empty"));
        }

        if self.source.partition_kinds.is_empty() {
            return Err(self.invalid("source must declare at least one partition kind"));
        }

        self.search.validate(&self.source.id)?;
        self.pagination.validate(&self.source.id)?;

        Ok(())
    }

    fn invalid(&self, reason: &str) -> SourceError {
        SourceError::ValidationError {
            source_id: self.source.id.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Core source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Unique source identifier (e.g., "ohio-bar")
    pub id: SourceId,

    /// Human-readable source name
    pub name: String,

    /// Source website URL
    pub url: String,

    /// Source domain (e.g., "bar.example.org")
    pub domain: String,

    /// Source category
    pub category: SourceCategory,

    /// Partition kinds the search accepts
    pub partition_kinds: Vec<PartitionKind>,

    /// Date when this definition was last verified (YYYY-MM-DD)
    pub last_verified: NaiveDate,
}

/// Categories of professional directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    /// Bar associations and attorney registries
    BarAssociation,
    /// Medical and nursing licensing boards
    MedicalBoard,
    /// Accountancy boards and CPA societies
    Accountancy,
    /// Engineering and architecture registries
    Engineering,
    /// Real-estate licensing directories
    RealEstate,
    /// Trade and member associations
    TradeAssociation,
    /// Other/uncategorized
    Other,
}

impl SourceCategory {
    /// Get a human-readable display name.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::BarAssociation => "Bar Association",
            Self::MedicalBoard => "Medical Board",
            Self::Accountancy => "Accountancy",
            Self::Engineering => "Engineering",
            Self::RealEstate => "Real Estate",
            Self::TradeAssociation => "Trade Association",
            Self::Other => "Other",
        }
    }

    /// The kebab-case name used in TOML files and filters.
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            Self::BarAssociation => "bar-association",
            Self::MedicalBoard => "medical-board",
            Self::Accountancy => "accountancy",
            Self::Engineering => "engineering",
            Self::RealEstate => "real-estate",
            Self::TradeAssociation => "trade-association",
            Self::Other => "other",
        }
    }
}

/// How a search request is issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum SearchMethod {
    /// GET against a URL template with placeholder substitution
    PagedUrl {
        /// URL template (e.g., `https://bar.example.org/find?city={partition}&page={page}`)
        template: String,
    },

    /// Form POST where the page travels as a form field
    FormPost {
        /// Form action URL (placeholders allowed)
        url: String,
        /// Form fields; values may contain placeholders
        fields: BTreeMap<String, String>,
    },
}

impl SearchMethod {
    /// Every string that takes placeholder substitution.
    fn templated_parts(&self) -> Vec<&str> {
        match self {
            Self::PagedUrl { template } => vec![template.as_str()],
            Self::FormPost { url, fields } => std::iter::once(url.as_str())
                .chain(fields.values().map(String::as_str))
                .collect(),
        }
    }

    /// Validate the search method configuration.
    fn validate(&self, source_id: &SourceId) -> Result<()> {
        let invalid = |reason: &str| SourceError::ValidationError {
            source_id: source_id.to_string(),
            reason: reason.to_string(),
        };

        match self {
            Self::PagedUrl { template } if template.is_empty() => {
                return Err(invalid("URL template cannot be empty"));
            }
            Self::FormPost { url, .. } if url.is_empty() => {
                return Err(invalid("form-post URL cannot be empty"));
            }
            Self::FormPost { fields, .. } if fields.is_empty() => {
                return Err(invalid("form-post requires at least one field"));
            }
            _ => {}
        }

        let parts = self.templated_parts();
        let has_any = |placeholders: &[&str]| {
            parts
                .iter()
                .any(|part| placeholders.iter().any(|p| part.contains(p)))
        };

        if !has_any(&PAGE_PLACEHOLDERS) {
            return Err(invalid(
                "search must reference {page} or {offset} so pages can advance",
            ));
        }
        if !has_any(&PARTITION_PLACEHOLDERS) {
            return Err(invalid(
                "search must reference {partition} or {partition_raw}",
            ));
        }

        Ok(())
    }
}

/// Pagination behavior for a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    /// Records the source returns per full page
    pub page_size: u32,

    /// Page number the source uses for its first page
    #[serde(default = "default_first_page")]
    pub first_page: u32,

    /// Override of the consecutive-empty-page tolerance
    #[serde(default)]
    pub max_consecutive_empty: Option<u32>,

    /// Regex whose first capture group holds the declared result total
    #[serde(default)]
    pub total_pattern: Option<String>,
}

fn default_first_page() -> u32 {
    1
}

impl Pagination {
    /// Compile the declared-total pattern, if any.
    pub fn total_regex(&self, source_id: &SourceId) -> Result<Option<Regex>> {
        let Some(pattern) = &self.total_pattern else {
            return Ok(None);
        };

        let regex = Regex::new(pattern).map_err(|e| SourceError::ValidationError {
            source_id: source_id.to_string(),
            reason: format!("invalid total_pattern: {e}"),
        })?;

        if regex.captures_len() < 2 {
            return Err(SourceError::ValidationError {
                source_id: source_id.to_string(),
                reason: "total_pattern needs a capture group around the number".to_string(),
            });
        }

        Ok(Some(regex))
    }

    fn validate(&self, source_id: &SourceId) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SourceError::ValidationError {
                source_id: source_id.to_string(),
                reason: format!(
                    "page_size must be 1-{MAX_PAGE_SIZE}, got {}",
                    self.page_size
                ),
            });
        }

        if self.max_consecutive_empty == Some(0) {
            return Err(SourceError::ValidationError {
                source_id: source_id.to_string(),
                reason: "max_consecutive_empty must be at least 1".to_string(),
            });
        }

        self.total_regex(source_id)?;
        Ok(())
    }
}

/// CSS selectors for the structured-card strategy plus fallback toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRules {
    /// Selector matching one result card; enables the card strategy
    #[serde(default)]
    pub item: Option<String>,

    /// Selector for the full display name within a card
    #[serde(default)]
    pub name: Option<String>,

    /// Selector for the firm or organization
    #[serde(default)]
    pub firm: Option<String>,

    /// Selector for the location line
    #[serde(default)]
    pub location: Option<String>,

    /// Selector for the phone number
    #[serde(default)]
    pub phone: Option<String>,

    /// Selector for the email (text or `mailto:` link)
    #[serde(default)]
    pub email: Option<String>,

    /// Selector for the website link
    #[serde(default)]
    pub website: Option<String>,

    /// Selector for the link to the source's own profile page
    #[serde(default)]
    pub profile_link: Option<String>,

    /// Selector for a year (admission, licensure) used by post-filters
    #[serde(default)]
    pub year: Option<String>,

    /// Try header-mapped tables when cards yield nothing
    #[serde(default = "default_true")]
    pub tables: bool,

    /// Try heuristic link and text scanning as the last resort
    #[serde(default = "default_true")]
    pub link_scan: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            item: None,
            name: None,
            firm: None,
            location: None,
            phone: None,
            email: None,
            website: None,
            profile_link: None,
            year: None,
            tables: true,
            link_scan: true,
        }
    }
}

/// Source-specific challenge and no-results markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionRules {
    /// Extra case-insensitive substrings that mark a challenge page
    #[serde(default)]
    pub challenge_markers: Vec<String>,

    /// Selector present only when the search matched nothing
    #[serde(default)]
    pub no_results_indicator: Option<String>,
}
