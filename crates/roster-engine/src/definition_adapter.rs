//! [`SourceAdapter`] driven entirely by a TOML source definition.
//!
//! Request templates may use these placeholders:
//!
//! | placeholder       | value                                        |
//! |-------------------|----------------------------------------------|
//! | `{partition}`     | partition value, URL-encoded in URLs         |
//! | `{partition_raw}` | partition value as given                     |
//! | `{page}`          | source page number (`first_page` based)      |
//! | `{offset}`        | zero-based record offset of the page         |
//! | `{page_size}`     | records per page                             |
//!
//! Form fields are encoded when the request is sent, so `{partition}` in a
//! field carries the raw value.

use crate::adapter::{SourceAdapter, SourceProfile};
use crate::cursor::PaginationCursor;
use crate::error::{Result, ScrapeError};
use crate::extract::FallbackChain;
use crate::strategies::{parse_selector, CardStrategy, LinkScanStrategy, TableStrategy};
use regex::Regex;
use roster_core::{Partition, SourceId};
use roster_http::FetchRequest;
use roster_sources::{check_partition_support, SearchMethod, SourceDefinition, SourceError};
use scraper::{Html, Selector};
use url::Url;

pub struct DefinitionAdapter {
    definition: SourceDefinition,
    chain: FallbackChain,
    total_regex: Option<Regex>,
    no_results: Option<Selector>,
}

impl DefinitionAdapter {
    pub fn new(definition: SourceDefinition) -> Result<Self> {
        definition.validate()?;

        let base_url = Url::parse(&definition.source.url).ok();
        let rules = &definition.extraction;

        let mut chain = FallbackChain::new();
        if let Some(cards) = CardStrategy::from_rules(rules, base_url.clone())? {
            chain.push(cards);
        }
        if rules.tables {
            chain.push(TableStrategy::new(base_url.clone()));
        }
        if rules.link_scan {
            chain.push(LinkScanStrategy::new(base_url));
        }
        if chain.is_empty() {
            return Err(ScrapeError::Source(SourceError::ValidationError {
                source_id: definition.id().to_string(),
                reason: "no extraction strategy enabled".to_string(),
            }));
        }

        let total_regex = definition.pagination.total_regex(definition.id())?;
        let no_results = definition
            .detection
            .no_results_indicator
            .as_deref()
            .map(parse_selector)
            .transpose()?;

        tracing::debug!(
            source_id = %definition.id(),
            strategies = ?chain.names(),
            "built definition adapter"
        );

        Ok(Self {
            definition,
            chain,
            total_regex,
            no_results,
        })
    }

    pub fn definition(&self) -> &SourceDefinition {
        &self.definition
    }

    fn render(
        &self,
        template: &str,
        partition: &Partition,
        cursor: &PaginationCursor,
        encode_partition: bool,
    ) -> String {
        let pagination = &self.definition.pagination;
        let page = pagination.first_page + cursor.page_number() - 1;
        let value = partition.value();
        let encoded = if encode_partition {
            urlencoding::encode(value).into_owned()
        } else {
            value.to_string()
        };

        template
            .replace("{page}", &page.to_string())
            .replace("{offset}", &cursor.offset().to_string())
            .replace("{page_size}", &pagination.page_size.to_string())
            .replace("{partition_raw}", value)
            .replace("{partition}", &encoded)
    }
}

impl SourceProfile for DefinitionAdapter {
    fn source_id(&self) -> &SourceId {
        self.definition.id()
    }

    fn page_size_hint(&self) -> u32 {
        self.definition.pagination.page_size
    }

    fn max_consecutive_empty(&self) -> Option<u32> {
        self.definition.pagination.max_consecutive_empty
    }

    fn validate_partition(&self, partition: &Partition) -> Result<()> {
        check_partition_support(&self.definition, std::slice::from_ref(partition)).map_err(
            |kinds| ScrapeError::UnsupportedPartition {
                source_id: self.definition.id().clone(),
                kinds,
            },
        )
    }

    fn challenge_markers(&self) -> &[String] {
        &self.definition.detection.challenge_markers
    }
}

impl SourceAdapter for DefinitionAdapter {
    fn build_request(
        &self,
        partition: &Partition,
        cursor: &PaginationCursor,
    ) -> Result<FetchRequest> {
        let request = match &self.definition.search {
            SearchMethod::PagedUrl { template } => {
                FetchRequest::get(self.render(template, partition, cursor, true))
            }
            SearchMethod::FormPost { url, fields } => FetchRequest::post_form(
                self.render(url, partition, cursor, true),
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.render(value, partition, cursor, false)))
                    .collect(),
            ),
        };

        request
            .parsed_url()
            .map_err(|e| ScrapeError::RequestBuild {
                source_id: self.definition.id().clone(),
                reason: e.to_string(),
            })?;
        Ok(request)
    }

    fn extraction_chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Matched against the raw markup first, then against the page text so
    /// totals wrapped in tags still parse.
    fn extract_declared_total(&self, payload: &str) -> Option<u64> {
        let regex = self.total_regex.as_ref()?;
        let parse = |haystack: &str| -> Option<u64> {
            let digits: String = regex
                .captures(haystack)?
                .get(1)?
                .as_str()
                .chars()
                .filter(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        };

        parse(payload).or_else(|| {
            let text = Html::parse_document(payload)
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ");
            parse(&crate::normalize::collapse_whitespace(&text))
        })
    }

    fn reports_no_results(&self, payload: &str) -> bool {
        self.no_results.as_ref().is_some_and(|selector| {
            Html::parse_document(payload)
                .select(selector)
                .next()
                .is_some()
        })
    }
}
