//! Ordered extraction strategies with first-non-empty-wins semantics.

use crate::record::RawRecord;

/// A pure function from page payload to records.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn extract(&self, payload: &str) -> Vec<RawRecord>;
}

/// Adapts a closure into a named strategy.
pub struct FnStrategy<F> {
    name: String,
    extract: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(&str) -> Vec<RawRecord> + Send + Sync,
{
    pub fn new(name: impl Into<String>, extract: F) -> Self {
        Self {
            name: name.into(),
            extract,
        }
    }
}

impl<F> ExtractionStrategy for FnStrategy<F>
where
    F: Fn(&str) -> Vec<RawRecord> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, payload: &str) -> Vec<RawRecord> {
        (self.extract)(payload)
    }
}

/// Records from a chain run and the strategy that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainOutput {
    pub records: Vec<RawRecord>,
    /// `None` when every strategy came back empty
    pub strategy: Option<String>,
}

#[derive(Default)]
pub struct FallbackChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.push(strategy);
        self
    }

    pub fn push(&mut self, strategy: impl ExtractionStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order and return the first non-empty output.
    ///
    /// Strategies after the first match are not run.
    pub fn run(&self, payload: &str) -> ChainOutput {
        for strategy in &self.strategies {
            let records = strategy.extract(payload);
            if !records.is_empty() {
                tracing::debug!(
                    strategy = strategy.name(),
                    count = records.len(),
                    "extraction strategy matched"
                );
                return ChainOutput {
                    records,
                    strategy: Some(strategy.name().to_string()),
                };
            }
        }
        ChainOutput::default()
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("strategies", &self.names())
            .finish()
    }
}
