#![allow(clippy::must_use_candidate)]

use crate::definition::SourceDefinition;
use roster_core::{Partition, PartitionKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SourceFilter {
    All,
    Category(String),
    Specific(Vec<String>),
}

impl SourceFilter {
    pub fn matches(&self, source: &SourceDefinition) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Category(cat) => source.category().slug() == cat,
            SourceFilter::Specific(ids) => ids.iter().any(|id| source.id().as_str() == id),
        }
    }
}

/// Checks that a source can express every requested partition.
///
/// # Returns
/// * `Ok(())` if every partition kind is supported
/// * `Err(Vec<PartitionKind>)` with each unsupported kind, once, in request order
pub fn check_partition_support(
    source: &SourceDefinition,
    partitions: &[Partition],
) -> Result<(), Vec<PartitionKind>> {
    let mut unsupported = Vec::new();

    for partition in partitions {
        let kind = partition.kind();
        if !source.supports(kind) && !unsupported.contains(&kind) {
            unsupported.push(kind);
        }
    }

    if unsupported.is_empty() {
        Ok(())
    } else {
        Err(unsupported)
    }
}
