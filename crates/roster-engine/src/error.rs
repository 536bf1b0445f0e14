use roster_core::{PartitionKind, RosterError, SourceId};
use roster_http::TransportError;
use roster_sources::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid job configuration: {0}")]
    InvalidJob(String),

    #[error("source {source_id} cannot be searched by {kinds:?}")]
    UnsupportedPartition {
        source_id: SourceId,
        kinds: Vec<PartitionKind>,
    },

    #[error("could not build request for {source_id}: {reason}")]
    RequestBuild { source_id: SourceId, reason: String },

    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("core error: {0}")]
    Core(#[from] RosterError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_partition_display() {
        let err = ScrapeError::UnsupportedPartition {
            source_id: SourceId::new("lakeside-bar").expect("valid source ID"),
            kinds: vec![PartitionKind::GeoCell],
        };
        let message = err.to_string();
        assert!(message.contains("lakeside-bar"));
        assert!(message.contains("GeoCell"));
    }

    #[test]
    fn test_transport_conversion() {
        let err: ScrapeError = TransportError::Connect("refused".to_string()).into();
        assert!(matches!(err, ScrapeError::Transport(_)));
    }
}
