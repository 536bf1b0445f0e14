use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures below the HTTP status line: the request never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timeout after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("client setup failed: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::Connect("connection reset by peer".to_string());
        assert_eq!(err.to_string(), "connection failed: connection reset by peer");
    }

    #[test]
    fn test_timeout_error() {
        let err = TransportError::Timeout {
            url: "https://bar.example.org/find".to_string(),
            secs: 20,
        };
        assert!(err.to_string().contains("20s"));
        assert!(err.to_string().contains("bar.example.org"));
    }
}
