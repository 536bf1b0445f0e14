//! Classification of fetched pages into usable, challenged or hostile.

use crate::rate::BlockSignal;
use serde::{Deserialize, Serialize};

/// Markers of common CAPTCHA and interstitial challenge pages (lower-case).
const DEFAULT_CHALLENGE_MARKERS: [&str; 11] = [
    "g-recaptcha",
    "hcaptcha",
    "cf-challenge",
    "challenge-platform",
    "cf-browser-verification",
    "attention required! | cloudflare",
    "just a moment...",
    "px-captcha",
    "are you a robot",
    "verify you are human",
    "unusual traffic",
];

/// Verdict on one fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    Ok,
    /// Body carries a challenge marker, whatever the status code
    Challenged { marker: String },
    /// 429 or 403
    RateLimited { status: u16 },
    /// Any other non-2xx status
    ServerError { status: u16 },
}

impl Classification {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Backoff strength for responses that may be retried.
    pub fn signal(&self) -> Option<BlockSignal> {
        match self {
            Self::RateLimited { .. } => Some(BlockSignal::Severe),
            Self::ServerError { .. } => Some(BlockSignal::Standard),
            Self::Ok | Self::Challenged { .. } => None,
        }
    }
}

/// Stateless page classifier.
///
/// Content markers are checked before the status line because challenge pages
/// are frequently served with 200 and sometimes with 403.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    markers: Vec<String>,
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self {
            markers: DEFAULT_CHALLENGE_MARKERS
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

impl BlockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add source-specific markers on top of the defaults.
    #[must_use]
    pub fn with_markers<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for marker in extra {
            let marker = marker.as_ref().trim().to_lowercase();
            if !marker.is_empty() && !self.markers.contains(&marker) {
                self.markers.push(marker);
            }
        }
        self
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    pub fn classify(&self, payload: &str, status: u16) -> Classification {
        let haystack = payload.to_lowercase();
        if let Some(marker) = self.markers.iter().find(|m| haystack.contains(m.as_str())) {
            return Classification::Challenged {
                marker: marker.clone(),
            };
        }

        match status {
            200..=299 => Classification::Ok,
            403 | 429 => Classification::RateLimited { status },
            _ => Classification::ServerError { status },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_page() {
        let detector = BlockDetector::new();
        let html = r#"<div class="search-results"><div class="member">Jane Doe</div></div>"#;
        assert_eq!(detector.classify(html, 200), Classification::Ok);
    }

    #[test]
    fn test_challenge_on_success_status() {
        let detector = BlockDetector::new();
        let html = r#"<div class="g-recaptcha" data-sitekey="abc"></div>"#;
        assert_eq!(
            detector.classify(html, 200),
            Classification::Challenged {
                marker: "g-recaptcha".to_string()
            }
        );
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let detector = BlockDetector::new();
        let html = "<title>Just a moment...</title>";
        assert!(matches!(
            detector.classify(html, 503),
            Classification::Challenged { .. }
        ));
    }

    #[test]
    fn test_status_classification() {
        let detector = BlockDetector::new();
        assert_eq!(
            detector.classify("Too Many Requests", 429),
            Classification::RateLimited { status: 429 }
        );
        assert_eq!(
            detector.classify("Forbidden", 403),
            Classification::RateLimited { status: 403 }
        );
        assert_eq!(
            detector.classify("Bad Gateway", 502),
            Classification::ServerError { status: 502 }
        );
        assert_eq!(
            detector.classify("Not Found", 404),
            Classification::ServerError { status: 404 }
        );
        assert_eq!(detector.classify("", 204), Classification::Ok);
    }

    #[test]
    fn test_source_markers() {
        let detector = BlockDetector::new().with_markers(["Verify You Are A Member", "  "]);
        assert_eq!(detector.markers().len(), DEFAULT_CHALLENGE_MARKERS.len() + 1);

        let html = "<p>Please verify you are a member to continue</p>";
        assert_eq!(
            detector.classify(html, 200),
            Classification::Challenged {
                marker: "verify you are a member".to_string()
            }
        );
    }

    #[test]
    fn test_signal_strength() {
        assert_eq!(
            Classification::RateLimited { status: 429 }.signal(),
            Some(BlockSignal::Severe)
        );
        assert_eq!(
            Classification::ServerError { status: 500 }.signal(),
            Some(BlockSignal::Standard)
        );
        assert_eq!(Classification::Ok.signal(), None);
    }
}
