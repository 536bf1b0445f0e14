use crate::error::{Result, TransportError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchMethod {
    Get,
    Post,
}

/// Description of one outbound request, built by a source adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub method: FetchMethod,
    pub url: String,
    /// Form-encoded body fields (POST only)
    #[serde(default)]
    pub form: Vec<(String, String)>,
    /// Extra headers on top of the identity headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: FetchMethod::Get,
            url: url.into(),
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: FetchMethod::Post,
            url: url.into(),
            form,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Parse and check the target URL.
    pub fn parsed_url(&self) -> Result<url::Url> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.url)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{other}' in {}",
                self.url
            ))),
        }
    }
}

/// Raw response handed back to the engine for classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
    pub final_url: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            final_url: final_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_url_rejects_other_schemes() {
        assert!(FetchRequest::get("https://bar.example.org/find?page=1")
            .parsed_url()
            .is_ok());
        assert!(FetchRequest::get("ftp://bar.example.org/list")
            .parsed_url()
            .is_err());
        assert!(FetchRequest::get("/relative/path").parsed_url().is_err());
    }

    #[test]
    fn test_post_form_builder() {
        let request = FetchRequest::post_form(
            "https://bar.example.org/search",
            vec![("city".to_string(), "Akron".to_string())],
        )
        .with_header("X-Requested-With", "XMLHttpRequest");

        assert_eq!(request.method, FetchMethod::Post);
        assert_eq!(request.form.len(), 1);
        assert_eq!(request.headers[0].0, "X-Requested-With");
    }
}
