use crate::error::{Result, TransportError};
use crate::identity::ClientIdentity;
use crate::request::{FetchMethod, FetchRequest, FetchResponse};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::redirect::Policy;
use roster_core::HttpConfig;
use std::time::Duration;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Issues one request and returns the raw response.
///
/// Implementations never retry; pacing and retry policy belong to the caller.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest, identity: &ClientIdentity)
        -> Result<FetchResponse>;
}

/// reqwest-backed fetcher with a fixed wall-clock timeout per request.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a fetcher with a cookie store so session-based sources keep state
    /// between pages.
    pub fn new(config: &HttpConfig, timeout: Duration) -> Result<Self> {
        let redirect = if config.follow_redirects {
            Policy::limited(10)
        } else {
            Policy::none()
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(redirect)
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, url: &str, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        identity: &ClientIdentity,
    ) -> Result<FetchResponse> {
        let url = request.parsed_url()?;

        let mut builder = match request.method {
            FetchMethod::Get => self.client.get(url),
            FetchMethod::Post => self.client.post(url).form(&request.form),
        };

        builder = builder
            .header(USER_AGENT, identity.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, identity.accept_language.as_str())
            .header(ACCEPT, ACCEPT_HTML);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(&request.url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_error(&request.url, &e))?;

        tracing::debug!(
            url = %request.url,
            status,
            bytes = body.len(),
            "fetched page"
        );

        Ok(FetchResponse {
            status,
            body,
            final_url,
        })
    }
}
