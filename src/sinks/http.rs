//! HTTP sink
//!
//! POSTs each event's wire form to a configured endpoint with a per-request
//! timeout. Delivery is best-effort and at-most-one-attempt: a non-success
//! status or a transport failure is reported as an error (the pipeline logs
//! it) and the event is dropped for this sink. There is no retry and no
//! local spooling.

use crate::error::SinkError;
use crate::events::LogEvent;
use crate::sinks::Sink;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

/// Sink delivering events to an HTTP endpoint
pub struct HttpSink {
    client: Client,
    runtime: tokio::runtime::Runtime,
    url: String,
    headers: HeaderMap,
}

impl HttpSink {
    /// Create a sink from its configuration
    ///
    /// The request headers default to `Content-Type: application/json` when
    /// none are configured; a configured `auth_token` adds a bearer
    /// authorization header. The request timeout defaults to 10s.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::InvalidConfig` when `url` is missing or a header
    /// name/value cannot be used; the pipeline skips the sink with a warning.
    pub fn new(config: &crate::config::SinkConfig) -> Result<Self, SinkError> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| SinkError::InvalidConfig("http sink requires 'url'".to_string()))?;

        let mut headers = HeaderMap::new();
        if config.headers.is_empty() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        } else {
            for (name, value) in &config.headers {
                let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    SinkError::InvalidConfig(format!("invalid header name '{}': {}", name, e))
                })?;
                let value = HeaderValue::from_str(value).map_err(|e| {
                    SinkError::InvalidConfig(format!("invalid header value for '{}': {}", name, e))
                })?;
                headers.insert(name, value);
            }
        }

        if let Some(token) = &config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                SinkError::InvalidConfig(format!("invalid auth token: {}", e))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.timeout_or(10.0))
            .no_proxy()
            .build()?;
        let runtime = tokio::runtime::Runtime::new()?;

        Ok(Self {
            client,
            runtime,
            url,
            headers,
        })
    }
}

impl Sink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn write(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        let body = event.to_json()?;

        let response = self.runtime.block_on(async {
            self.client
                .post(&self.url)
                .headers(self.headers.clone())
                .body(body)
                .send()
                .await
        })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SinkError::HttpStatus(status));
        }

        Ok(())
    }
}
