//! HTTP status endpoint probe.
//!
//! Requests a status path on every candidate port and treats a 2xx answer as
//! the server being found.

use std::error::Error as _;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, ProbeError, Result};
use crate::ports::{CheckResult, PortCheck};

use super::bounded;

/// Succeeds when `GET http://host:port/path` answers with a 2xx status.
///
/// With a secondary field set, the response body must be a JSON object
/// carrying that field as an integer; its value becomes the secondary port.
#[derive(Debug, Clone)]
pub struct HttpStatusCheck {
    client: reqwest::Client,
    host: String,
    path: String,
    timeout: Duration,
    secondary_field: Option<String>,
}

impl HttpStatusCheck {
    /// Create a check requesting `path` on `host` with a per-port `timeout`.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut path = path.into();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }

        // Candidates are local ports; an environment proxy must not see them.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            host: host.into(),
            path,
            timeout,
            secondary_field: None,
        })
    }

    /// Read the secondary port from this field of the JSON body.
    pub fn with_secondary_field(mut self, field: impl Into<String>) -> Self {
        self.secondary_field = Some(field.into());
        self
    }

    fn url(&self, port: u16) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}{}", self.host, port, self.path)
        } else {
            format!("http://{}:{}{}", self.host, port, self.path)
        }
    }

    async fn request(&self, port: u16) -> CheckResult {
        let response = self
            .client
            .get(self.url(port))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let Some(field) = &self.secondary_field else {
            return Ok(None);
        };

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                ProbeError::Mismatch(format!("Invalid JSON body: {}", e))
            } else {
                self.classify(e)
            }
        })?;
        secondary_port(&body, field).map(Some)
    }

    fn classify(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            return ProbeError::Timeout(self.timeout);
        }

        let mut source = e.source();
        while let Some(inner) = source {
            if let Some(io) = inner.downcast_ref::<std::io::Error>() {
                return std::io::Error::from(io.kind()).into();
            }
            source = inner.source();
        }

        ProbeError::Http(e)
    }
}

impl PortCheck for HttpStatusCheck {
    async fn check(&self, port: u16, cancel: CancellationToken) -> CheckResult {
        bounded(self.timeout, &cancel, self.request(port)).await
    }
}

/// Extract an integer port field from a JSON body.
fn secondary_port(body: &serde_json::Value, field: &str) -> std::result::Result<u16, ProbeError> {
    body.get(field)
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| ProbeError::Mismatch(format!("Missing port field '{}'", field)))
}
