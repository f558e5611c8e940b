//! TCP connect probe.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::ports::{CheckResult, PortCheck};

use super::bounded;

/// Succeeds when a TCP connection to `host:port` can be established.
///
/// Only tells that *something* listens on the port; use
/// [`HttpStatusCheck`](super::HttpStatusCheck) to recognize a specific server.
#[derive(Debug, Clone)]
pub struct TcpConnectCheck {
    host: String,
    timeout: Duration,
}

impl TcpConnectCheck {
    /// Create a check connecting to `host` with a per-port `timeout`.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
        }
    }
}

impl PortCheck for TcpConnectCheck {
    async fn check(&self, port: u16, cancel: CancellationToken) -> CheckResult {
        let connect = async {
            TcpStream::connect((self.host.as_str(), port))
                .await
                .map(|_| None::<u16>)
                .map_err(ProbeError::from)
        };
        bounded(self.timeout, &cancel, connect).await
    }
}
