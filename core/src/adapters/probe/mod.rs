//! Probe adapters.
//!
//! Ready-made [`PortCheck`](crate::ports::PortCheck) implementations for the
//! common ways of recognizing a server.

mod http;
mod tcp;

pub use http::HttpStatusCheck;
pub use tcp::TcpConnectCheck;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::ports::CheckResult;

/// Run `attempt` under `limit`, giving up early when `cancel` fires.
async fn bounded<F>(limit: Duration, cancel: &CancellationToken, attempt: F) -> CheckResult
where
    F: Future<Output = CheckResult>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ProbeError::Cancelled),
        result = tokio::time::timeout(limit, attempt) => {
            result.unwrap_or_else(|_| Err(ProbeError::Timeout(limit)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::finder::PortFinder;
    use crate::ports::PortCheck;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_finds_status_server_among_listeners() {
        // A listener that accepts but never answers, and the real server.
        let decoy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let decoy_port = decoy.local_addr().unwrap().port();
        let server_port = server.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = decoy.accept().await {
                held.push(socket);
            }
        });
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = server.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.0 200 OK\r\n\r\n{\"proxyPort\": 4711}")
                    .await;
            }
        });

        let http = Arc::new(
            HttpStatusCheck::new("127.0.0.1", "/status", Duration::from_millis(300))
                .unwrap()
                .with_secondary_field("proxyPort"),
        );
        // Only the two listeners bound here are really contacted; every other
        // port of the range is refused without touching the network.
        let known = [decoy_port, server_port];
        let check = move |port: u16, cancel: CancellationToken| {
            let http = Arc::clone(&http);
            async move {
                if known.contains(&port) {
                    http.check(port, cancel).await
                } else {
                    Err(ProbeError::Refused)
                }
            }
        };

        let low = decoy_port.min(server_port);
        let high = decoy_port.max(server_port);
        let found = PortFinder::new(low..high.saturating_add(1), check)
            .with_max_in_flight(64)
            .find()
            .await
            .unwrap();
        assert_eq!(found.port, server_port);
        assert_eq!(found.secondary_port, Some(4711));
    }

    #[tokio::test]
    async fn test_bounded_reports_timeout_and_cancel() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<Option<u16>, ProbeError>(None)
        };
        let result = bounded(Duration::from_millis(20), &CancellationToken::new(), slow).await;
        assert!(matches!(result, Err(ProbeError::Timeout(_))));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = bounded(Duration::from_secs(5), &cancel, async { Ok::<Option<u16>, ProbeError>(Some(1)) }).await;
        assert!(matches!(result, Err(ProbeError::Cancelled)));
    }
}
