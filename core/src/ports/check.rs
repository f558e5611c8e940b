//! Port check port (interface).

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;

/// Result of checking a single port: the optional secondary value on success.
pub type CheckResult = std::result::Result<Option<u16>, ProbeError>;

/// Port for checking whether the wanted server answers on a port.
///
/// Implementations decide the transport (TCP, UDP, HTTP, ...) and must apply
/// their own timeout. They are called concurrently for different ports.
///
/// `cancel` is triggered once the run has its answer or is abandoned. Checks
/// may return early when it fires; ones that ignore it run to completion and
/// their outcome is discarded.
pub trait PortCheck: Send + Sync + 'static {
    /// Check one candidate port.
    fn check(
        &self,
        port: u16,
        cancel: CancellationToken,
    ) -> impl Future<Output = CheckResult> + Send;
}

impl<F, Fut> PortCheck for F
where
    F: Fn(u16, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CheckResult> + Send,
{
    fn check(
        &self,
        port: u16,
        cancel: CancellationToken,
    ) -> impl Future<Output = CheckResult> + Send {
        (self)(port, cancel)
    }
}
