//! PortFinder - locate the port a server is listening on.
//!
//! One discovery run fans a probe out to every port of the range in
//! ascending order and returns the first one that answers:
//!
//! - a producer task walks the range, waiting for room in the response
//!   queue before dispatching each probe
//! - every probe runs in its own task and pushes exactly one outcome
//! - the caller's task drains outcomes until the first success or until
//!   every port has reported
//!
//! The first probe to *return* a success wins, which is not necessarily the
//! lowest successful port.

use std::ops::Range;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::concurrency::{
    ResponseQueue, Semaphore, DEFAULT_DEADLOCK_TIMEOUT, DEFAULT_QUEUE_CAPACITY, MIN_WAIT_PAUSE,
};
use crate::domain::{Discovery, ProbeOutcome};
use crate::error::{Error, ProbeError, Result};
use crate::ports::PortCheck;

/// Finds the first port in a range on which a [`PortCheck`] succeeds.
///
/// Each call to [`PortFinder::find`] is an independent run; nothing but the
/// check itself is shared between runs.
#[derive(Debug)]
pub struct PortFinder<C: PortCheck> {
    ports: Range<u16>,
    check: Arc<C>,
    queue_capacity: usize,
    max_in_flight: Option<usize>,
}

impl<C: PortCheck> PortFinder<C> {
    /// Create a finder probing `ports` (end exclusive) with `check`.
    pub fn new(ports: Range<u16>, check: C) -> Self {
        Self {
            ports,
            check: Arc::new(check),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: None,
        }
    }

    /// Set how many outcomes a run buffers before the producer waits.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Cap the number of probes running at the same time.
    ///
    /// Without a cap only queue headroom slows dispatch down, so slow probes
    /// can pile up.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = Some(max);
        self
    }

    /// The probed range.
    pub fn ports(&self) -> Range<u16> {
        self.ports.clone()
    }

    /// Reject configurations that cannot be probed.
    pub fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::Config(format!(
                "Empty port range {}..{}",
                self.ports.start, self.ports.end
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("Queue capacity must be at least 1".to_string()));
        }
        if self.max_in_flight == Some(0) {
            return Err(Error::Config("Max in-flight probes must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Run one discovery pass.
    ///
    /// Must be called from within a tokio runtime. Returns
    /// [`Error::NotFound`] when every port was probed without success.
    pub async fn find(&self) -> Result<Discovery> {
        self.validate()?;

        debug!(
            start = self.ports.start,
            end = self.ports.end,
            queue_capacity = self.queue_capacity,
            max_in_flight = ?self.max_in_flight,
            "Starting discovery run"
        );

        let run = DiscoveryRun::start(self);
        run.collect().await
    }
}

/// Find the first port in `ports` on which `check` succeeds, with default
/// settings.
pub async fn find<C: PortCheck>(ports: Range<u16>, check: C) -> Result<Discovery> {
    PortFinder::new(ports, check).find().await
}

/// State of one [`PortFinder::find`] call.
///
/// Dropping the run stops dispatch and closes the queue, whether the run
/// finished, failed, panicked or was abandoned by the caller.
struct DiscoveryRun {
    ports: Range<u16>,
    queue: Arc<ResponseQueue<ProbeOutcome>>,
    stop: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
}

impl DiscoveryRun {
    fn start<C: PortCheck>(finder: &PortFinder<C>) -> Self {
        let queue = Arc::new(ResponseQueue::new(finder.queue_capacity));
        let stop = CancellationToken::new();
        let limiter = finder.max_in_flight.map(|max| {
            let limiter = Semaphore::new(max, MIN_WAIT_PAUSE);
            if cfg!(debug_assertions) {
                Arc::new(limiter.with_deadlock_guard(DEFAULT_DEADLOCK_TIMEOUT))
            } else {
                Arc::new(limiter)
            }
        });

        tokio::spawn(produce(
            finder.ports.clone(),
            finder.check.clone(),
            queue.clone(),
            stop.clone(),
            limiter.clone(),
        ));

        Self {
            ports: finder.ports.clone(),
            queue,
            stop,
            limiter,
        }
    }

    /// Drain outcomes until the first success.
    ///
    /// At most one outcome per port is ever produced, so the range length
    /// bounds the number of receives.
    async fn collect(&self) -> Result<Discovery> {
        let expected = self.ports.len();
        let mut probed = 0;

        while probed < expected {
            let Some(ProbeOutcome {
                port,
                secondary_port,
                error,
            }) = self.queue.recv().await
            else {
                break;
            };
            probed += 1;

            if let Some(error) = error {
                trace!(port = port, error = %error, "Probe failed");
                continue;
            }

            self.stop.cancel();
            debug!(
                port = port,
                secondary_port = ?secondary_port,
                probed = probed,
                "Server found"
            );
            return Ok(Discovery {
                port,
                secondary_port,
            });
        }

        debug!(
            start = self.ports.start,
            end = self.ports.end,
            probed = probed,
            "Server not found"
        );
        Err(Error::NotFound { probed })
    }
}

impl Drop for DiscoveryRun {
    fn drop(&mut self) {
        self.stop.cancel();
        self.queue.close();
        if let Some(limiter) = &self.limiter {
            limiter.close();
        }
    }
}

/// Dispatch one probe per port, ascending, until the range is exhausted or
/// the run stops.
async fn produce<C: PortCheck>(
    ports: Range<u16>,
    check: Arc<C>,
    queue: Arc<ResponseQueue<ProbeOutcome>>,
    stop: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
) {
    for port in ports {
        if stop.is_cancelled() {
            break;
        }
        if queue.wait_headroom().await.is_err() {
            break;
        }

        if let Some(limiter) = &limiter {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                () = limiter.acquire(1) => {}
            }
            if limiter.is_closed() {
                break;
            }
        }

        trace!(port = port, "Dispatching probe");
        tokio::spawn(probe(
            port,
            check.clone(),
            queue.clone(),
            stop.clone(),
            limiter.clone(),
        ));
    }
}

/// Check one port and report the outcome.
async fn probe<C: PortCheck>(
    port: u16,
    check: Arc<C>,
    queue: Arc<ResponseQueue<ProbeOutcome>>,
    stop: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
) {
    // A panicking check still has to report, or the consumer waits forever.
    let result = tokio::spawn(async move { check.check(port, stop).await })
        .await
        .unwrap_or_else(|e| {
            warn!(port = port, error = %e, "Port check panicked");
            Err(ProbeError::Panicked)
        });
    let outcome = ProbeOutcome::from_check(port, result);

    if queue.send(outcome).await.is_err() {
        trace!(port = port, "Run already finished, outcome discarded");
    }
    if let Some(limiter) = limiter {
        limiter.release(1);
    }
}
