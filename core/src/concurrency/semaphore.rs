//! Resizable, closable counting semaphore.
//!
//! Unlike `tokio::sync::Semaphore`, tokens are plain counts rather than
//! guards: callers acquire and release explicitly, the capacity can be
//! changed while tokens are held, and callers can wait for the pool to
//! drain down to a level.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How long a single token acquisition waits before retrying.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(5);

/// Suggested limit for the deadlock guard when enabled.
pub const DEFAULT_DEADLOCK_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Shortest allowed poll interval for the level waits.
pub const MIN_WAIT_PAUSE: Duration = Duration::from_millis(100);

/// Delay before the first level check.
const FIRST_CHECK_DELAY: Duration = Duration::from_millis(10);

/// Something that can report whether the caller is still running.
pub trait Liveness {
    /// Returns false once the caller has stopped.
    fn is_running(&self) -> bool;
}

impl Liveness for AtomicBool {
    fn is_running(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl Liveness for CancellationToken {
    fn is_running(&self) -> bool {
        !self.is_cancelled()
    }
}

#[derive(Debug)]
struct Gate {
    capacity: usize,
    held: usize,
    closed: bool,
}

enum Take {
    Taken,
    Full,
    Closed,
}

/// A capacity-bounded token pool.
#[derive(Debug)]
pub struct Semaphore {
    gate: Mutex<Gate>,
    changed: Notify,
    wait_pause: Duration,
    retry_window: Duration,
    deadlock_timeout: Option<Duration>,
}

impl Semaphore {
    /// Create a semaphore with `capacity` tokens.
    ///
    /// `wait_pause` is the poll interval of [`Semaphore::wait_for_level`];
    /// values below [`MIN_WAIT_PAUSE`] are raised to it.
    pub fn new(capacity: usize, wait_pause: Duration) -> Self {
        Self {
            gate: Mutex::new(Gate {
                capacity,
                held: 0,
                closed: false,
            }),
            changed: Notify::new(),
            wait_pause: wait_pause.max(MIN_WAIT_PAUSE),
            retry_window: DEFAULT_RETRY_WINDOW,
            deadlock_timeout: None,
        }
    }

    /// Override the per-token retry window of [`Semaphore::acquire`].
    pub fn with_retry_window(mut self, window: Duration) -> Self {
        self.retry_window = window;
        self
    }

    /// Panic when a single acquire call takes longer than `limit`.
    ///
    /// Meant for development builds, where a stuck acquire is almost always
    /// a missing release.
    pub fn with_deadlock_guard(mut self, limit: Duration) -> Self {
        self.deadlock_timeout = Some(limit);
        self
    }

    /// Acquire `n` tokens, waiting as long as it takes.
    ///
    /// Returns immediately once the semaphore is closed, including when it
    /// closes partway through.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero while the semaphore is open, or if the deadlock
    /// guard is enabled and the call exceeded it.
    pub async fn acquire(&self, n: usize) {
        let start = Instant::now();
        if n == 0 && !self.is_closed() {
            panic!("Semaphore::acquire: n < 1");
        }

        let mut obtained = 0;
        while obtained < n {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            match self.take_one() {
                Take::Taken => {
                    obtained += 1;
                    continue;
                }
                Take::Closed => break,
                Take::Full => {}
            }

            if timeout(self.retry_window, notified).await.is_err() {
                trace!(obtained = obtained, wanted = n, "Acquire window elapsed, retrying");
            }
        }

        self.check_deadlock("acquire", start);
    }

    /// Acquire up to `n` tokens without waiting.
    ///
    /// Returns whether all `n` were obtained and how many were. Tokens taken
    /// by a partial attempt stay held; release them if they are of no use.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero while the semaphore is open.
    pub fn try_acquire(&self, n: usize) -> (bool, usize) {
        let start = Instant::now();
        let mut gate = self.gate.lock();
        if gate.closed {
            return (false, 0);
        }
        if n == 0 {
            drop(gate);
            panic!("Semaphore::try_acquire: n < 1");
        }

        let available = gate.capacity.saturating_sub(gate.held);
        let locked = n.min(available);
        gate.held += locked;
        drop(gate);

        self.check_deadlock("try_acquire", start);
        (locked >= n, locked)
    }

    /// Return `n` tokens to the pool. Does nothing once closed.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero or larger than the number of held tokens.
    pub fn release(&self, n: usize) {
        let mut gate = self.gate.lock();
        if gate.closed {
            return;
        }
        if n == 0 {
            drop(gate);
            panic!("Semaphore::release: n < 1");
        }
        if n > gate.held {
            let held = gate.held;
            drop(gate);
            panic!("Semaphore::release: n ({n}) > held ({held})");
        }

        gate.held -= n;
        drop(gate);
        self.changed.notify_waiters();
    }

    /// Change the capacity, keeping the tokens currently held.
    ///
    /// Shrinking below the held count leaves pending acquirers waiting
    /// until enough tokens are released.
    pub fn resize(&self, capacity: usize) {
        let mut gate = self.gate.lock();
        if gate.closed {
            return;
        }
        if capacity < gate.held {
            warn!(
                capacity = capacity,
                held = gate.held,
                "Semaphore shrunk below held tokens"
            );
        }
        debug!(from = gate.capacity, to = capacity, "Resizing semaphore");
        gate.capacity = capacity;
        drop(gate);
        self.changed.notify_waiters();
    }

    /// Close the semaphore. Idempotent.
    pub fn close(&self) {
        let mut gate = self.gate.lock();
        if gate.closed {
            return;
        }
        gate.closed = true;
        drop(gate);
        self.changed.notify_waiters();
    }

    /// Wait until at most `n` tokens are held or the semaphore closes.
    ///
    /// `wait_for_level(0)` waits for the pool to drain.
    pub async fn wait_for_level(&self, n: usize) {
        let running = AtomicBool::new(true);
        self.wait_for_level_or_stopped(n, &running).await;
    }

    /// Like [`Semaphore::wait_for_level`], but also returns once `liveness`
    /// reports that the caller stopped.
    pub async fn wait_for_level_or_stopped<L>(&self, n: usize, liveness: &L)
    where
        L: Liveness + ?Sized,
    {
        sleep(FIRST_CHECK_DELAY).await;
        if self.level_reached(n) || !liveness.is_running() {
            return;
        }

        sleep(Duration::from_millis(1) + self.wait_pause / 10).await;
        while !self.level_reached(n) && liveness.is_running() {
            sleep(self.wait_pause).await;
        }
    }

    /// Number of tokens currently held.
    pub fn len(&self) -> usize {
        self.gate.lock().held
    }

    /// Returns true if no tokens are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity.
    pub fn cap(&self) -> usize {
        self.gate.lock().capacity
    }

    /// Returns true if tokens are held and none are left.
    pub fn is_full(&self) -> bool {
        let gate = self.gate.lock();
        gate.held > 0 && gate.held >= gate.capacity
    }

    /// Returns true once [`Semaphore::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.gate.lock().closed
    }

    fn take_one(&self) -> Take {
        let mut gate = self.gate.lock();
        if gate.closed {
            Take::Closed
        } else if gate.held < gate.capacity {
            gate.held += 1;
            Take::Taken
        } else {
            Take::Full
        }
    }

    fn level_reached(&self, n: usize) -> bool {
        let gate = self.gate.lock();
        gate.closed || gate.held <= n
    }

    fn check_deadlock(&self, op: &str, start: Instant) {
        if let Some(limit) = self.deadlock_timeout {
            let elapsed = start.elapsed();
            if elapsed > limit {
                panic!("Semaphore::{op}: deadlock guard tripped after {elapsed:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn semaphore(capacity: usize) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(capacity, MIN_WAIT_PAUSE))
    }

    #[test]
    fn test_wait_pause_floor() {
        let sem = Semaphore::new(1, Duration::from_millis(1));
        assert_eq!(sem.wait_pause, MIN_WAIT_PAUSE);
    }

    #[test]
    fn test_try_acquire_partial_keeps_tokens() {
        let sem = semaphore(3);
        assert_eq!(sem.try_acquire(2), (true, 2));
        assert_eq!(sem.try_acquire(2), (false, 1));
        assert_eq!(sem.len(), 3);
        assert!(sem.is_full());

        sem.release(3);
        assert!(sem.is_empty());
        assert!(!sem.is_full());
    }

    #[test]
    fn test_is_full_needs_held_tokens() {
        let sem = semaphore(0);
        assert!(!sem.is_full());
    }

    #[test]
    fn test_closed_gate_is_inert() {
        let sem = semaphore(2);
        sem.try_acquire(1);
        sem.close();
        sem.close();

        assert!(sem.is_closed());
        assert_eq!(sem.try_acquire(1), (false, 0));
        assert_eq!(sem.try_acquire(0), (false, 0));
        sem.release(5);
        sem.resize(10);
        assert_eq!(sem.cap(), 2);
    }

    #[test]
    #[should_panic(expected = "n (2) > held (1)")]
    fn test_over_release_panics() {
        let sem = semaphore(2);
        sem.try_acquire(1);
        sem.release(2);
    }

    #[test]
    #[should_panic(expected = "n < 1")]
    fn test_zero_release_panics() {
        let sem = semaphore(2);
        sem.release(0);
    }

    #[tokio::test]
    #[should_panic(expected = "n < 1")]
    async fn test_zero_acquire_panics() {
        let sem = semaphore(2);
        sem.acquire(0).await;
    }

    #[tokio::test]
    async fn test_acquire_on_closed_returns_immediately() {
        let sem = semaphore(0);
        sem.close();
        let result = timeout(Duration::from_millis(100), sem.acquire(3)).await;
        assert!(result.is_ok());
        assert_eq!(sem.len(), 0);
    }

    #[test]
    fn test_resize_up_while_full() {
        let sem = semaphore(2);
        assert_eq!(sem.try_acquire(2), (true, 2));
        assert_eq!(sem.try_acquire(1), (false, 0));

        sem.resize(4);
        assert_eq!(sem.cap(), 4);
        assert_eq!(sem.len(), 2);
        assert_eq!(sem.try_acquire(2), (true, 2));
    }

    #[test]
    fn test_resize_down_keeps_held() {
        let sem = semaphore(4);
        sem.try_acquire(3);
        sem.resize(2);
        assert_eq!(sem.len(), 3);
        assert_eq!(sem.try_acquire(1), (false, 0));

        sem.release(2);
        assert_eq!(sem.try_acquire(1), (true, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_acquire_waits_for_release() {
        let sem = semaphore(1);
        sem.acquire(1).await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(1).await })
        };

        sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        sem.release(1);
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(sem.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_resize_wakes_waiter() {
        let sem = semaphore(1);
        sem.acquire(1).await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(2).await })
        };

        sleep(Duration::from_millis(50)).await;
        sem.resize(3);
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(sem.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_close_wakes_waiter() {
        let sem = semaphore(1);
        sem.acquire(1).await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(1).await })
        };

        sleep(Duration::from_millis(50)).await;
        sem.close();
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_short_retry_window_still_acquires() {
        let sem = Arc::new(
            Semaphore::new(1, MIN_WAIT_PAUSE).with_retry_window(Duration::from_millis(5)),
        );
        sem.acquire(1).await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move { sem.acquire(1).await })
        };

        sleep(Duration::from_millis(40)).await;
        sem.release(1);
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[should_panic(expected = "deadlock guard")]
    async fn test_deadlock_guard_trips() {
        let sem = Arc::new(
            Semaphore::new(1, MIN_WAIT_PAUSE)
                .with_retry_window(Duration::from_millis(10))
                .with_deadlock_guard(Duration::from_millis(20)),
        );
        sem.acquire(1).await;

        let releaser = sem.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            releaser.release(1);
        });

        sem.acquire(1).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_for_level() {
        let sem = semaphore(4);
        sem.try_acquire(3);

        let releaser = sem.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            releaser.release(3);
        });

        tokio_test::assert_ok!(timeout(Duration::from_secs(2), sem.wait_for_level(0)).await);
        assert!(sem.is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_level_already_reached() {
        let sem = semaphore(4);
        sem.try_acquire(1);
        tokio_test::assert_ok!(timeout(Duration::from_millis(100), sem.wait_for_level(1)).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_for_level_or_stopped() {
        let sem = semaphore(2);
        sem.try_acquire(2);

        let running = Arc::new(AtomicBool::new(true));
        let stopper = running.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            stopper.store(false, Ordering::SeqCst);
        });

        tokio_test::assert_ok!(
            timeout(
                Duration::from_secs(2),
                sem.wait_for_level_or_stopped(0, running.as_ref())
            )
            .await
        );
        assert_eq!(sem.len(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_level_returns_on_close() {
        let sem = semaphore(1);
        sem.try_acquire(1);
        let token = CancellationToken::new();
        sem.close();
        tokio_test::assert_ok!(
            timeout(
                Duration::from_millis(200),
                sem.wait_for_level_or_stopped(0, &token)
            )
            .await
        );
    }
}
