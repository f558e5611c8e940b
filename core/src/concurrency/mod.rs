//! Concurrency primitives used by discovery runs.
//!
//! - `ResponseQueue`: bounded, closable queue carrying probe outcomes
//! - `Semaphore`: resizable token pool for capping concurrent work

mod response_queue;
mod semaphore;

pub use response_queue::{ResponseQueue, DEFAULT_QUEUE_CAPACITY};
pub use semaphore::{
    Liveness, Semaphore, DEFAULT_DEADLOCK_TIMEOUT, DEFAULT_RETRY_WINDOW, MIN_WAIT_PAUSE,
};
