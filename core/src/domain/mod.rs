//! Domain layer - Data models of a discovery run.
//!
//! These types have no I/O dependencies and can be tested in isolation.

mod outcome;

pub use outcome::{Discovery, ProbeOutcome};
