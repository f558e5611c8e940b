//! Ports layer - Trait definitions (interfaces).
//!
//! The finder only knows about these traits; concrete probes live in
//! `adapters` or are supplied by the caller.

mod check;

pub use check::{CheckResult, PortCheck};
