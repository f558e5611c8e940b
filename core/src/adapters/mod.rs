//! Adapters layer - External system implementations.
//!
//! This module contains implementations of the port traits defined in `ports`.

pub mod probe;

// Re-export main types for convenience
pub use probe::{HttpStatusCheck, TcpConnectCheck};
