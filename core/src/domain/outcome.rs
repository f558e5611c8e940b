//! Probe outcome and discovery result models.

use serde::{Deserialize, Serialize};

use crate::error::ProbeError;
use crate::ports::CheckResult;

/// The recorded result of checking one port.
///
/// Built by a probe task right after the check returns and consumed once by
/// the aggregation loop.
#[derive(Debug)]
pub struct ProbeOutcome {
    /// The candidate port that was checked.
    pub port: u16,
    /// Extra value the check reported alongside success (e.g. a proxy port).
    pub secondary_port: Option<u16>,
    /// Set when the check failed.
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    /// Build an outcome from what the check returned.
    pub fn from_check(port: u16, result: CheckResult) -> Self {
        match result {
            Ok(secondary_port) => Self::success(port, secondary_port),
            Err(error) => Self::failure(port, error),
        }
    }

    /// A successful outcome.
    pub fn success(port: u16, secondary_port: Option<u16>) -> Self {
        Self {
            port,
            secondary_port,
            error: None,
        }
    }

    /// A failed outcome.
    pub fn failure(port: u16, error: ProbeError) -> Self {
        Self {
            port,
            secondary_port: None,
            error: Some(error),
        }
    }

    /// Whether the check succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The port a discovery run located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discovery {
    /// The port the server answered on.
    pub port: u16,
    /// Secondary value reported by the successful check, if any.
    pub secondary_port: Option<u16>,
}

impl std::fmt::Display for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.secondary_port {
            Some(secondary) => write!(f, "Port {} (secondary {})", self.port, secondary),
            None => write!(f, "Port {}", self.port),
        }
    }
}
