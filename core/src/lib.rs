//! PortFinder Core Library
//!
//! Locates the port a network server listens on when it is not known in
//! advance, by probing every port of a range concurrently and returning the
//! first one that answers.
//!
//! # Architecture
//! - `domain`: Probe outcomes and discovery results
//! - `ports`: The `PortCheck` trait probes implement
//! - `adapters`: Ready-made TCP and HTTP probes
//! - `concurrency`: Response queue and counting semaphore
//! - `finder`: The probing engine
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//! use portfinder_core::{PortFinder, TcpConnectCheck};
//!
//! # async fn run() -> portfinder_core::Result<()> {
//! let check = TcpConnectCheck::new("127.0.0.1", Duration::from_millis(500));
//! let found = PortFinder::new(8900..18900, check).find().await?;
//! println!("Server port: {}", found.port);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod concurrency;
pub mod domain;
pub mod ports;

pub mod config;
pub mod error;
pub mod finder;

// Re-export domain types (primary API)
pub use domain::{Discovery, ProbeOutcome};

// Re-export other commonly used types
pub use adapters::{HttpStatusCheck, TcpConnectCheck};
pub use concurrency::{Liveness, ResponseQueue, Semaphore};
pub use config::{Settings, SettingsStore};
pub use error::{Error, ProbeError, QueueClosed, Result};
pub use finder::{find, PortFinder};
pub use ports::{CheckResult, PortCheck};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
