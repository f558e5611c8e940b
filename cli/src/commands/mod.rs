//! CLI subcommands.

pub mod config;
pub mod find;

use clap::Args;
use portfinder_core::Settings;

/// Settings that can be overridden from the command line.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Host to probe
    #[arg(long)]
    host: Option<String>,

    /// First port of the range
    #[arg(short, long)]
    start: Option<u16>,

    /// End of the range (exclusive)
    #[arg(short, long)]
    end: Option<u16>,

    /// Per-probe timeout in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Probe this HTTP status path instead of a plain TCP connect
    #[arg(long, value_name = "PATH")]
    http: Option<String>,

    /// JSON field of the status response holding a secondary port
    #[arg(long, requires = "http")]
    secondary_field: Option<String>,

    /// Maximum number of probes running at once
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Outcomes buffered before dispatch waits
    #[arg(long)]
    queue_capacity: Option<usize>,
}

impl Overrides {
    /// Apply every override that was given on top of `settings`.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(start) = self.start {
            settings.port_start = start;
        }
        if let Some(end) = self.end {
            settings.port_end = end;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            settings.timeout_ms = timeout_ms;
        }
        if let Some(path) = self.http {
            settings.http_path = Some(path);
        }
        if let Some(field) = self.secondary_field {
            settings.secondary_field = Some(field);
        }
        if let Some(max) = self.max_in_flight {
            settings.max_in_flight = Some(max);
        }
        if let Some(capacity) = self.queue_capacity {
            settings.queue_capacity = capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_only_given_overrides() {
        let mut settings = Settings::default();
        let overrides = Overrides {
            start: Some(9000),
            end: Some(9010),
            http: Some("/status".to_string()),
            ..Overrides::default()
        };

        overrides.apply(&mut settings);
        assert_eq!(settings.port_range().unwrap(), 9000..9010);
        assert_eq!(settings.http_path.as_deref(), Some("/status"));
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.timeout_ms, 500);
    }
}
