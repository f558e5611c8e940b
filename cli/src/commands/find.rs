//! Find command - probe a range for the server's port.

use anyhow::{bail, Result};
use portfinder_core::{
    Discovery, HttpStatusCheck, PortCheck, PortFinder, Settings, SettingsStore, TcpConnectCheck,
};
use serde::Serialize;

use super::Overrides;

/// JSON output of a successful run.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FindOutput<'a> {
    host: &'a str,
    port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary_port: Option<u16>,
}

pub async fn run(store: &SettingsStore, overrides: Overrides, json: bool) -> Result<()> {
    let mut settings = store.load().await?;
    overrides.apply(&mut settings);

    let result = match &settings.http_path {
        Some(path) => {
            let mut check = HttpStatusCheck::new(&settings.host, path, settings.timeout())?;
            if let Some(field) = &settings.secondary_field {
                check = check.with_secondary_field(field);
            }
            discover(&settings, check).await
        }
        None => {
            if settings.secondary_field.is_some() {
                tracing::warn!("Secondary field ignored without an HTTP status path");
            }
            discover(&settings, TcpConnectCheck::new(&settings.host, settings.timeout())).await
        }
    };

    let found = match result {
        Ok(found) => found,
        Err(e) if e.is_not_found() => bail!(
            "No server found on {} in ports {}..{}",
            settings.host,
            settings.port_start,
            settings.port_end
        ),
        Err(e) => return Err(e.into()),
    };

    if json {
        let output = FindOutput {
            host: &settings.host,
            port: found.port,
            secondary_port: found.secondary_port,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Server found on {}: {}", settings.host, found);
    Ok(())
}

async fn discover<C: PortCheck>(
    settings: &Settings,
    check: C,
) -> portfinder_core::Result<Discovery> {
    let mut finder =
        PortFinder::new(settings.port_range()?, check).with_queue_capacity(settings.queue_capacity);
    if let Some(max) = settings.max_in_flight {
        finder = finder.with_max_in_flight(max);
    }

    tracing::info!(
        host = %settings.host,
        start = settings.port_start,
        end = settings.port_end,
        "Searching for server"
    );
    finder.find().await
}
