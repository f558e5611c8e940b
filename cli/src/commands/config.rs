//! Config command - show and store discovery settings.

use anyhow::Result;
use portfinder_core::SettingsStore;

use super::Overrides;

pub async fn show(store: &SettingsStore, json: bool) -> Result<()> {
    let settings = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("Settings file:   {}", store.path().display());
    println!("Host:            {}", settings.host);
    println!(
        "Port range:      {}..{}",
        settings.port_start, settings.port_end
    );
    println!("Timeout:         {} ms", settings.timeout_ms);
    println!("Queue capacity:  {}", settings.queue_capacity);
    println!(
        "Max in flight:   {}",
        settings
            .max_in_flight
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
    );
    println!(
        "Probe:           {}",
        settings
            .http_path
            .as_deref()
            .map_or_else(|| "tcp connect".to_string(), |path| format!("GET {}", path))
    );
    if let Some(field) = &settings.secondary_field {
        println!("Secondary field: {}", field);
    }

    Ok(())
}

pub async fn set(store: &SettingsStore, overrides: Overrides) -> Result<()> {
    let mut settings = store.load().await?;
    overrides.apply(&mut settings);
    settings.validate()?;

    store.save(&settings).await?;
    println!("Saved settings to {}", store.path().display());
    Ok(())
}
