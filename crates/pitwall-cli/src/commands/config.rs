//! Config command handlers

use anyhow::{bail, Context, Result};

use pitwall_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "relay_url": config.relay_url,
                    "relay_enabled": config.relay_enabled,
                    "relay_poll_secs": config.relay_poll_secs,
                    "heartbeat_ms": config.heartbeat_ms,
                    "broadcast_ms": config.broadcast_ms,
                    "watchdog_timeout_ms": config.watchdog_timeout_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:        {}", config.data_dir.display());
            println!(
                "  relay_url:       {}",
                config.relay_url.as_deref().unwrap_or("(not set)")
            );
            println!("  relay_enabled:   {}", config.relay_enabled);
            println!("  relay_poll_secs: {}", config.relay_poll_secs);
            println!("  heartbeat_ms:    {}", config.heartbeat_ms);
            println!("  broadcast_ms:    {}", config.broadcast_ms);
            println!("  watchdog_timeout_ms: {}", config.watchdog_timeout_ms);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Print the config file path
pub fn path() -> Result<()> {
    println!("{}", Config::config_file_path().display());
    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    match key.as_str() {
        "data_dir" => {
            config.data_dir = value.clone().into();
        }
        "relay_url" => {
            config.relay_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        "relay_enabled" => {
            config.relay_enabled = value
                .parse()
                .context("Invalid value for relay_enabled. Use 'true' or 'false'.")?;
        }
        "relay_poll_secs" => {
            config.relay_poll_secs = value
                .parse()
                .context("Invalid value for relay_poll_secs. Use a number of seconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, relay_url, relay_enabled, relay_poll_secs",
                key
            );
        }
    }

    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}
