//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use portal_sync_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "remote_url": config.remote_url,
                    "remote_enabled": config.remote_enabled,
                    "remote_timeout_secs": config.remote_timeout_secs,
                    "persistent_cache": config.persistent_cache
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:            {}", config.data_dir.display());
            println!(
                "  remote_url:          {}",
                config.remote_url.as_deref().unwrap_or("(not set)")
            );
            println!("  remote_enabled:      {}", config.remote_enabled);
            println!("  remote_timeout_secs: {}", config.remote_timeout_secs);
            println!("  persistent_cache:    {}", config.persistent_cache);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;
    config
        .validate()
        .with_context(|| format!("Not saving {} = {}", key, value))?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "remote_url" => {
            config.remote_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }
        "remote_enabled" => {
            config.remote_enabled = value
                .parse()
                .context("Invalid value for remote_enabled. Use 'true' or 'false'.")?;
        }
        "remote_timeout_secs" => {
            config.remote_timeout_secs = value
                .parse()
                .context("Invalid value for remote_timeout_secs. Use a whole number of seconds.")?;
        }
        "persistent_cache" => {
            config.persistent_cache = value
                .parse()
                .context("Invalid value for persistent_cache. Use 'true' or 'false'.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, remote_url, remote_enabled, remote_timeout_secs, persistent_cache",
                key
            );
        }
    }
    Ok(())
}
