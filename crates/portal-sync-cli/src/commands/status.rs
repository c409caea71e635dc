//! Status command handler

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use portal_sync_core::{Config, SyncContext};

use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(ctx: &Arc<SyncContext>, config: &Config, output: &Output) -> Result<()> {
    let storage = ctx.storage_status();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "remote_enabled": config.remote_enabled,
                    "remote_url": config.active_remote_url(),
                    "remote_timeout_secs": config.remote_timeout_secs,
                    "storage": {
                        "location": config.cache_db_path(),
                        "persistent_enabled": config.persistent_cache,
                        "persistent_available": storage.persistent_available,
                        "cached_keys": storage.persistent_keys,
                        "last_updated": storage.last_updated,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            for key in &storage.persistent_keys {
                println!("{}", key);
            }
        }
        OutputFormat::Human => {
            println!("Portal Sync Status");
            println!("==================");
            println!();
            println!("Remote:");
            match config.active_remote_url() {
                Some(url) => {
                    println!("  Status:  enabled");
                    println!("  Server:  {}", url);
                    println!("  Timeout: {}s", config.remote_timeout_secs);
                }
                None => println!("  Status:  offline"),
            }
            println!();
            println!("Persistent cache:");
            println!("  Location:  {}", config.cache_db_path().display());
            println!(
                "  Available: {}",
                if storage.persistent_available {
                    "yes"
                } else if config.persistent_cache {
                    "no (probe failed, running memory-only)"
                } else {
                    "no (disabled)"
                }
            );
            if let Some(at) = storage.last_updated {
                println!(
                    "  Last write: {}",
                    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!();
            println!("Cached keys ({}):", storage.persistent_keys.len());
            for key in &storage.persistent_keys {
                println!("  {}", key);
            }
        }
    }

    Ok(())
}
