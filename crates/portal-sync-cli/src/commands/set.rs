//! Set command handler

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use portal_sync_core::SyncContext;

use super::parse_resource;
use crate::output::Output;

/// Write a JSON value through the caches and push it to the remote store
///
/// The remote write is always awaited so the process does not exit under
/// it. A rejected remote write is an error with `--wait` and a warning
/// otherwise; the local value is written either way.
pub async fn set(
    ctx: &Arc<SyncContext>,
    name: &str,
    raw_value: &str,
    user: Option<String>,
    wait: bool,
    output: &Output,
) -> Result<()> {
    let resource = parse_resource(name, user)?;
    let value: Value = serde_json::from_str(raw_value)
        .with_context(|| format!("Value for '{}' is not valid JSON", resource))?;

    let ack = ctx.binding().write(&resource, value);
    info!(resource = %resource, wait, "Local write done, waiting for remote");
    match ack.wait().await {
        Ok(()) => output.success(&format!("Set {} (remote acknowledged)", resource)),
        Err(e) if wait => {
            return Err(e).with_context(|| format!("Remote write of '{}' failed", resource));
        }
        Err(e) => {
            output.warn(&format!("Remote write of '{}' failed: {}", resource, e));
            output.success(&format!("Set {} (local only)", resource));
        }
    }

    Ok(())
}
