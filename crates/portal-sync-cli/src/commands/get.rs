//! Get command handler

use std::sync::Arc;

use anyhow::Result;

use portal_sync_core::SyncContext;

use super::parse_resource;
use crate::output::Output;

/// Print the local value of a resource, or its fallback if nothing is cached
pub fn get(ctx: &Arc<SyncContext>, name: &str, user: Option<String>, output: &Output) -> Result<()> {
    let resource = parse_resource(name, user)?;
    let value = ctx.binding().read(&resource);
    output.print_value(&resource.to_string(), &value);
    Ok(())
}
