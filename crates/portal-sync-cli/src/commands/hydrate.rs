//! Hydrate command handler

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use portal_sync_core::SyncContext;

use crate::output::Output;

/// Run the shared batch, then the private batch for `user` if given
pub async fn hydrate(ctx: &Arc<SyncContext>, user: Option<String>, output: &Output) -> Result<()> {
    let shared = ctx.hydrator().hydrate_shared().await;
    output.print_report(&shared);

    if let Some(user) = user {
        info!(user = %user, "Hydrating private resources");
        let private = ctx
            .login(&user)
            .await
            .with_context(|| format!("Failed to log in as '{}'", user))?;
        output.print_report(&private);
    }

    Ok(())
}
