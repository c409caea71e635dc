//! Keys command handler

use anyhow::Result;

use portal_sync_core::{PrivateResource, SharedResource};

use crate::output::{KeyRow, Output};

/// List every registered resource
pub fn list(output: &Output) -> Result<()> {
    output.print_keys(&rows());
    Ok(())
}

fn rows() -> Vec<KeyRow> {
    let shared = SharedResource::ALL.iter().map(|r| KeyRow {
        name: r.logical_key(),
        scope: "shared",
        local_key: r.local_key().to_string(),
        remote_key: r.remote_key(),
        fallback: r.fallback(),
    });
    let private = PrivateResource::ALL.iter().map(|r| KeyRow {
        name: r.suffix(),
        scope: "private",
        local_key: r.local_key("{user}"),
        remote_key: r.suffix(),
        fallback: r.fallback(),
    });
    shared.chain(private).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_registry() {
        let rows = rows();
        assert_eq!(
            rows.len(),
            SharedResource::ALL.len() + PrivateResource::ALL.len()
        );
        let results = rows.iter().find(|r| r.name == "results").unwrap();
        assert_eq!(results.local_key, "results-for-{user}");
        assert_eq!(results.scope, "private");
    }
}
