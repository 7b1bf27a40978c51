use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::defs::AggregatedContent;

/// Writes the collected content to `path` as four-space indented JSON.
///
/// The snapshot is an audit artifact only; nothing reads it back. A file
/// already at `path` is replaced.
pub async fn save_snapshot(content: &AggregatedContent, path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed to remove existing snapshot {}", path.display()))?;
        info!("Removed existing snapshot {}", path.display());
    }

    let json = to_indented_json(content)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;

    info!(
        "Saved snapshot of {} threads to {}",
        content.threads.len(),
        path.display()
    );
    Ok(())
}

fn to_indented_json(content: &AggregatedContent) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    content
        .serialize(&mut serializer)
        .context("failed to serialize aggregated content")?;
    Ok(buf)
}
