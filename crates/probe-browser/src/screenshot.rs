//! Failure screenshots written as artifacts

use crate::driver::Driver;
use chrono::Utc;
use probe_core::{ProbeError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Capture the viewport into `dir` as `{timestamp}-{label}.png`
pub async fn capture_to(driver: &dyn Driver, dir: &Path, label: &str) -> Result<PathBuf> {
    let data = driver.screenshot().await?;

    fs::create_dir_all(dir).await.map_err(|e| {
        ProbeError::Other(format!(
            "Failed to create artifact directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S%3f");
    let path = dir.join(format!("{}-{}.png", timestamp, sanitize(label)));
    fs::write(&path, &data).await?;

    info!("Screenshot stored: {} ({} bytes)", path.display(), data.len());
    Ok(path)
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let trimmed = cleaned.trim_matches('-');
    if trimmed.is_empty() {
        "page".to_string()
    } else {
        trimmed.to_string()
    }
}
