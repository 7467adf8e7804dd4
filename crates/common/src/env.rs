//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected files and directories exist at startup.

use tracing::warn;

/// Ensure the credential data directory exists; warn when the config file is missing.
pub async fn ensure_env(config_path: &str, data_dir: &str) -> anyhow::Result<()> {
    if tokio::fs::metadata(config_path).await.is_err() {
        warn!(%config_path, "config file not found; built-in defaults will be used");
    }
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {data_dir}: {e}"))?;
    Ok(())
}
