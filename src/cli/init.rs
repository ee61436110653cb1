use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use super::config_path;
use crate::core::config::AppConfig;
use crate::core::terminal::{self, print_status, print_success, print_warn};

/// Writes a default config (unless one exists) and creates the storage dir.
pub async fn run_init(data_dir: &Path, explicit: Option<&Path>) -> Result<()> {
    terminal::print_banner();
    let path = config_path(data_dir, explicit);

    let config = if path.exists() {
        print_warn(&format!(
            "{} already exists, leaving it untouched.",
            path.display()
        ));
        AppConfig::load(&path).await?
    } else {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let config = AppConfig::default();
        tokio::fs::write(&path, config.to_toml()?)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        print_success(&format!("Wrote {}", path.display()));
        config
    };

    let storage_dir = config.storage_dir(data_dir);
    tokio::fs::create_dir_all(&storage_dir)
        .await
        .with_context(|| format!("Failed to create {}", storage_dir.display()))?;
    print_status("Storage", &storage_dir.display().to_string());

    println!(
        "\n  Run {} to start the API.\n",
        style("consulta serve").cyan().bold()
    );
    Ok(())
}
