use anyhow::Result;
use console::style;
use std::path::Path;

use super::{HistorialArgs, load_config};
use crate::core::store::ResponseStore;
use crate::core::terminal::print_info;

pub async fn run_historial(data_dir: &Path, args: HistorialArgs) -> Result<()> {
    let config = load_config(data_dir, args.config.as_deref()).await?;
    let store = ResponseStore::open(config.storage_dir(data_dir)).await?;

    if let Some(identifier) = args.identifier {
        let record = store.get(&identifier).await?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let history = store.list().await?;
    if history.is_empty() {
        print_info("No saved queries yet.");
        return Ok(());
    }

    println!();
    for entry in &history {
        println!(
            "  {:<34} {:>9}  {}",
            style(&entry.captured_at).dim(),
            format!("{} B", entry.size),
            style(&entry.identifier).green()
        );
    }
    println!("\n  {} saved quer{}\n", history.len(), if history.len() == 1 { "y" } else { "ies" });
    Ok(())
}
