use anyhow::Result;
use console::style;
use std::path::Path;

use super::{BuscarArgs, build_service, load_config};
use crate::core::terminal::{print_error, print_status, print_success, print_warn, styled_status};

/// One-shot search from the terminal, stored like any API search.
pub async fn run_buscar(data_dir: &Path, args: BuscarArgs) -> Result<()> {
    let config = load_config(data_dir, args.config.as_deref()).await?;
    let service = build_service(&config, data_dir).await?;

    let outcome = service
        .handle(&args.nuc, args.pagina, args.registros)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!(
        "\n {} {}\n",
        style("NUC").bold(),
        style(&outcome.aggregate.query_key).cyan()
    );
    for (name, code) in &outcome.aggregate.source_statuses {
        let entry = &outcome.aggregate.sources[name];
        let detail = if *code == 200 {
            match entry.get("datos").and_then(|d| d.as_array()) {
                Some(datos) => format!("{} registro(s)", datos.len()),
                None => "ok".to_string(),
            }
        } else {
            entry
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("error")
                .to_string()
        };
        print_status(name, &format!("{} {}", styled_status(*code), detail));
    }
    println!();

    if outcome.aggregate.source_statuses.values().all(|c| *c == 200) {
        print_success(&format!("Saved as {}", outcome.identifier));
    } else if outcome.aggregate.source_statuses.values().any(|c| *c == 200) {
        print_warn(&format!(
            "Some sources failed. Saved as {}",
            outcome.identifier
        ));
    } else {
        print_error(&format!(
            "Every source failed. Saved as {}",
            outcome.identifier
        ));
    }
    Ok(())
}
