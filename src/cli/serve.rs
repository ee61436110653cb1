use anyhow::Result;
use console::style;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ServeArgs, build_service, load_config};
use crate::core::lifecycle::LifecycleManager;
use crate::core::terminal::{self, print_link, print_status};
use crate::interfaces::web::{ApiServer, ApiServerConfig};

pub async fn run_serve(data_dir: &Path, args: ServeArgs) -> Result<()> {
    let config = load_config(data_dir, args.config.as_deref()).await?;
    let service = Arc::new(build_service(&config, data_dir).await?);

    let api_host = args.host.unwrap_or_else(|| config.server.host.clone());
    let api_port = args.port.unwrap_or(config.server.port);

    let server = Arc::new(Mutex::new(ApiServer::new(ApiServerConfig {
        service: service.clone(),
        api_host,
        api_port,
    })));

    let mut lifecycle = LifecycleManager::new();
    lifecycle.attach(server.clone());
    lifecycle.start().await?;

    let addr = server.lock().await.local_addr();
    terminal::print_banner();
    if let Some(addr) = addr {
        print_link("API", &format!("http://{}/api", addr));
    }
    print_status(
        "Sources",
        &service
            .sources()
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
    print_status(
        "Storage",
        &config.storage_dir(data_dir).display().to_string(),
    );
    println!(
        "\n  Press {} to stop the server.\n",
        style("Ctrl+C").bold().yellow()
    );

    tokio::signal::ctrl_c().await?;
    lifecycle.shutdown().await?;
    Ok(())
}
