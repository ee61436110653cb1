mod historial;
mod init;
mod query;
mod serve;

use anyhow::{Result, bail};
use console::style;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::aggregator::Aggregator;
use crate::core::config::{AppConfig, CONFIG_FILE_NAME};
use crate::core::query::QueryService;
use crate::core::store::ResponseStore;
use crate::core::terminal::{self, print_command, print_error};
use crate::core::upstream::UpstreamClient;

fn print_help() {
    terminal::print_banner();

    println!(" {}", style("Commands").bold());
    print_command("serve [--host H] [--port P]", "Start the HTTP API");
    print_command(
        "buscar --nuc N [--pagina P] [--registros R]",
        "Query every source once and save the result",
    );
    print_command("historial [archivo]", "List saved queries or show one");
    print_command("init", "Write a default config and create the data directory");
    print_command("help", "Show this message");

    println!(
        "\n {} {} <command> [--config <file>] [options]\n",
        style("Usage:").bold(),
        style("consulta").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ServeArgs {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct BuscarArgs {
    pub nuc: String,
    pub pagina: Option<u32>,
    pub registros: Option<u32>,
    pub json: bool,
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct HistorialArgs {
    pub identifier: Option<String>,
    pub config: Option<PathBuf>,
}

pub(crate) fn parse_serve_args(args: &[String], start: usize) -> ServeArgs {
    let mut parsed = ServeArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                if i + 1 < args.len() {
                    parsed.host = Some(args[i + 1].clone());
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    parsed.port = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    parsed
}

pub(crate) fn parse_buscar_args(args: &[String], start: usize) -> BuscarArgs {
    let mut parsed = BuscarArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--nuc" | "-n" => {
                if i + 1 < args.len() {
                    parsed.nuc = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--pagina" => {
                if i + 1 < args.len() {
                    parsed.pagina = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--registros" => {
                if i + 1 < args.len() {
                    parsed.registros = args[i + 1].parse().ok();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            other => {
                // `consulta buscar 199-2020-ELAB-00094` works too.
                if parsed.nuc.is_empty() && !other.starts_with('-') {
                    parsed.nuc = other.to_string();
                }
                i += 1;
            }
        }
    }
    parsed
}

pub(crate) fn parse_historial_args(args: &[String], start: usize) -> HistorialArgs {
    let mut parsed = HistorialArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    i += 1;
                }
            }
            other => {
                if parsed.identifier.is_none() && !other.starts_with('-') {
                    parsed.identifier = Some(other.to_string());
                }
                i += 1;
            }
        }
    }
    parsed
}

pub(crate) fn config_path(data_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates the config, then installs the log subscriber at the
/// configured level.
pub(crate) async fn load_config(data_dir: &Path, explicit: Option<&Path>) -> Result<AppConfig> {
    let path = config_path(data_dir, explicit);
    let found = path.exists();
    let config = AppConfig::load(&path).await?;
    crate::logging::init(config.log_level());
    if found {
        info!(
            "Loaded config from {}: {} source(s), timeout={}s",
            path.display(),
            config.sources.len(),
            config.upstream.timeout_secs
        );
    } else {
        info!(
            "No {} found at {}, using default sources.",
            CONFIG_FILE_NAME,
            path.display()
        );
    }
    Ok(config)
}

pub(crate) async fn build_service(config: &AppConfig, data_dir: &Path) -> Result<QueryService> {
    let client = UpstreamClient::new(&config.upstream)?;
    let aggregator = Aggregator::new(client, config.sources.clone())?;
    let store = ResponseStore::open(config.storage_dir(data_dir)).await?;
    Ok(QueryService::new(aggregator, store))
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    run(&args, &crate::platform::data_dir()).await
}

async fn run(args: &[String], data_dir: &Path) -> Result<()> {
    let cmd = args.get(1).map(String::as_str).unwrap_or("help");
    match cmd {
        "serve" => serve::run_serve(data_dir, parse_serve_args(args, 2)).await,
        "buscar" => {
            let parsed = parse_buscar_args(args, 2);
            if parsed.nuc.trim().is_empty() {
                print_help();
                bail!("--nuc is required for buscar");
            }
            query::run_buscar(data_dir, parsed).await
        }
        "historial" => historial::run_historial(data_dir, parse_historial_args(args, 2)).await,
        "init" => {
            let parsed = parse_serve_args(args, 2);
            init::run_init(data_dir, parsed.config.as_deref()).await
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'.", other));
            print_help();
            Ok(())
        }
    }
}
