use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "consulta.toml";

/// Keys that live next to the source entries in the flattened aggregate.
const RESERVED_SOURCE_NAMES: &[&str] = &["nuc", "success", "debug", "archivo_guardado"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the saved queries. Defaults to `<data_dir>/consultas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept")]
    pub accept: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}
fn default_accept() -> String {
    "application/json".to_string()
}
fn default_page_size() -> u32 {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}

fn default_sources() -> Vec<SourceConfig> {
    [
        (
            "decisiones",
            "https://api.poderjudicial.gob.do/Decisiones/Decisiones/ObtenerDecisiones",
        ),
        (
            "casos",
            "https://api.poderjudicial.gob.do/Casos/Tramite/ObtenerDatosPorNuc",
        ),
        (
            "audiencias",
            "https://api.poderjudicial.gob.do/Audiencias/Audiencias/ObtenerAudienciasPorNuc",
        ),
    ]
    .into_iter()
    .map(|(name, url)| SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        page_size: default_page_size(),
    })
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            accept: default_accept(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            upstream: UpstreamConfig::default(),
            sources: default_sources(),
            log_level: default_log_level(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    /// Reads `path` if it exists, otherwise falls back to the built-in
    /// defaults. The result is always validated. Does not log: the caller
    /// installs the subscriber from the loaded level first.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("at least one upstream source must be configured");
        }
        if self.upstream.timeout_secs == 0 {
            bail!("upstream.timeout_secs must be greater than zero");
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name.trim();
            if name.is_empty() {
                bail!("source names must not be empty");
            }
            if RESERVED_SOURCE_NAMES.contains(&name) {
                bail!("source name '{}' is reserved", name);
            }
            if !seen.insert(name) {
                bail!("duplicate source name '{}'", name);
            }
            if source.url.trim().is_empty() {
                bail!("source '{}' has no url", name);
            }
            if source.page_size == 0 {
                bail!("source '{}' must have a page_size of at least 1", name);
            }
        }
        Ok(())
    }

    /// Storage directory, resolved against the data dir when not set.
    pub fn storage_dir(&self, data_dir: &Path) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| data_dir.join("consultas"))
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
