use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, Utc};
use std::cmp::Reverse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::{ConsultaError, Result};

const RECORD_PREFIX: &str = "consulta";
const RECORD_EXTENSION: &str = ".json";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A persisted query. Field aliases also accept records in the older
/// Spanish-keyed layout (`nuc_consultado`, `fecha_consulta`, `respuesta_api`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(alias = "nuc_consultado")]
    pub query_key: String,
    #[serde(alias = "fecha_consulta")]
    pub captured_at: String,
    #[serde(alias = "respuesta_api")]
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "nombre")]
    pub identifier: String,
    #[serde(rename = "fecha")]
    pub captured_at: String,
    #[serde(rename = "tamano")]
    pub size: u64,
}

/// Flat directory of JSON records, one file per saved query.
pub struct ResponseStore {
    dir: PathBuf,
}

impl ResponseStore {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            ConsultaError::storage(&format!("Failed to create {}", dir.display()), e)
        })?;
        Ok(Self { dir })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn save(&self, query_key: &str, body: &Value) -> Result<String> {
        self.save_at(query_key, body, Local::now()).await
    }

    /// Writes to a hidden temp file, then publishes it under its final name
    /// with a hard link. Linking fails on an existing name, so records are
    /// never overwritten and readers never see a partial file.
    pub(crate) async fn save_at(
        &self,
        query_key: &str,
        body: &Value,
        now: DateTime<Local>,
    ) -> Result<String> {
        let record = StoredRecord {
            query_key: query_key.to_string(),
            captured_at: now.to_rfc3339_opts(SecondsFormat::Micros, false),
            body: body.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| ConsultaError::storage("Failed to serialize record", e))?;

        let tmp_path = self
            .dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        if let Err(e) = write_synced(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ConsultaError::storage("Failed to write record", e));
        }

        let stem = format!(
            "{}_{}_{}",
            RECORD_PREFIX,
            sanitize_key(query_key),
            now.format("%Y%m%d_%H%M%S")
        );

        let mut published = None;
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let identifier = if attempt == 1 {
                format!("{stem}{RECORD_EXTENSION}")
            } else {
                format!("{stem}_{attempt}{RECORD_EXTENSION}")
            };
            match tokio::fs::hard_link(&tmp_path, self.dir.join(&identifier)).await {
                Ok(()) => {
                    published = Some(Ok(identifier));
                    break;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Record name {} taken, trying next suffix", identifier);
                }
                Err(e) => {
                    published = Some(Err(ConsultaError::storage("Failed to publish record", e)));
                    break;
                }
            }
        }

        if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
            warn!("Could not remove temp file {}: {}", tmp_path.display(), e);
        }

        let identifier = published.unwrap_or_else(|| {
            Err(ConsultaError::Storage(format!(
                "no free record name for {stem} after {MAX_NAME_ATTEMPTS} attempts"
            )))
        })?;
        info!("Saved query for NUC {} as {}", query_key, identifier);
        Ok(identifier)
    }

    /// Every readable record, newest first.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| ConsultaError::storage("Failed to read history directory", e))?;

        let mut history = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ConsultaError::storage("Failed to read history directory", e))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_record_name(&name) {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            match read_record(&entry.path()).await {
                Ok(record) => history.push(HistoryEntry {
                    identifier: name,
                    captured_at: record.captured_at,
                    size: metadata.len(),
                }),
                Err(e) => debug!("Skipping {} in history: {}", name, e),
            }
        }

        history.sort_by_cached_key(|entry| {
            Reverse((captured_instant(&entry.captured_at), entry.identifier.clone()))
        });
        Ok(history)
    }

    pub async fn get(&self, identifier: &str) -> Result<StoredRecord> {
        if !is_record_name(identifier)
            || identifier.contains(['/', '\\'])
            || identifier.contains("..")
        {
            return Err(not_found(identifier));
        }

        let path = self.dir.join(identifier);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(not_found(identifier)),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found(identifier)),
            Err(e) => return Err(ConsultaError::storage("Failed to stat record", e)),
        }

        read_record(&path).await.map_err(|e| {
            ConsultaError::storage(&format!("Failed to read record {}", identifier), e)
        })
    }
}

/// Absolute instant of a `captured_at` value. Offsets are honored, and
/// offset-less legacy timestamps are read as local time. Unparseable values
/// yield `None` and sort after everything else.
fn captured_instant(captured_at: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(captured_at) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(captured_at, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()?
        .and_local_timezone(Local)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

fn not_found(identifier: &str) -> ConsultaError {
    ConsultaError::NotFound(format!("Archivo no encontrado: {}", identifier))
}

fn is_record_name(name: &str) -> bool {
    name.ends_with(RECORD_EXTENSION) && !name.starts_with('.')
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn read_record(path: &Path) -> anyhow::Result<StoredRecord> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Collapses every run of non-alphanumeric characters into one `_`.
pub fn sanitize_key(query_key: &str) -> String {
    let mut out = String::with_capacity(query_key.len());
    let mut pending_separator = false;
    for ch in query_key.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch);
        } else {
            pending_separator = true;
        }
    }
    if out.is_empty() {
        "nuc".to_string()
    } else {
        out
    }
}
