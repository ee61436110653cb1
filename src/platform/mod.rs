use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "CONSULTA_DATA_DIR";

/// Root data directory: `$CONSULTA_DATA_DIR` when set, else `~/.consulta`.
pub fn data_dir() -> PathBuf {
    resolve_data_dir(
        std::env::var_os(DATA_DIR_ENV).map(PathBuf::from),
        dirs::home_dir(),
    )
}

fn resolve_data_dir(from_env: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    match from_env {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => home
            .unwrap_or_else(std::env::temp_dir)
            .join(".consulta"),
    }
}
