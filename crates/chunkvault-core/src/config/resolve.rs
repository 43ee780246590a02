use std::fmt;
use std::path::{Path, PathBuf};

use chunkvault_types::error::{ChunkVaultError, Result};

use super::types::ChunkVaultConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CHUNKVAULT_CONFIG";

/// Where the config file came from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    CliArg(PathBuf),
    EnvVar(PathBuf),
    SearchOrder { path: PathBuf, level: &'static str },
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
            ConfigSource::SearchOrder { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} ({CONFIG_ENV_VAR})", p.display()),
            ConfigSource::SearchOrder { path, level } => {
                write!(f, "{} ({})", path.display(), level)
            }
        }
    }
}

/// Search locations in priority order.
pub fn default_config_search_paths() -> Vec<(PathBuf, &'static str)> {
    vec![(PathBuf::from("chunkvault.yaml"), "project")]
}

/// Resolve which config file to use.
///
/// Priority: CLI arg > `CHUNKVAULT_CONFIG` > first existing search path.
/// Returns `None` if nothing is found; callers fall back to defaults.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }

    if let Ok(val) = std::env::var(CONFIG_ENV_VAR) {
        if !val.is_empty() {
            return Some(ConfigSource::EnvVar(PathBuf::from(val)));
        }
    }

    default_config_search_paths()
        .into_iter()
        .find(|(path, _)| path.exists())
        .map(|(path, level)| ConfigSource::SearchOrder { path, level })
}

/// Load, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<ChunkVaultConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ChunkVaultError::Config(format!("cannot read '{}': {e}", path.display()))
    })?;
    let config: ChunkVaultConfig = serde_yaml::from_str(&contents).map_err(|e| {
        ChunkVaultError::Config(format!("invalid config '{}': {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Starter config written by `chunkvault config`.
pub fn minimal_config_template() -> &'static str {
    r#"# chunkvault configuration file

storage:
  blob_dir: ./data/blobs
  index_dir: ./data/index

pipeline:
  flush_threshold: 500
  poll_interval: 10s
  idle_timeout: 60s
  workers: 5
  # task_queue_capacity: 100
  # session_flush_size: 64

# retrieval:
#   fetch_threads: 6

# chunker:
#   min_size: 2048
#   avg_size: 8192
#   max_size: 16384

# retry:
#   max_retries: 3
#   retry_delay_ms: 200
#   retry_max_delay_ms: 10000
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_arg_wins() {
        let src = resolve_config_path(Some("/tmp/explicit.yaml")).unwrap();
        assert!(matches!(src, ConfigSource::CliArg(_)));
        assert_eq!(src.path(), Path::new("/tmp/explicit.yaml"));
    }

    #[test]
    fn template_parses_and_validates() {
        let cfg: ChunkVaultConfig = serde_yaml::from_str(minimal_config_template()).unwrap();
        cfg.validate().unwrap();
        assert_eq!(cfg.storage.blob_dir.as_deref(), Some("./data/blobs"));
    }

    #[test]
    fn load_config_reports_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "pipeline: [not, a, map]").unwrap();
        assert!(matches!(load_config(&path), Err(ChunkVaultError::Config(_))));
    }
}
