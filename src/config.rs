use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Batching and transaction-bound knobs for the import pipeline.
///
/// Both timeout bounds must exist: an unbounded transaction holding locks
/// across an entire large import is the primary correctness risk the batch
/// processor manages.
#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wall-clock bound on one chunk's transaction.
    #[serde(default = "default_execute_timeout")]
    pub execute_timeout_secs: u64,
    /// Bound on waiting for a pool connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            execute_timeout_secs: default_execute_timeout(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_batch_size() -> usize {
    50
}
fn default_execute_timeout() -> u64 {
    30
}
fn default_acquire_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7410".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.import.batch_size == 0 {
        anyhow::bail!("import.batch_size must be > 0");
    }
    if config.import.execute_timeout_secs == 0 {
        anyhow::bail!("import.execute_timeout_secs must be > 0");
    }
    if config.import.acquire_timeout_secs == 0 {
        anyhow::bail!("import.acquire_timeout_secs must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("[db]\npath = \"/tmp/lingest.sqlite\"\n").unwrap();
        assert_eq!(config.import.batch_size, 50);
        assert_eq!(config.import.execute_timeout_secs, 30);
        assert_eq!(config.import.acquire_timeout_secs, 10);
        assert_eq!(config.server.bind, "127.0.0.1:7410");
    }
}
