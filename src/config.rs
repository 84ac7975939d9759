//! Configuration for cognitive-canvas.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CANVAS_HOME, CANVAS_STORE_PATH, OPENAI_API_KEY,
//!    OPENAI_BASE_URL, CANVAS_EMBED_MODEL, CANVAS_GEN_MODEL)
//! 2. Config file (.canvas/config.yaml)
//! 3. Defaults (~/.canvas)
//!
//! Config file discovery:
//! - Searches current directory and parents for .canvas/config.yaml
//! - Paths in config file are relative to the .canvas/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::OpenAIConfig;
use crate::core::RetryPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Default store file name inside home
pub const STORE_FILE: &str = "store.db";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub provider: Option<OpenAIConfig>,
    #[serde(default)]
    pub ingest: Option<IngestSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .canvas/)
    pub home: Option<String>,
    /// SQLite store file (relative to .canvas/)
    pub store: Option<String>,
}

/// Ingestion tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Whole-workflow retry for URL and text ingestion
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Retry inside the categorization and quiz providers
    #[serde(default = "default_provider_retry")]
    pub provider_retry: RetryPolicy,

    /// URL workflows running at once during bulk ingestion
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,

    /// Page fetch timeout
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_seconds: u64,
}

fn default_provider_retry() -> RetryPolicy {
    RetryPolicy::fixed(3, Duration::from_secs(1))
}
fn default_bulk_concurrency() -> usize {
    4
}
fn default_extract_timeout() -> u64 {
    30
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            provider_retry: default_provider_retry(),
            bulk_concurrency: default_bulk_concurrency(),
            extract_timeout_seconds: default_extract_timeout(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// SQLite store file
    pub store_path: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Embedding and generation endpoint
    pub provider: OpenAIConfig,
    pub ingest: IngestSettings,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".canvas").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge defaults, an optional config file and an environment lookup
fn resolve_config<F>(
    config_path: Option<&Path>,
    default_home: PathBuf,
    env: F,
) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = config_path.map(load_config_file).transpose()?;
    let config_dir = config_path
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = match (env("CANVAS_HOME"), file.as_ref().and_then(|f| f.paths.home.as_ref())) {
        (Some(env_home), _) => PathBuf::from(env_home),
        (None, Some(home)) => resolve_path(config_dir, home),
        (None, None) => default_home,
    };

    let store_path = match (
        env("CANVAS_STORE_PATH"),
        file.as_ref().and_then(|f| f.paths.store.as_ref()),
    ) {
        (Some(env_store), _) => PathBuf::from(env_store),
        (None, Some(store)) => resolve_path(config_dir, store),
        (None, None) => home.join(STORE_FILE),
    };

    let mut provider = file
        .as_ref()
        .and_then(|f| f.provider.clone())
        .unwrap_or_default();
    if let Some(key) = env("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
        provider.api_key = Some(key);
    }
    if let Some(url) = env("OPENAI_BASE_URL") {
        provider.base_url = url;
    }
    if let Some(model) = env("CANVAS_EMBED_MODEL") {
        provider.embed_model = model;
    }
    if let Some(model) = env("CANVAS_GEN_MODEL") {
        provider.gen_model = model;
    }

    let ingest = file
        .as_ref()
        .and_then(|f| f.ingest.clone())
        .unwrap_or_default();

    Ok(ResolvedConfig {
        home,
        store_path,
        config_file: config_path.map(Path::to_path_buf),
        provider,
        ingest,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".canvas");

    let config_file = find_config_file();
    resolve_config(config_file.as_deref(), default_home, |key| {
        std::env::var(key).ok()
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let canvas_dir = temp.path().join(".canvas");
        std::fs::create_dir_all(&canvas_dir).unwrap();

        let config_path = canvas_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve_config(None, PathBuf::from("/home/u/.canvas"), no_env).unwrap();

        assert_eq!(config.home, PathBuf::from("/home/u/.canvas"));
        assert_eq!(config.store_path, PathBuf::from("/home/u/.canvas/store.db"));
        assert!(config.config_file.is_none());
        assert_eq!(config.provider.embed_model, "text-embedding-3-small");
        assert_eq!(config.ingest.bulk_concurrency, 4);
        assert_eq!(config.ingest.retry.max_attempts, 3);
        assert_eq!(
            config.ingest.provider_retry,
            RetryPolicy::fixed(3, Duration::from_secs(1))
        );
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  home: ./
  store: data/canvas.db
provider:
  base_url: http://localhost:8080/v1
  gen_model: local-model
ingest:
  bulk_concurrency: 8
  retry:
    max_attempts: 5
  provider_retry:
    max_attempts: 2
    initial_delay_ms: 250
    max_delay_ms: 250
    backoff_multiplier: 1.0
"#,
        );

        let config = resolve_config(Some(&config_path), PathBuf::from("/unused"), no_env).unwrap();
        let canvas_dir = config_path.parent().unwrap();

        assert_eq!(config.store_path, canvas_dir.join("data/canvas.db"));
        assert_eq!(config.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(config.provider.gen_model, "local-model");
        assert_eq!(config.provider.embed_model, "text-embedding-3-small");
        assert_eq!(config.ingest.bulk_concurrency, 8);
        assert_eq!(config.ingest.retry.max_attempts, 5);
        assert_eq!(
            config.ingest.retry.delay_for_attempt(1),
            Duration::from_millis(2000)
        );
        assert_eq!(
            config.ingest.provider_retry,
            RetryPolicy::fixed(2, Duration::from_millis(250))
        );
    }

    #[test]
    fn test_config_file_without_version() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
provider:
  max_embed_chars: 1000
"#,
        );

        let config = resolve_config(Some(&config_path), PathBuf::from("/unused"), no_env).unwrap();

        assert_eq!(config.provider.max_embed_chars, 1000);
        assert_eq!(config.ingest, IngestSettings::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
paths:
  store: file.db
provider:
  embed_model: from-file
"#,
        );
        let env: HashMap<&str, &str> = [
            ("CANVAS_STORE_PATH", "/tmp/env.db"),
            ("CANVAS_EMBED_MODEL", "from-env"),
            ("OPENAI_API_KEY", "sk-test"),
        ]
        .into_iter()
        .collect();

        let config = resolve_config(Some(&config_path), PathBuf::from("/unused"), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.provider.embed_model, "from-env");
        assert_eq!(config.provider.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "paths: [not, a, map]");

        let result = resolve_config(Some(&config_path), PathBuf::from("/unused"), no_env);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}
